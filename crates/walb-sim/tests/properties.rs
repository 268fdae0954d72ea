//! Property-based tests for the quantified invariants.

use proptest::prelude::*;
use rand::rngs::SmallRng;
use rand::SeedableRng;
use walb_kernel::{Mode, PackBuilder};
use walb_sim::workload::{generate_workload, WorkloadConfig};
use walb_sim::{PackStateManager, SimConfig, Simulator};
use walb_types::DiskImage;

fn arb_workload_config() -> impl Strategy<Value = WorkloadConfig> {
    (4u64..64, 1u8..100).prop_flat_map(|(disk_size, write_pct)| {
        (1u64..=disk_size.min(8), 1u32..8).prop_map(move |(min_req_size, min_plug_size)| {
            let max_req_size = (min_req_size + 4).min(disk_size);
            WorkloadConfig {
                disk_size,
                min_req_size,
                max_req_size,
                min_plug_size,
                max_plug_size: min_plug_size + 3,
                write_pct,
            }
        })
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// For any schedule that runs to no-candidates without a crash, the two
    /// shadow disks converge.
    #[test]
    fn drain_always_converges(config in arb_workload_config(), num_plugs in 1u32..12, seed: u64, shuffle: bool) {
        let sim_config = SimConfig {
            workload: config,
            num_plugs,
            n_plug: 3,
            mode: Mode::Fast,
            shuffle,
            crash_pct_per_tick: 0,
            seed,
        };
        let report = Simulator::run(&sim_config).expect("a clean run must not report an invariant violation");
        prop_assert_eq!(report.v_storage.as_slice(), report.r_storage.as_slice());
    }

    /// Two different shuffles of the same input converge on the same
    /// final `rStorage`.
    #[test]
    fn cross_loop_convergence(config in arb_workload_config(), num_plugs in 1u32..8, seed: u64, shuffle_seed_a: u64, shuffle_seed_b: u64) {
        let mut gen_rng = SmallRng::seed_from_u64(seed);
        let raw_plugs = generate_workload(&mut gen_rng, &config, num_plugs);

        let build = |raw: Vec<Vec<walb_types::Request>>| -> Vec<Vec<walb_types::Pack>> {
            raw.into_iter().map(|p| PackBuilder::build(p).unwrap()).collect()
        };

        let disk = DiskImage::new(config.disk_size as usize);

        let mut rng_a = SmallRng::seed_from_u64(shuffle_seed_a);
        let report_a = Simulator::run_on(disk.clone(), build(raw_plugs.clone()), Mode::Fast, 3, true, 0, &mut rng_a).unwrap();

        let mut rng_b = SmallRng::seed_from_u64(shuffle_seed_b);
        let report_b = Simulator::run_on(disk, build(raw_plugs), Mode::Fast, 3, true, 0, &mut rng_b).unwrap();

        prop_assert_eq!(report_a.r_storage.as_slice(), report_b.r_storage.as_slice());
    }

    /// The watermark never moves backward across a run.
    #[test]
    fn watermark_is_non_decreasing(config in arb_workload_config(), num_plugs in 1u32..8, seed: u64) {
        let mut rng = SmallRng::seed_from_u64(seed);
        let raw_plugs = generate_workload(&mut rng, &config, num_plugs);
        let plug_pack_list: Vec<Vec<walb_types::Pack>> = raw_plugs.into_iter().map(|p| PackBuilder::build(p).unwrap()).collect();
        let disk = DiskImage::new(config.disk_size as usize);
        let mut manager = PackStateManager::new(disk, plug_pack_list, Mode::Fast).unwrap();

        let mut last = manager.first_not_ended_pid();
        loop {
            let candidates = manager.get_candidates(3);
            if candidates.is_empty() {
                break;
            }
            let (pid, op) = candidates[0];
            manager.execute(pid, op).unwrap();
            let now = manager.first_not_ended_pid();
            prop_assert!(now >= last);
            last = now;
        }
    }

    /// Crash recovery always leaves the two shadow disks converged.
    #[test]
    fn crash_recovery_converges(config in arb_workload_config(), num_plugs in 1u32..8, seed: u64, crash_pct in 1u8..60) {
        let sim_config = SimConfig {
            workload: config,
            num_plugs,
            n_plug: 3,
            mode: Mode::Fast,
            shuffle: true,
            crash_pct_per_tick: crash_pct,
            seed,
        };
        let report = Simulator::run(&sim_config).expect("crash recovery must converge");
        prop_assert_eq!(report.v_storage.as_slice(), report.r_storage.as_slice());
    }
}

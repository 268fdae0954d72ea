//! Drives a [`PackStateManager`] to completion, picking one candidate
//! operation per tick and checking the drain/crash-recovery invariants at
//! the end.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use tracing::{error, info, info_span};
use walb_kernel::{Mode, Op, PackBuilder};
use walb_types::DiskImage;

use crate::config::SimConfig;
use crate::error::{DivergenceReport, SimError, SimResult};
use crate::manager::PackStateManager;
use crate::workload::generate_workload;

/// The result of driving one simulation to completion.
#[derive(Debug)]
pub struct RunReport {
    pub v_storage: DiskImage,
    pub r_storage: DiskImage,
    pub history: Vec<(u64, Op)>,
    pub crashed_at_tick: Option<usize>,
    pub recovered_to_pid: Option<u64>,
}

pub struct Simulator;

impl Simulator {
    /// Generates a workload from `config.workload`, builds its packs, and
    /// drives the manager until no candidates remain (or a crash is
    /// injected). Returns `Err` the moment any invariant in the kernel or
    /// the drain/crash checks below is violated.
    pub fn run(config: &SimConfig) -> SimResult<RunReport> {
        config.validate()?;
        let span = info_span!("sim_run", seed = config.seed, mode = ?config.mode, n_plug = config.n_plug);
        let _enter = span.enter();

        let mut rng = SmallRng::seed_from_u64(config.seed);
        let raw_plugs = generate_workload(&mut rng, &config.workload, config.num_plugs);
        let plug_pack_list = raw_plugs
            .into_iter()
            .map(PackBuilder::build)
            .collect::<Result<Vec<_>, _>>()?;

        let disk = DiskImage::new(config.workload.disk_size as usize);
        Self::run_on(disk, plug_pack_list, config.mode, config.n_plug, config.shuffle, config.crash_pct_per_tick, &mut rng)
    }

    /// Runs `num_loops` independent loops over the *same* generated
    /// workload: loop 0 drives it unshuffled and its `rStorage` becomes the
    /// reference image; every later loop reshuffles that same
    /// `plugPackList` and is diffed against the reference, mirroring the
    /// reference simulator's own multi-loop driver (loop 0 sets the image,
    /// later loops reorder and compare).
    pub fn run_loops(config: &SimConfig, num_loops: u32) -> SimResult<Vec<RunReport>> {
        config.validate()?;
        let span = info_span!("sim_run_loops", seed = config.seed, mode = ?config.mode, num_loops);
        let _enter = span.enter();

        let mut gen_rng = SmallRng::seed_from_u64(config.seed);
        let raw_plugs = generate_workload(&mut gen_rng, &config.workload, config.num_plugs);
        let plug_pack_list = raw_plugs
            .into_iter()
            .map(PackBuilder::build)
            .collect::<Result<Vec<_>, _>>()?;

        let disk = DiskImage::new(config.workload.disk_size as usize);

        let mut reports = Vec::with_capacity(num_loops as usize);
        let mut reference: Option<DiskImage> = None;
        for loop_idx in 0..num_loops {
            let shuffle = config.shuffle && loop_idx > 0;
            let mut loop_rng = SmallRng::seed_from_u64(config.seed.wrapping_add(u64::from(loop_idx)).wrapping_add(1));
            let report = Self::run_on(
                disk.clone(),
                plug_pack_list.clone(),
                config.mode,
                config.n_plug,
                shuffle,
                config.crash_pct_per_tick,
                &mut loop_rng,
            )?;

            match &reference {
                None => reference = Some(report.r_storage.clone()),
                Some(reference_image) => {
                    let diff = reference_image.diff(&report.r_storage);
                    if !diff.is_empty() {
                        error!(loop_idx, diff = diff.len(), "cross-loop divergence");
                        return Err(SimError::CrossLoopDivergence(DivergenceReport(diff)));
                    }
                }
            }
            reports.push(report);
        }

        info!(num_loops, "all loops converged");
        Ok(reports)
    }

    /// Drives an already-built `plugPackList` to completion. Exposed
    /// separately from [`Self::run`] so literal scenario tests can hand in
    /// hand-built packs instead of generated ones.
    #[allow(clippy::too_many_arguments)]
    pub fn run_on(
        disk: DiskImage,
        plug_pack_list: Vec<Vec<walb_types::Pack>>,
        mode: Mode,
        n_plug: u32,
        shuffle: bool,
        crash_pct_per_tick: u8,
        rng: &mut SmallRng,
    ) -> SimResult<RunReport> {
        let mut manager = PackStateManager::new(disk, plug_pack_list, mode)?;
        let mut history = Vec::new();
        let mut crashed_at_tick = None;

        loop {
            let candidates = manager.get_candidates(n_plug);
            if candidates.is_empty() {
                break;
            }
            if crash_pct_per_tick > 0 && rng.gen_range(0..100) < crash_pct_per_tick {
                crashed_at_tick = Some(history.len());
                info!(tick = history.len(), "crash injected");
                break;
            }
            let (pid, op) = if shuffle {
                candidates[rng.gen_range(0..candidates.len())]
            } else {
                candidates[0]
            };
            manager.execute(pid, op)?;
            history.push((pid, op));
        }

        let recovered_to_pid = if crashed_at_tick.is_some() {
            Some(manager.do_crash_recovery())
        } else {
            None
        };

        let diff = manager.v_storage().diff(manager.r_storage());
        if !diff.is_empty() {
            let report = DivergenceReport(diff);
            return Err(if crashed_at_tick.is_some() {
                SimError::CrashRecoveryDivergence(report)
            } else {
                SimError::DrainDivergence(report)
            });
        }

        info!(ticks = history.len(), "run complete");
        Ok(RunReport {
            v_storage: manager.v_storage().clone(),
            r_storage: manager.r_storage().clone(),
            history,
            crashed_at_tick,
            recovered_to_pid,
        })
    }
}

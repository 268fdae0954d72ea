//! Deterministic, seeded workload generation for exercising the kernel
//! without hand-authored fixtures.

use rand::Rng;
use walb_types::Request;

/// Bounds for randomly generated plugs, mirroring the validity constraints
/// of the source request generator.
#[derive(Debug, Clone, Copy)]
pub struct WorkloadConfig {
    pub disk_size: u64,
    pub min_req_size: u64,
    pub max_req_size: u64,
    pub min_plug_size: u32,
    pub max_plug_size: u32,
    /// Percentage (0-100) of generated requests that are writes.
    pub write_pct: u8,
}

impl WorkloadConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.disk_size == 0 {
            return Err("disk_size must be > 0".into());
        }
        if self.min_req_size == 0 {
            return Err("min_req_size must be > 0".into());
        }
        if self.max_req_size < self.min_req_size {
            return Err("max_req_size must be >= min_req_size".into());
        }
        if self.disk_size < self.max_req_size {
            return Err("disk_size must be >= max_req_size".into());
        }
        if self.min_plug_size == 0 {
            return Err("min_plug_size must be > 0".into());
        }
        if self.max_plug_size < self.min_plug_size {
            return Err("max_plug_size must be >= min_plug_size".into());
        }
        if self.write_pct > 100 {
            return Err("write_pct must be <= 100".into());
        }
        Ok(())
    }
}

/// Generates one plug's worth of requests: a random count in
/// `[min_plug_size, max_plug_size]`, each with a random size, address, and
/// direction, writes carrying a random payload.
pub fn generate_plug(rng: &mut impl Rng, config: &WorkloadConfig) -> Vec<Request> {
    let plug_size = rng.gen_range(config.min_plug_size..=config.max_plug_size);
    (0..plug_size).map(|_| generate_request(rng, config)).collect()
}

fn generate_request(rng: &mut impl Rng, config: &WorkloadConfig) -> Request {
    let size = rng.gen_range(config.min_req_size..=config.max_req_size);
    let addr = rng.gen_range(0..=config.disk_size - size);
    let is_write = rng.gen_range(0..100) < config.write_pct;
    if is_write {
        let data: Vec<u8> = (0..size).map(|_| rng.r#gen()).collect();
        Request::write(addr, data)
    } else {
        Request::read(addr, size)
    }
}

/// Generates `num_plugs` independent plugs' worth of raw requests, ready to
/// be split into packs by [`walb_kernel::PackBuilder`].
pub fn generate_workload(rng: &mut impl Rng, config: &WorkloadConfig, num_plugs: u32) -> Vec<Vec<Request>> {
    (0..num_plugs).map(|_| generate_plug(rng, config)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn config() -> WorkloadConfig {
        WorkloadConfig {
            disk_size: 64,
            min_req_size: 1,
            max_req_size: 8,
            min_plug_size: 1,
            max_plug_size: 5,
            write_pct: 60,
        }
    }

    #[test]
    fn generated_requests_stay_on_disk() {
        let mut rng = SmallRng::seed_from_u64(42);
        let cfg = config();
        for plug in generate_workload(&mut rng, &cfg, 50) {
            for req in plug {
                assert!(req.addr() + req.size() <= cfg.disk_size);
                assert!(req.size() >= cfg.min_req_size && req.size() <= cfg.max_req_size);
            }
        }
    }

    #[test]
    fn same_seed_is_deterministic() {
        let cfg = config();
        let mut rng1 = SmallRng::seed_from_u64(7);
        let mut rng2 = SmallRng::seed_from_u64(7);
        let a = generate_workload(&mut rng1, &cfg, 10);
        let b = generate_workload(&mut rng2, &cfg, 10);
        assert_eq!(a.len(), b.len());
        for (pa, pb) in a.iter().zip(b.iter()) {
            assert_eq!(pa.len(), pb.len());
            for (ra, rb) in pa.iter().zip(pb.iter()) {
                assert_eq!(ra.addr(), rb.addr());
                assert_eq!(ra.size(), rb.size());
                assert_eq!(ra.is_write(), rb.is_write());
                assert_eq!(ra.data(), rb.data());
            }
        }
    }

    #[test]
    fn rejects_invalid_config() {
        let mut cfg = config();
        cfg.max_req_size = 0;
        assert!(cfg.validate().is_err());
    }
}

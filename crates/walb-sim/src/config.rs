//! The programmatic configuration surface for a simulation run.

use walb_kernel::Mode;

use crate::error::{SimError, SimResult};
use crate::workload::WorkloadConfig;

/// Everything a [`crate::Simulator`] run needs, independent of how it was
/// sourced (CLI flags, a TOML file, or constructed in a test).
#[derive(Debug, Clone)]
pub struct SimConfig {
    pub workload: WorkloadConfig,
    pub num_plugs: u32,
    /// How many plugs past the watermark the scheduler may look ahead.
    pub n_plug: u32,
    pub mode: Mode,
    /// If true, the driver picks a uniformly random candidate each tick
    /// instead of always the first one the manager returns.
    pub shuffle: bool,
    /// Percentage (0-100) chance of injecting a crash on any given tick.
    pub crash_pct_per_tick: u8,
    pub seed: u64,
}

impl SimConfig {
    pub fn validate(&self) -> SimResult<()> {
        self.workload.validate().map_err(SimError::InvalidConfig)?;
        if self.num_plugs == 0 {
            return Err(SimError::InvalidConfig("num_plugs must be > 0".into()));
        }
        if self.n_plug == 0 {
            return Err(SimError::InvalidConfig("n_plug must be > 0".into()));
        }
        if self.crash_pct_per_tick > 100 {
            return Err(SimError::InvalidConfig("crash_pct_per_tick must be <= 100".into()));
        }
        Ok(())
    }
}

/// Serializable mirror of [`SimConfig`], for loading defaults from a TOML
/// file before CLI flags override them. Kept separate from `SimConfig`
/// because `Mode` has no serde impl of its own and a file may reasonably
/// omit any field, to be defaulted by the CLI.
#[derive(Debug, Clone, serde::Deserialize, serde::Serialize, Default)]
pub struct FileConfig {
    pub disk_size: Option<u64>,
    pub min_req_size: Option<u64>,
    pub max_req_size: Option<u64>,
    pub min_plug_size: Option<u32>,
    pub max_plug_size: Option<u32>,
    pub write_pct: Option<u8>,
    pub num_plugs: Option<u32>,
    pub n_plug: Option<u32>,
    pub mode: Option<String>,
    pub shuffle: Option<bool>,
    pub crash_pct_per_tick: Option<u8>,
    pub seed: Option<u64>,
}

//! Ambient failure kinds layered on top of [`walb_types::WalbError`]: the
//! ones that can only arise once a full run is driven (drain divergence,
//! cross-loop divergence, crash-recovery divergence) plus the config/IO
//! failures the CLI surface needs.

use walb_types::{DiffEntry, WalbError};

/// Everything that can go wrong running a simulation loop, on top of the
/// kernel's own [`WalbError`].
#[derive(thiserror::Error, Debug)]
pub enum SimError {
    #[error(transparent)]
    Kernel(#[from] WalbError),

    #[error("invalid workload config: {0}")]
    InvalidConfig(String),

    #[error("drain divergence: {0} byte(s) differ between vStorage and rStorage")]
    DrainDivergence(DivergenceReport),

    #[error("cross-loop divergence: {0} byte(s) differ between the reference and shuffled runs")]
    CrossLoopDivergence(DivergenceReport),

    #[error("crash-recovery divergence: {0} byte(s) differ between vStorage and rStorage after recovery")]
    CrashRecoveryDivergence(DivergenceReport),
}

/// Wraps a byte-level diff so it can be formatted as a count in the error
/// message while still carrying the full detail for callers that want it.
#[derive(Debug, Clone)]
pub struct DivergenceReport(pub Vec<DiffEntry>);

impl std::fmt::Display for DivergenceReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.len())
    }
}

pub type SimResult<T> = Result<T, SimError>;

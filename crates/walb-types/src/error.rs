//! The typed failure taxonomy the kernel reports through.
//!
//! Every anomaly the pack-state machines can detect — malformed input, an
//! illegal bit transition, or a read that saw data outside its witness set
//! — is a variant here rather than a panic. Divergence between the shadow
//! disk images is a property of a whole run, not a single pack, so it's
//! reported through `walb_sim::SimError` instead.

use std::fmt;

/// A single diverging byte between two disk images.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiffEntry {
    pub addr: u64,
    pub left: u8,
    pub right: u8,
}

/// Everything that can go fatally wrong while building or running a simulation.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum WalbError {
    #[error("empty plug: a plug must contain at least one pack")]
    EmptyPlug,

    #[error("empty pack: a pack must contain at least one request")]
    EmptyPack,

    #[error(
        "request direction mismatch: pack is {pack_is_write}, request is {req_is_write}"
    )]
    DirectionMismatch {
        pack_is_write: bool,
        req_is_write: bool,
    },

    #[error("request out of range: addr={addr} size={size} disk_size={disk_size}")]
    RequestOutOfRange {
        addr: u64,
        size: u64,
        disk_size: u64,
    },

    #[error("pack {pid} has overlapping requests at addr {addr}")]
    IntraPackOverlap { pid: u64, addr: u64 },

    #[error("illegal transition: pack {pid} op {op} already set")]
    OpAlreadySet { pid: u64, op: &'static str },

    #[error("illegal transition: pack {pid} op {op} predecessors unsatisfied")]
    PredecessorsUnsatisfied { pid: u64, op: &'static str },

    #[error(
        "read inconsistency: pack {pid} addr {addr} observed {observed} matches none of {allowed:?}"
    )]
    ReadInconsistency {
        pid: u64,
        addr: u64,
        observed: u8,
        allowed: Vec<u8>,
    },
}

impl fmt::Display for DiffEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(addr={}, left={}, right={})", self.addr, self.left, self.right)
    }
}

pub type WalbResult<T> = Result<T, WalbError>;

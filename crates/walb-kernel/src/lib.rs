//! # walb-kernel: the pack-state machines
//!
//! The deterministic core of WALB-sim: given a pack and the window of
//! peer packs around it, says which operations are legal next and applies
//! one to the pack's bits and the shadow disk images. Contains no
//! scheduling policy, no randomness, and no I/O beyond the in-memory
//! [`walb_types::DiskImage`] — those live in `walb-sim`.

mod builder;
mod op;
mod read_state;
mod state;
mod write_state;

#[cfg(test)]
mod tests;

pub use builder::PackBuilder;
pub use op::{Mode, Op, ReadOp, WriteOp};
pub use read_state::ReadPackState;
pub use state::PackState;
pub use write_state::WritePackState;

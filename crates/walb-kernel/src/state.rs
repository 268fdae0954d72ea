//! The pack-state wrapper: dispatches to a read or write pack-state machine.

use walb_types::{DiskImage, Pack, WalbResult};

use crate::op::{Mode, Op};
use crate::read_state::ReadPackState;
use crate::write_state::WritePackState;

/// Either half of the kernel's two state machines, tagged by direction.
/// Kept as an enum rather than a trait object: the manager holds a flat
/// `Vec<PackState>` and matches on it constantly, and there are exactly two
/// variants.
#[derive(Debug, Clone)]
pub enum PackState {
    Read(ReadPackState),
    Write(WritePackState),
}

impl PackState {
    pub fn new(pack: Pack, mode: Mode) -> Self {
        if pack.is_write() {
            PackState::Write(WritePackState::new(pack, mode))
        } else {
            PackState::Read(ReadPackState::new(pack, mode))
        }
    }

    pub fn pack(&self) -> &Pack {
        match self {
            PackState::Read(r) => r.pack(),
            PackState::Write(w) => w.pack(),
        }
    }

    pub fn pid(&self) -> Option<u64> {
        self.pack().pid()
    }

    pub fn mode(&self) -> Mode {
        match self {
            PackState::Read(r) => r.mode(),
            PackState::Write(w) => w.mode(),
        }
    }

    pub fn is_write(&self) -> bool {
        matches!(self, PackState::Write(_))
    }

    pub fn is_begun(&self) -> bool {
        match self {
            PackState::Read(r) => r.is_begun(),
            PackState::Write(w) => w.is_begun(),
        }
    }

    pub fn is_ended(&self) -> bool {
        match self {
            PackState::Read(r) => r.is_ended(),
            PackState::Write(w) => w.is_ended(),
        }
    }

    pub fn get_candidates(&self, peers: &[PackState]) -> Vec<Op> {
        match self {
            PackState::Read(r) => r.get_candidates(peers),
            PackState::Write(w) => w.get_candidates(peers),
        }
    }

    pub fn execute(
        &mut self,
        op: Op,
        peers: &[PackState],
        v_storage: &mut DiskImage,
        r_storage: &mut DiskImage,
    ) -> WalbResult<()> {
        match (self, op) {
            (PackState::Read(r), Op::Read(op)) => r.execute(op, peers, v_storage, r_storage),
            (PackState::Write(w), Op::Write(op)) => w.execute(op, peers, v_storage, r_storage),
            (PackState::Read(r), Op::Write(_)) => {
                panic!("write op {} applied to read pack {:?}", op.name(), r.pack().pid())
            }
            (PackState::Write(w), Op::Read(_)) => {
                panic!("read op {} applied to write pack {:?}", op.name(), w.pack().pid())
            }
        }
    }

    /// Resets a write pack's bits to redo it during crash recovery. Not
    /// meaningful for read packs: reads leave no durable trace to replay.
    pub fn reset_for_recovery(&mut self) {
        if let PackState::Write(w) = self {
            w.reset_all();
        }
    }

    /// Marks a pack fully ended without replay, once crash recovery has
    /// decided it needs no further redo (a write pack whose images were
    /// already current, or any read pack — reads leave no durable trace).
    pub fn mark_recovered(&mut self) {
        match self {
            PackState::Write(w) => w.mark_all_ended(),
            PackState::Read(r) => r.mark_ended(),
        }
    }

    pub fn as_read(&self) -> Option<&ReadPackState> {
        match self {
            PackState::Read(r) => Some(r),
            PackState::Write(_) => None,
        }
    }

    pub fn as_read_mut(&mut self) -> Option<&mut ReadPackState> {
        match self {
            PackState::Read(r) => Some(r),
            PackState::Write(_) => None,
        }
    }

    pub fn as_write(&self) -> Option<&WritePackState> {
        match self {
            PackState::Write(w) => Some(w),
            PackState::Read(_) => None,
        }
    }

    pub fn as_write_mut(&mut self) -> Option<&mut WritePackState> {
        match self {
            PackState::Write(w) => Some(w),
            PackState::Read(_) => None,
        }
    }
}

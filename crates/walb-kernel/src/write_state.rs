//! The write-pack state machine.

use walb_types::{DiskImage, Pack, WalbError, WalbResult};

use crate::op::{Mode, Op, WriteOp};
use crate::state::PackState;

/// Per-pack state bits for a write pack: the log-pack path
/// (`SUBMIT_LPACK`/`COMPLETE_LPACK`), the fast-path visibility point
/// (`WRITE_VSTORAGE`), the data-pack path
/// (`SUBMIT_DPACK`/`WRITE_RSTORAGE`/`COMPLETE_DPACK`), and completion
/// (`END_REQ`).
#[derive(Debug, Clone)]
pub struct WritePackState {
    pack: Pack,
    mode: Mode,
    submit_lpack: bool,
    complete_lpack: bool,
    submit_dpack: bool,
    complete_dpack: bool,
    write_vstorage: bool,
    write_rstorage: bool,
    end_req: bool,
}

impl WritePackState {
    pub fn new(pack: Pack, mode: Mode) -> Self {
        assert!(pack.is_write(), "WritePackState requires a write pack");
        Self {
            pack,
            mode,
            submit_lpack: false,
            complete_lpack: false,
            submit_dpack: false,
            complete_dpack: false,
            write_vstorage: false,
            write_rstorage: false,
            end_req: false,
        }
    }

    pub fn pack(&self) -> &Pack {
        &self.pack
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    fn bit(&self, op: WriteOp) -> bool {
        match op {
            WriteOp::SubmitLpack => self.submit_lpack,
            WriteOp::CompleteLpack => self.complete_lpack,
            WriteOp::SubmitDpack => self.submit_dpack,
            WriteOp::CompleteDpack => self.complete_dpack,
            WriteOp::WriteVstorage => self.write_vstorage,
            WriteOp::WriteRstorage => self.write_rstorage,
            WriteOp::EndReq => self.end_req,
        }
    }

    fn set_bit(&mut self, op: WriteOp) {
        match op {
            WriteOp::SubmitLpack => self.submit_lpack = true,
            WriteOp::CompleteLpack => self.complete_lpack = true,
            WriteOp::SubmitDpack => self.submit_dpack = true,
            WriteOp::CompleteDpack => self.complete_dpack = true,
            WriteOp::WriteVstorage => self.write_vstorage = true,
            WriteOp::WriteRstorage => self.write_rstorage = true,
            WriteOp::EndReq => self.end_req = true,
        }
    }

    pub fn is_begun(&self) -> bool {
        self.submit_lpack
            || self.complete_lpack
            || self.submit_dpack
            || self.complete_dpack
            || self.write_vstorage
            || self.write_rstorage
            || self.end_req
    }

    pub fn is_ended(&self) -> bool {
        match self.mode {
            Mode::Fast => self.end_req && self.complete_dpack,
            Mode::Slow => self.end_req && self.write_vstorage,
        }
    }

    pub fn complete_lpack_set(&self) -> bool {
        self.complete_lpack
    }

    pub fn write_vstorage_set(&self) -> bool {
        self.write_vstorage
    }

    pub fn write_rstorage_set(&self) -> bool {
        self.write_rstorage
    }

    /// True if every prior write pack in `peers` has `WRITE_VSTORAGE` set:
    /// the log-order-visibility rule behind `WRITE_VSTORAGE`'s own readiness.
    fn is_ready_to_write_vstorage(&self, peers: &[PackState]) -> bool {
        peers.iter().all(|p| match p {
            PackState::Write(w) => w.write_vstorage_set(),
            PackState::Read(_) => true,
        })
    }

    /// Two conditions, matching the design's table:
    /// (1) in slow mode, every prior write pack must have `COMPLETE_LPACK` set
    ///     (already implied in fast mode by the `WRITE_VSTORAGE` predecessor);
    /// (2) every prior *overlapping* write pack must have `COMPLETE_DPACK` set,
    ///     serializing overlapping data-pack writes into program order.
    fn is_ready_to_submit_dpack(&self, peers: &[PackState]) -> bool {
        for p in peers {
            if let PackState::Write(w) = p {
                if self.mode == Mode::Slow && !w.complete_lpack_set() {
                    return false;
                }
                if w.pack().overlaps(self.pack()) && !w.complete_dpack {
                    return false;
                }
            }
        }
        true
    }

    pub fn get_candidates(&self, peers: &[PackState]) -> Vec<Op> {
        let mut out = Vec::new();
        if !self.submit_lpack {
            out.push(Op::Write(WriteOp::SubmitLpack));
        }
        if !self.complete_lpack && self.submit_lpack {
            out.push(Op::Write(WriteOp::CompleteLpack));
        }
        if !self.write_vstorage && self.complete_lpack && self.is_ready_to_write_vstorage(peers) {
            out.push(Op::Write(WriteOp::WriteVstorage));
        }
        let submit_dpack_ready = match self.mode {
            Mode::Fast => self.write_vstorage,
            Mode::Slow => self.complete_lpack,
        };
        if !self.submit_dpack && submit_dpack_ready && self.is_ready_to_submit_dpack(peers) {
            out.push(Op::Write(WriteOp::SubmitDpack));
        }
        if !self.write_rstorage && self.submit_dpack {
            out.push(Op::Write(WriteOp::WriteRstorage));
        }
        if !self.complete_dpack && self.write_rstorage {
            out.push(Op::Write(WriteOp::CompleteDpack));
        }
        let end_req_ready = match self.mode {
            Mode::Fast => self.write_vstorage,
            Mode::Slow => self.complete_dpack,
        };
        if !self.end_req && end_req_ready {
            out.push(Op::Write(WriteOp::EndReq));
        }
        out
    }

    pub fn execute(
        &mut self,
        op: WriteOp,
        peers: &[PackState],
        v_storage: &mut DiskImage,
        r_storage: &mut DiskImage,
    ) -> WalbResult<()> {
        if self.bit(op) {
            return Err(WalbError::OpAlreadySet {
                pid: self.pack.pid().unwrap_or(u64::MAX),
                op: op.name(),
            });
        }
        if !self.get_candidates(peers).contains(&Op::Write(op)) {
            return Err(WalbError::PredecessorsUnsatisfied {
                pid: self.pack.pid().unwrap_or(u64::MAX),
                op: op.name(),
            });
        }
        self.set_bit(op);
        self.execute_io_for(op, v_storage, r_storage);
        Ok(())
    }

    /// Used only by crash recovery: applies `WRITE_VSTORAGE`/`WRITE_RSTORAGE`
    /// without checking predecessors (the pack's bits have just been reset
    /// to redo it from the simulated log).
    pub fn force_execute(&mut self, op: WriteOp, v_storage: &mut DiskImage, r_storage: &mut DiskImage) {
        assert!(!self.bit(op), "force_execute on an already-set bit");
        self.set_bit(op);
        self.execute_io_for(op, v_storage, r_storage);
    }

    fn execute_io_for(&mut self, op: WriteOp, v_storage: &mut DiskImage, r_storage: &mut DiskImage) {
        match op {
            WriteOp::WriteVstorage => {
                for req in self.pack.requests_mut() {
                    req.execute_io(v_storage);
                }
            }
            WriteOp::WriteRstorage => {
                for req in self.pack.requests_mut() {
                    req.execute_io(r_storage);
                }
            }
            _ => {}
        }
    }

    /// Resets every bit to `false`, for crash-recovery redo.
    pub fn reset_all(&mut self) {
        self.submit_lpack = false;
        self.complete_lpack = false;
        self.submit_dpack = false;
        self.complete_dpack = false;
        self.write_vstorage = false;
        self.write_rstorage = false;
        self.end_req = false;
    }

    /// Marks every bit set, for crash-recovery bookkeeping once a pack has
    /// been redone (or was never touched by the lost log tail).
    pub fn mark_all_ended(&mut self) {
        self.submit_lpack = true;
        self.complete_lpack = true;
        self.submit_dpack = true;
        self.complete_dpack = true;
        self.write_vstorage = true;
        self.write_rstorage = true;
        self.end_req = true;
    }
}

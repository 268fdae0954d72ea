//! The read-pack state machine.

use walb_types::{DiskImage, Pack, WalbError, WalbResult};

use crate::op::{Mode, Op, ReadOp};
use crate::state::PackState;

/// Per-pack state bits for a read pack, plus (in fast mode) the
/// read-possibility witness captured at `SUBMIT` time.
///
/// The witness map is populated by the manager, not by this type: computing
/// it requires scanning every pack in the simulation, not just this pack's
/// own bits (see `walb-sim::manager`).
#[derive(Debug, Clone)]
pub struct ReadPackState {
    pack: Pack,
    mode: Mode,
    submit: bool,
    read: bool,
    complete: bool,
    end_req: bool,
    witness: Vec<(u64, u8, Vec<u64>)>,
}

impl ReadPackState {
    pub fn new(pack: Pack, mode: Mode) -> Self {
        assert!(!pack.is_write(), "ReadPackState requires a read pack");
        Self {
            pack,
            mode,
            submit: false,
            read: false,
            complete: false,
            end_req: false,
            witness: Vec::new(),
        }
    }

    pub fn pack(&self) -> &Pack {
        &self.pack
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    fn bit(&self, op: ReadOp) -> bool {
        match op {
            ReadOp::Submit => self.submit,
            ReadOp::Read => self.read,
            ReadOp::Complete => self.complete,
            ReadOp::EndReq => self.end_req,
        }
    }

    fn set_bit(&mut self, op: ReadOp) {
        match op {
            ReadOp::Submit => self.submit = true,
            ReadOp::Read => self.read = true,
            ReadOp::Complete => self.complete = true,
            ReadOp::EndReq => self.end_req = true,
        }
    }

    pub fn is_begun(&self) -> bool {
        self.submit || self.read || self.complete || self.end_req
    }

    pub fn is_ended(&self) -> bool {
        self.end_req
    }

    /// Records the witness for `addr`: `fallback_byte` is the value a read
    /// could legally return with no in-flight writer; `writer_pids` are the
    /// not-yet-ended write packs covering `addr` at the moment `SUBMIT` fired.
    pub fn set_witness(&mut self, addr: u64, fallback_byte: u8, writer_pids: Vec<u64>) {
        self.witness.push((addr, fallback_byte, writer_pids));
    }

    /// Forces the pack into the ended state without replay, for crash
    /// recovery: reads leave no durable trace, so recovery only needs to
    /// stop treating this pack as pending.
    pub fn mark_ended(&mut self) {
        self.submit = true;
        self.read = true;
        self.complete = true;
        self.end_req = true;
    }

    pub fn witness_at(&self, addr: u64) -> Option<(u8, &[u64])> {
        self.witness
            .iter()
            .find(|(a, _, _)| *a == addr)
            .map(|(_, fallback, writers)| (*fallback, writers.as_slice()))
    }

    /// Operation candidates legal right now. The peer slice is accepted for
    /// symmetry with [`crate::WritePackState::get_candidates`] but unused:
    /// a read pack's readiness depends only on its own bits.
    pub fn get_candidates(&self, _peers: &[PackState]) -> Vec<Op> {
        let mut out = Vec::new();
        if !self.submit {
            out.push(Op::Read(ReadOp::Submit));
        }
        if !self.read && self.submit {
            out.push(Op::Read(ReadOp::Read));
        }
        if !self.complete && self.read {
            out.push(Op::Read(ReadOp::Complete));
        }
        if !self.end_req && self.complete {
            out.push(Op::Read(ReadOp::EndReq));
        }
        out
    }

    pub fn execute(
        &mut self,
        op: ReadOp,
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
        if !self.get_candidates(peers).contains(&Op::Read(op)) {
            return Err(WalbError::PredecessorsUnsatisfied {
                pid: self.pack.pid().unwrap_or(u64::MAX),
                op: op.name(),
            });
        }
        self.set_bit(op);
        if op == ReadOp::Read {
            let storage = match self.mode {
                Mode::Fast => &mut *v_storage,
                Mode::Slow => &mut *r_storage,
            };
            for req in self.pack.requests_mut() {
                req.execute_io(storage);
            }
        }
        Ok(())
    }
}

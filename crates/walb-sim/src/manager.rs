//! Schedules pack-state transitions across a whole simulation run.

use tracing::{debug, error, trace};
use walb_kernel::{Mode, Op, PackState, ReadOp, WriteOp};
use walb_types::{DiskImage, Pack, WalbError, WalbResult};

/// Owns the three shadow devices and every pack in the run, and answers
/// "what's legal right now" / "do this" for the driver.
///
/// Mirrors the reference implementation's `PackStateManager`: `vStorage`
/// and `rStorage` start as clones of the initial image, `fStorage` stays
/// untouched as the read-witness fallback source.
#[derive(Debug)]
pub struct PackStateManager {
    f_storage: DiskImage,
    v_storage: DiskImage,
    r_storage: DiskImage,
    states: Vec<PackState>,
    first_pack_id_per_plug: Vec<u64>,
    first_not_ended_pid: u64,
    mode: Mode,
}

impl PackStateManager {
    /// `plug_pack_list` is one `Vec<Pack>` per plug, already split by
    /// [`walb_kernel::PackBuilder`]. Assigns pids and rids in plug/pack
    /// order as it registers them.
    pub fn new(disk: DiskImage, plug_pack_list: Vec<Vec<Pack>>, mode: Mode) -> WalbResult<Self> {
        let disk_size = disk.len() as u64;
        let mut states = Vec::new();
        let mut first_pack_id_per_plug = Vec::with_capacity(plug_pack_list.len());
        let mut pid: u64 = 0;
        let mut rid: u64 = 0;

        for plug in plug_pack_list {
            if plug.is_empty() {
                return Err(WalbError::EmptyPlug);
            }
            first_pack_id_per_plug.push(pid);
            for mut pack in plug {
                pack.validate_nonempty()?;
                for req in pack.requests() {
                    let end = req.addr().saturating_add(req.size());
                    if end > disk_size {
                        return Err(WalbError::RequestOutOfRange {
                            addr: req.addr(),
                            size: req.size(),
                            disk_size,
                        });
                    }
                }
                pack.set_pid(pid);
                pid += 1;
                for req in pack.requests_mut() {
                    req.set_rid(rid);
                    rid += 1;
                }
                states.push(PackState::new(pack, mode));
            }
        }

        let v_storage = disk.clone();
        let r_storage = disk.clone();
        Ok(Self {
            f_storage: disk,
            v_storage,
            r_storage,
            states,
            first_pack_id_per_plug,
            first_not_ended_pid: 0,
            mode,
        })
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn v_storage(&self) -> &DiskImage {
        &self.v_storage
    }

    pub fn r_storage(&self) -> &DiskImage {
        &self.r_storage
    }

    pub fn first_not_ended_pid(&self) -> u64 {
        self.first_not_ended_pid
    }

    pub fn total_num_packs(&self) -> u64 {
        self.states.len() as u64
    }

    fn plug_id_of(&self, pid: u64) -> usize {
        match self.first_pack_id_per_plug.binary_search(&pid) {
            Ok(i) => i,
            Err(i) => i - 1,
        }
    }

    fn upper_pid_of_plug(&self, plug_id: usize) -> u64 {
        self.first_pack_id_per_plug
            .get(plug_id)
            .copied()
            .unwrap_or(self.total_num_packs())
    }

    /// Every `(pid, op)` pair legal right now, looking ahead `n_plug` plugs
    /// past the first not-ended pack.
    pub fn get_candidates(&self, n_plug: u32) -> Vec<(u64, Op)> {
        let pid0 = self.first_not_ended_pid;
        let plug0 = self.plug_id_of(pid0);
        let pid1 = self.upper_pid_of_plug(plug0 + n_plug as usize);

        let mut out = Vec::new();
        for pid in pid0..pid1 {
            let peers = &self.states[pid0 as usize..pid as usize];
            for op in self.states[pid as usize].get_candidates(peers) {
                out.push((pid, op));
            }
        }
        trace!(n_plug, pid0, pid1, candidates = out.len(), "computed candidate set");
        out
    }

    /// Applies `op` to pack `pid`, updates the read-witness bookkeeping,
    /// validates any read that just completed, and advances the watermark.
    /// Returns whether the watermark moved.
    pub fn execute(&mut self, pid: u64, op: Op) -> WalbResult<bool> {
        trace!(pid, op = op.name(), "executing");
        let idx = pid as usize;
        {
            let (peers, rest) = self.states.split_at_mut(idx);
            let peer_slice = &peers[self.first_not_ended_pid as usize..];
            rest[0].execute(op, peer_slice, &mut self.v_storage, &mut self.r_storage)?;
        }

        self.capture_witness(idx, op);
        self.validate_read(idx, op)?;

        Ok(self.advance_watermark(idx))
    }

    /// On a read pack's `SUBMIT`, records the fallback byte and the
    /// not-yet-ended writers covering each address it will touch. Computed
    /// over the *entire* pack list, not just the driver's peer window: a
    /// writer can outlive the window and still be a legal witness.
    fn capture_witness(&mut self, idx: usize, op: Op) {
        if op != Op::Read(ReadOp::Submit) {
            return;
        }
        let addrs: Vec<u64> = self.states[idx].pack().addrs().collect();
        let mut computed = Vec::with_capacity(addrs.len());
        for addr in addrs {
            let fallback = self
                .states
                .iter()
                .rev()
                .find(|s| s.is_ended() && s.is_write() && s.pack().has_addr(addr))
                .map_or_else(|| self.f_storage.byte_at(addr), |s| s.pack().data_at(addr));

            let writer_pids: Vec<u64> = self
                .states
                .iter()
                .filter(|s| !s.is_ended() && s.is_write() && s.pack().has_addr(addr))
                .filter_map(walb_kernel::PackState::pid)
                .collect();

            computed.push((addr, fallback, writer_pids));
        }
        let read = self.states[idx].as_read_mut().expect("SUBMIT only fires on read packs");
        for (addr, fallback, writer_pids) in computed {
            read.set_witness(addr, fallback, writer_pids);
        }
    }

    /// On a read pack's `END_REQ`, checks every byte it read against the
    /// witness captured at `SUBMIT`, widened to writers that have since
    /// begun (started executing, even if not yet ended).
    fn validate_read(&mut self, idx: usize, op: Op) -> WalbResult<()> {
        if op != Op::Read(ReadOp::EndReq) {
            return Ok(());
        }
        let Some(read) = self.states[idx].as_read() else {
            return Ok(());
        };
        let pid = read.pack().pid().unwrap_or(u64::MAX);
        for addr in read.pack().addrs() {
            let observed = read.pack().data_at(addr);
            let (fallback, writer_pids) = read.witness_at(addr).expect("witness captured at SUBMIT");
            let mut allowed = vec![fallback];
            for &wpid in writer_pids {
                let writer = &self.states[wpid as usize];
                if writer.is_begun() {
                    allowed.push(writer.pack().data_at(addr));
                }
            }
            if !allowed.contains(&observed) {
                error!(pid, addr, observed, ?allowed, "read inconsistency");
                return Err(WalbError::ReadInconsistency {
                    pid,
                    addr,
                    observed,
                    allowed,
                });
            }
        }
        Ok(())
    }

    fn advance_watermark(&mut self, idx: usize) -> bool {
        if !self.states[idx].is_ended() {
            return false;
        }
        let pid0 = self.first_not_ended_pid as usize;
        if !self.states[pid0..idx].iter().all(PackState::is_ended) {
            return false;
        }
        let mut next = idx + 1;
        while next < self.states.len() && self.states[next].is_ended() {
            next += 1;
        }
        self.first_not_ended_pid = next as u64;
        debug!(first_not_ended_pid = next, "watermark advanced");
        true
    }

    /// Walks forward from the watermark redoing any write pack whose log
    /// was durable but whose shadow images weren't, stopping at the first
    /// pack whose log pack never completed. Returns the resulting
    /// watermark (the pid recovery stopped at).
    pub fn do_crash_recovery(&mut self) -> u64 {
        let mut idx = self.first_not_ended_pid as usize;
        while idx < self.states.len() {
            if self.states[idx].is_write() {
                let complete_lpack = self.states[idx].as_write().expect("checked is_write").complete_lpack_set();
                if !complete_lpack {
                    break;
                }
                let needs_redo = {
                    let w = self.states[idx].as_write().expect("checked is_write");
                    !w.write_vstorage_set() || !w.write_rstorage_set()
                };
                if needs_redo {
                    debug!(pid = idx, "crash recovery redoing write pack");
                    self.states[idx].reset_for_recovery();
                    let w = self.states[idx].as_write_mut().expect("checked is_write");
                    w.force_execute(WriteOp::WriteVstorage, &mut self.v_storage, &mut self.r_storage);
                    w.force_execute(WriteOp::WriteRstorage, &mut self.v_storage, &mut self.r_storage);
                }
            }
            self.states[idx].mark_recovered();
            self.first_not_ended_pid = idx as u64 + 1;
            idx += 1;
        }
        self.first_not_ended_pid
    }
}

#[cfg(test)]
mod tests {
    use walb_types::{DiskImage, Pack, Request, WalbError};

    use super::PackStateManager;
    use walb_kernel::Mode;

    #[test]
    fn new_rejects_out_of_range_request() {
        let disk = DiskImage::new(4);
        let mut pack = Pack::new(true);
        pack.push(Request::write(2, vec![1, 2, 3])).unwrap();

        let err = PackStateManager::new(disk, vec![vec![pack]], Mode::Fast).unwrap_err();
        assert!(matches!(
            err,
            WalbError::RequestOutOfRange {
                addr: 2,
                size: 3,
                disk_size: 4
            }
        ));
    }

    #[test]
    fn new_accepts_a_request_touching_the_last_byte() {
        let disk = DiskImage::new(4);
        let mut pack = Pack::new(true);
        pack.push(Request::write(3, vec![9])).unwrap();

        assert!(PackStateManager::new(disk, vec![vec![pack]], Mode::Fast).is_ok());
    }
}

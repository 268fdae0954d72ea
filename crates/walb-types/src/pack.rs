//! Non-overlapping, uniform-direction batches of requests.

use crate::error::{WalbError, WalbResult};
use crate::request::Request;

/// An ordered, non-empty list of requests, all of the same direction, with
/// no two overlapping in byte range. `pid` is assigned by the manager at
/// registration time.
#[derive(Debug, Clone)]
pub struct Pack {
    is_write: bool,
    requests: Vec<Request>,
    pid: Option<u64>,
}

impl Pack {
    /// Creates an empty pack of the given direction. Use [`Pack::push`] to
    /// fill it; an empty pack is not a legal input to the kernel.
    pub fn new(is_write: bool) -> Self {
        Self {
            is_write,
            requests: Vec::new(),
            pid: None,
        }
    }

    /// Appends `req` to the pack. Returns an error if `req`'s direction
    /// doesn't match the pack's, or if it overlaps a request already in it.
    pub fn push(&mut self, req: Request) -> WalbResult<()> {
        if req.is_write() != self.is_write {
            return Err(WalbError::DirectionMismatch {
                pack_is_write: self.is_write,
                req_is_write: req.is_write(),
            });
        }
        for existing in &self.requests {
            if existing.overlaps(&req) {
                return Err(WalbError::IntraPackOverlap {
                    pid: self.pid.unwrap_or(u64::MAX),
                    addr: req.addr().max(existing.addr()),
                });
            }
        }
        self.requests.push(req);
        Ok(())
    }

    /// True if `req` would overlap any request currently in the pack.
    pub fn overlaps_request(&self, req: &Request) -> bool {
        self.requests.iter().any(|existing| existing.overlaps(req))
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    pub fn is_write(&self) -> bool {
        self.is_write
    }

    pub fn requests(&self) -> &[Request] {
        &self.requests
    }

    pub fn requests_mut(&mut self) -> &mut [Request] {
        &mut self.requests
    }

    pub fn pid(&self) -> Option<u64> {
        self.pid
    }

    pub fn set_pid(&mut self, pid: u64) {
        self.pid = Some(pid);
    }

    /// True if any request in the pack covers `addr`.
    pub fn has_addr(&self, addr: u64) -> bool {
        self.requests.iter().any(|r| r.has_addr(addr))
    }

    /// The byte this pack holds at `addr` (exactly one request must cover it).
    pub fn data_at(&self, addr: u64) -> u8 {
        self.requests
            .iter()
            .find(|r| r.has_addr(addr))
            .unwrap_or_else(|| panic!("pack does not cover addr {addr}"))
            .data_at(addr)
    }

    /// Every byte address touched by this pack, in request order.
    pub fn addrs(&self) -> impl Iterator<Item = u64> + '_ {
        self.requests
            .iter()
            .flat_map(|r| r.addr()..r.addr() + r.size())
    }

    /// True if this pack and `other` share any byte address.
    pub fn overlaps(&self, other: &Pack) -> bool {
        self.requests
            .iter()
            .any(|req| other.overlaps_request(req))
    }

    pub fn validate_nonempty(&self) -> WalbResult<()> {
        if self.is_empty() {
            return Err(WalbError::EmptyPack);
        }
        Ok(())
    }
}

/// An ordered list of packs produced from one burst of submitted requests.
/// A plug is a scheduling fence: the manager may look ahead `nPlug` plugs
/// at a time, never past a plug boundary beyond that.
pub type Plug = Vec<Pack>;

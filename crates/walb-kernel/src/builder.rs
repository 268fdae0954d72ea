//! Splits one plug's flat request stream into its read and write packs.

use walb_types::{Pack, Request, WalbError, WalbResult};

/// Builds the pack list for a single plug.
///
/// Walks the plug's requests in submission order, keeping one open write
/// pack and one open read pack. A request joins the pack matching its
/// direction unless it would overlap a request already in that pack, in
/// which case the open pack is closed and a fresh one started. The two
/// packs are independent: a write overlapping the open write pack doesn't
/// touch the open read pack, and vice versa.
pub struct PackBuilder;

impl PackBuilder {
    /// `requests` is one plug's worth of requests in submission order.
    /// Returns the packs in the order they were closed (write pack and
    /// read pack may interleave however the overlaps dictated).
    pub fn build(requests: Vec<Request>) -> WalbResult<Vec<Pack>> {
        if requests.is_empty() {
            return Err(WalbError::EmptyPlug);
        }

        let mut packs = Vec::new();
        let mut wpack = Pack::new(true);
        let mut rpack = Pack::new(false);

        for req in requests {
            if req.is_write() {
                if wpack.overlaps_request(&req) {
                    packs.push(std::mem::replace(&mut wpack, Pack::new(true)));
                }
                wpack.push(req).expect("direction and overlap already checked");
            } else {
                if rpack.overlaps_request(&req) {
                    packs.push(std::mem::replace(&mut rpack, Pack::new(false)));
                }
                rpack.push(req).expect("direction and overlap already checked");
            }
        }
        if !wpack.is_empty() {
            packs.push(wpack);
        }
        if !rpack.is_empty() {
            packs.push(rpack);
        }
        Ok(packs)
    }
}

use proptest::prelude::*;
use walb_types::{DiskImage, Pack, Request};

use crate::{Mode, Op, PackBuilder, PackState, ReadOp, WriteOp};

#[test]
fn builder_splits_by_direction_and_overlap() {
    let reqs = vec![
        Request::write(0, vec![1]),
        Request::write(0, vec![2]), // overlaps -> closes first write pack
        Request::read(4, 1),
        Request::read(4, 1), // overlaps -> closes first read pack
    ];
    let packs = PackBuilder::build(reqs).unwrap();
    assert_eq!(packs.len(), 4);
    assert!(packs[0].is_write());
    assert!(!packs[1].is_write());
    assert!(packs[2].is_write());
    assert!(!packs[3].is_write());
}

#[test]
fn builder_rejects_empty_plug() {
    assert!(PackBuilder::build(vec![]).is_err());
}

fn has_intra_pack_overlap(pack: &Pack) -> bool {
    let reqs = pack.requests();
    reqs.iter()
        .enumerate()
        .any(|(i, a)| reqs.iter().enumerate().any(|(j, b)| i != j && a.overlaps(b)))
}

#[test]
fn builder_never_produces_an_overlapping_pack() {
    let reqs = vec![
        Request::write(0, vec![1, 2]),
        Request::write(5, vec![3]),
        Request::read(0, 1),
        Request::read(9, 1),
    ];
    for pack in PackBuilder::build(reqs).unwrap() {
        assert!(!has_intra_pack_overlap(&pack));
    }
}

#[test]
fn write_pack_rejects_repeated_op() {
    let mut pack = Pack::new(true);
    pack.push(Request::write(0, vec![9])).unwrap();
    let mut state = PackState::new(pack, Mode::Fast);
    let mut v = DiskImage::new(1);
    let mut r = DiskImage::new(1);
    state.execute(Op::Write(WriteOp::SubmitLpack), &[], &mut v, &mut r).unwrap();
    let err = state.execute(Op::Write(WriteOp::SubmitLpack), &[], &mut v, &mut r);
    assert!(err.is_err());
}

#[test]
fn read_pack_candidates_progress_in_order() {
    let mut pack = Pack::new(false);
    pack.push(Request::read(0, 1)).unwrap();
    let mut state = PackState::new(pack, Mode::Fast);
    let mut v = DiskImage::new(1);
    let mut r = DiskImage::new(1);

    assert_eq!(state.get_candidates(&[]), vec![Op::Read(ReadOp::Submit)]);
    state.execute(Op::Read(ReadOp::Submit), &[], &mut v, &mut r).unwrap();
    assert_eq!(state.get_candidates(&[]), vec![Op::Read(ReadOp::Read)]);
    state.execute(Op::Read(ReadOp::Read), &[], &mut v, &mut r).unwrap();
    assert_eq!(state.get_candidates(&[]), vec![Op::Read(ReadOp::Complete)]);
    state.execute(Op::Read(ReadOp::Complete), &[], &mut v, &mut r).unwrap();
    assert_eq!(state.get_candidates(&[]), vec![Op::Read(ReadOp::EndReq)]);
    state.execute(Op::Read(ReadOp::EndReq), &[], &mut v, &mut r).unwrap();
    assert!(state.get_candidates(&[]).is_empty());
    assert!(state.is_ended());
}

#[test]
fn write_pack_submit_dpack_waits_for_overlapping_predecessor() {
    let mut predecessor_pack = Pack::new(true);
    predecessor_pack.push(Request::write(0, vec![1])).unwrap();
    let mut predecessor = PackState::new(predecessor_pack, Mode::Fast);

    let mut own_pack = Pack::new(true);
    own_pack.push(Request::write(0, vec![2])).unwrap();
    let mut own = PackState::new(own_pack, Mode::Fast);

    let mut v = DiskImage::new(1);
    let mut r = DiskImage::new(1);

    // Drive the predecessor up to WRITE_VSTORAGE, but not its datapack, so
    // `own` may catch up to WRITE_VSTORAGE too (log-order visibility is
    // satisfied) while COMPLETE_DPACK is still missing.
    for op in [WriteOp::SubmitLpack, WriteOp::CompleteLpack, WriteOp::WriteVstorage] {
        predecessor.execute(Op::Write(op), &[], &mut v, &mut r).unwrap();
    }
    for op in [WriteOp::SubmitLpack, WriteOp::CompleteLpack, WriteOp::WriteVstorage] {
        own.execute(Op::Write(op), &[predecessor.clone()], &mut v, &mut r).unwrap();
    }
    // SUBMIT_DPACK must not be a candidate: predecessor overlaps and hasn't completed its dpack.
    assert!(!own
        .get_candidates(&[predecessor.clone()])
        .contains(&Op::Write(WriteOp::SubmitDpack)));

    for op in [WriteOp::SubmitDpack, WriteOp::WriteRstorage, WriteOp::CompleteDpack] {
        predecessor.execute(Op::Write(op), &[], &mut v, &mut r).unwrap();
    }
    assert!(own
        .get_candidates(&[predecessor])
        .contains(&Op::Write(WriteOp::SubmitDpack)));
}

fn arb_request(disk_size: u64) -> impl Strategy<Value = Request> {
    (1u64..disk_size, any::<bool>()).prop_flat_map(move |(size, is_write)| {
        let size = size.min(disk_size);
        (0..=disk_size - size).prop_map(move |addr| {
            if is_write {
                Request::write(addr, vec![0xAB; size as usize])
            } else {
                Request::read(addr, size)
            }
        })
    })
}

proptest! {
    /// A pack built by the builder never contains two overlapping requests,
    /// for arbitrary request streams.
    #[test]
    fn builder_output_never_self_overlaps(reqs in proptest::collection::vec(arb_request(32), 1..16)) {
        let packs = PackBuilder::build(reqs).unwrap();
        for pack in packs {
            prop_assert!(!has_intra_pack_overlap(&pack));
        }
    }

    /// A single, peer-free write pack's bits only ever grow: once set,
    /// `get_candidates` never re-offers it.
    #[test]
    fn write_pack_bits_are_monotone(_seed: u8) {
        let mut pack = Pack::new(true);
        pack.push(Request::write(0, vec![1])).unwrap();
        let mut state = PackState::new(pack, Mode::Fast);
        let mut v = DiskImage::new(1);
        let mut r = DiskImage::new(1);
        let mut seen = std::collections::HashSet::new();

        while let Some(&op) = state.get_candidates(&[]).first() {
            prop_assert!(seen.insert(op), "op {:?} offered twice", op);
            state.execute(op, &[], &mut v, &mut r).unwrap();
        }
        prop_assert!(state.is_ended());
    }
}

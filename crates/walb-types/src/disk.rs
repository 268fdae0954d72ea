//! Flat shadow block device.

use crate::error::DiffEntry;

/// A fixed-size, byte-addressable disk image.
///
/// The simulator keeps three of these: `fStorage` (the immutable seed
/// image), `vStorage` (fed by the log-fast write path) and `rStorage` (fed
/// by the data-pack path). Block size is fixed at one byte (see Non-goals).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskImage {
    bytes: Vec<u8>,
}

impl DiskImage {
    /// Creates a zero-filled image of `size` bytes. `size` must be positive.
    pub fn new(size: usize) -> Self {
        assert!(size > 0, "disk size must be positive");
        Self {
            bytes: vec![0; size],
        }
    }

    /// Creates an image from existing bytes.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        assert!(!bytes.is_empty(), "disk size must be positive");
        Self { bytes }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    pub fn byte_at(&self, addr: u64) -> u8 {
        self.bytes[addr as usize]
    }

    pub(crate) fn slice(&self, i0: usize, i1: usize) -> &[u8] {
        &self.bytes[i0..i1]
    }

    pub(crate) fn slice_mut(&mut self, i0: usize, i1: usize) -> &mut [u8] {
        &mut self.bytes[i0..i1]
    }

    /// Returns every address at which `self` and `other` differ.
    pub fn diff(&self, other: &DiskImage) -> Vec<DiffEntry> {
        assert_eq!(self.bytes.len(), other.bytes.len(), "disk images must be the same size");
        self.bytes
            .iter()
            .zip(other.bytes.iter())
            .enumerate()
            .filter_map(|(addr, (&left, &right))| {
                (left != right).then_some(DiffEntry {
                    addr: addr as u64,
                    left,
                    right,
                })
            })
            .collect()
    }
}

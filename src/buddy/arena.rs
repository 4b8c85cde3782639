//! Owned arena buffer
//!
//! The arena is the only backing store for blocks. Headers are read and
//! written through arena offsets so that nothing outside this module touches
//! header bytes directly.

use alloc::{boxed::Box, vec};

use super::buddy_block::{BlockHeader, HEADER_SIZE};

/// Contiguous byte region of `2^order` bytes.
pub struct Arena {
    bytes: Box<[u8]>,
}

impl Arena {
    /// Allocate a zeroed arena of `size` bytes.
    pub fn new(size: usize) -> Self {
        Self {
            bytes: vec![0u8; size].into_boxed_slice(),
        }
    }

    /// Arena size in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Zero the whole arena, invalidating every header.
    pub fn reset(&mut self) {
        self.bytes.fill(0);
    }

    /// Read the header stored at `offset`, if there is one.
    pub fn header(&self, offset: usize) -> Option<BlockHeader> {
        self.bytes.get(offset..).and_then(BlockHeader::decode)
    }

    /// Write `header` at `offset`.
    ///
    /// `offset` must leave room for a full header; block starts always do.
    pub fn write_header(&mut self, offset: usize, header: BlockHeader) {
        header.encode(&mut self.bytes[offset..offset + HEADER_SIZE]);
    }

    /// Read-modify-write the header at `offset`.
    ///
    /// Returns `false` if no valid header is stored there.
    pub fn update_header(&mut self, offset: usize, f: impl FnOnce(&mut BlockHeader)) -> bool {
        match self.header(offset) {
            Some(mut header) => {
                f(&mut header);
                self.write_header(offset, header);
                true
            }
            None => false,
        }
    }

    /// Erase the header at `offset` so it no longer decodes.
    pub fn erase_header(&mut self, offset: usize) {
        BlockHeader::erase(&mut self.bytes[offset..offset + HEADER_SIZE]);
    }

    /// Bytes in `[start, start + len)`.
    pub fn slice(&self, start: usize, len: usize) -> &[u8] {
        &self.bytes[start..start + len]
    }

    /// Mutable bytes in `[start, start + len)`.
    pub fn slice_mut(&mut self, start: usize, len: usize) -> &mut [u8] {
        &mut self.bytes[start..start + len]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arena_headers() {
        let mut arena = Arena::new(64);
        assert_eq!(arena.len(), 64);
        assert_eq!(arena.header(0), None);

        arena.write_header(32, BlockHeader::free(5, None, Some(0)));
        assert_eq!(arena.header(32), Some(BlockHeader::free(5, None, Some(0))));

        assert!(arena.update_header(32, |h| h.next = Some(16)));
        assert_eq!(arena.header(32).unwrap().next, Some(16));
        assert!(!arena.update_header(8, |h| h.used = true));

        arena.erase_header(32);
        assert_eq!(arena.header(32), None);
    }

    #[test]
    fn test_arena_reset_and_bounds() {
        let mut arena = Arena::new(16);
        arena.write_header(8, BlockHeader::used(3));
        arena.slice_mut(0, 4).copy_from_slice(&[1, 2, 3, 4]);
        assert_eq!(arena.slice(0, 4), &[1, 2, 3, 4]);

        arena.reset();
        assert_eq!(arena.header(8), None);
        assert_eq!(arena.slice(0, 4), &[0, 0, 0, 0]);

        // Too few bytes left for a header.
        assert_eq!(arena.header(12), None);
        assert_eq!(arena.header(64), None);
    }
}

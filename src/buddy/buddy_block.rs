//! Buddy block metadata
//!
//! Block headers are stored inline at the start of every block. A header is
//! [`HEADER_SIZE`] bytes:
//!
//! ```text
//!   0      1       2                5                8
//!   +------+-------+----------------+----------------+
//!   | tag  | order | next (24 bit)  | prev (24 bit)  |
//!   +------+-------+----------------+----------------+
//! ```
//!
//! Links are little-endian arena offsets, `0xFF_FFFF` meaning "none". The
//! 24-bit link width is what bounds [`MAX_ORDER`].

/// Size in bytes of the header prefixed to every block.
pub const HEADER_SIZE: usize = 8;

/// Maximum arena order supported (16 MiB arena).
pub const MAX_ORDER: usize = 24;

/// Order of the smallest block that can hold a header and one payload byte.
pub const MIN_BLOCK_ORDER: usize = order_for(HEADER_SIZE + 1);

/// Smallest supported arena order.
pub const MIN_ARENA_ORDER: usize = MIN_BLOCK_ORDER;

const TAG_FREE: u8 = 0xB0;
const TAG_USED: u8 = 0xB1;
const LINK_NONE: usize = 0xFF_FFFF;

/// Calculates the size in bytes of a block with the given order.
#[inline]
pub const fn size_for_order(order: usize) -> usize {
    1 << order
}

/// Returns the smallest order `>= 1` whose block size can hold `request` bytes.
///
/// `request` must already include the header overhead. No upper bound is
/// applied: requests beyond `usize` range map to `usize::BITS`, which is
/// larger than any arena order.
pub const fn order_for(request: usize) -> usize {
    if request <= 2 {
        return 1;
    }
    match request.checked_next_power_of_two() {
        Some(size) => size.trailing_zeros() as usize,
        None => usize::BITS as usize,
    }
}

/// Calculate the buddy offset for the block at arena offset `pos` with `order`.
///
/// The buddy is the other half of the parent block at the next higher order.
#[inline]
pub const fn buddy_offset(pos: usize, order: usize) -> usize {
    pos ^ size_for_order(order)
}

/// Decoded block header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHeader {
    pub used: bool,
    pub order: usize,
    /// Next free block of the same order (meaningful only while free).
    pub next: Option<usize>,
    /// Previous free block of the same order (meaningful only while free).
    pub prev: Option<usize>,
}

impl BlockHeader {
    /// Header of a free block with the given links.
    pub const fn free(order: usize, next: Option<usize>, prev: Option<usize>) -> Self {
        Self {
            used: false,
            order,
            next,
            prev,
        }
    }

    /// Header of a block handed out to a caller.
    pub const fn used(order: usize) -> Self {
        Self {
            used: true,
            order,
            next: None,
            prev: None,
        }
    }

    /// Decode a header from the first [`HEADER_SIZE`] bytes of `bytes`.
    ///
    /// Returns `None` if the tag does not mark a header or the order is out of range.
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        let raw = bytes.get(..HEADER_SIZE)?;
        let used = match raw[0] {
            TAG_FREE => false,
            TAG_USED => true,
            _ => return None,
        };
        let order = raw[1] as usize;
        if order > MAX_ORDER {
            return None;
        }
        Some(Self {
            used,
            order,
            next: decode_link(&raw[2..5]),
            prev: decode_link(&raw[5..8]),
        })
    }

    /// Encode this header into the first [`HEADER_SIZE`] bytes of `bytes`.
    pub fn encode(&self, bytes: &mut [u8]) {
        let raw = &mut bytes[..HEADER_SIZE];
        raw[0] = if self.used { TAG_USED } else { TAG_FREE };
        raw[1] = self.order as u8;
        encode_link(self.next, &mut raw[2..5]);
        encode_link(self.prev, &mut raw[5..8]);
    }

    /// Wipe the header so the bytes no longer decode as a block.
    pub fn erase(bytes: &mut [u8]) {
        bytes[..HEADER_SIZE].fill(0);
    }
}

fn decode_link(raw: &[u8]) -> Option<usize> {
    let link = raw[0] as usize | (raw[1] as usize) << 8 | (raw[2] as usize) << 16;
    (link != LINK_NONE).then_some(link)
}

fn encode_link(link: Option<usize>, raw: &mut [u8]) {
    let link = link.unwrap_or(LINK_NONE);
    debug_assert!(link <= LINK_NONE);
    raw[0] = link as u8;
    raw[1] = (link >> 8) as u8;
    raw[2] = (link >> 16) as u8;
}

/// Opaque handle to an allocated block.
///
/// Wraps the arena offset of the payload, i.e. the block offset plus
/// [`HEADER_SIZE`]. The header is recovered by offset arithmetic inside the
/// arena, never through a raw pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockHandle(usize);

impl BlockHandle {
    /// Build a handle from a raw payload offset.
    ///
    /// Handles forged this way are checked on release and payload access.
    pub const fn from_raw(offset: usize) -> Self {
        Self(offset)
    }

    /// Payload offset inside the arena.
    pub const fn offset(self) -> usize {
        self.0
    }

    pub(crate) const fn for_block(block_offset: usize) -> Self {
        Self(block_offset + HEADER_SIZE)
    }

    /// Offset of the block header this handle points past.
    pub(crate) const fn block_offset(self) -> Option<usize> {
        self.0.checked_sub(HEADER_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_for_rounds_up() {
        assert_eq!(order_for(0), 1);
        assert_eq!(order_for(1), 1);
        assert_eq!(order_for(2), 1);
        assert_eq!(order_for(3), 2);
        assert_eq!(order_for(12), 4);
        assert_eq!(order_for(16), 4);
        assert_eq!(order_for(17), 5);
        assert_eq!(order_for(1 << 20), 20);
        assert_eq!(order_for((1 << 20) + 1), 21);
        assert_eq!(order_for(usize::MAX), usize::BITS as usize);
    }

    #[test]
    fn test_order_for_is_monotonic() {
        let mut last = order_for(0);
        for request in 1..5000 {
            let order = order_for(request);
            assert!(order >= last, "order_for({}) decreased", request);
            assert!(size_for_order(order) >= request);
            last = order;
        }
    }

    #[test]
    fn test_min_block_order() {
        assert_eq!(MIN_BLOCK_ORDER, 4);
        assert!(size_for_order(MIN_BLOCK_ORDER) > HEADER_SIZE);
        assert!(size_for_order(MIN_BLOCK_ORDER - 1) <= HEADER_SIZE);
    }

    #[test]
    fn test_buddy_offset() {
        assert_eq!(buddy_offset(0, 4), 16);
        assert_eq!(buddy_offset(16, 4), 0);
        assert_eq!(buddy_offset(32, 4), 48);
        assert_eq!(buddy_offset(32, 5), 0);
        assert_eq!(buddy_offset(0x300, 8), 0x200);
    }

    #[test]
    fn test_header_codec() {
        let mut bytes = [0u8; HEADER_SIZE];
        let header = BlockHeader::free(17, Some(0x1_2340), None);
        header.encode(&mut bytes);
        assert_eq!(BlockHeader::decode(&bytes), Some(header));

        let header = BlockHeader::free(MAX_ORDER, None, Some(0xFF_FFF0));
        header.encode(&mut bytes);
        assert_eq!(BlockHeader::decode(&bytes), Some(header));

        BlockHeader::used(5).encode(&mut bytes);
        let decoded = BlockHeader::decode(&bytes).unwrap();
        assert!(decoded.used);
        assert_eq!(decoded.order, 5);
    }

    #[test]
    fn test_header_rejects_garbage() {
        assert_eq!(BlockHeader::decode(&[0u8; HEADER_SIZE]), None);
        assert_eq!(BlockHeader::decode(&[TAG_USED; 4]), None);

        let mut bytes = [0u8; HEADER_SIZE];
        BlockHeader::used(3).encode(&mut bytes);
        bytes[1] = (MAX_ORDER + 1) as u8;
        assert_eq!(BlockHeader::decode(&bytes), None);

        BlockHeader::used(3).encode(&mut bytes);
        BlockHeader::erase(&mut bytes);
        assert_eq!(BlockHeader::decode(&bytes), None);
    }

    #[test]
    fn test_handle_offsets() {
        let handle = BlockHandle::for_block(64);
        assert_eq!(handle.offset(), 64 + HEADER_SIZE);
        assert_eq!(handle.block_offset(), Some(64));
        assert_eq!(BlockHandle::from_raw(3).block_offset(), None);
    }
}

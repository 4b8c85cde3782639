//! Free-list registry
//!
//! One intrusive doubly-linked list per order. The list nodes are the block
//! headers themselves, so the registry only keeps the heads, the lengths and a
//! bitmask of non-empty orders.

#[cfg(feature = "log")]
use log::error;

use super::{
    arena::Arena,
    buddy_block::{BlockHeader, MAX_ORDER},
};

/// Per-order free lists of blocks stored in an [`Arena`].
///
/// Insertion and removal are O(1); blocks of one order are served LIFO.
pub struct FreeLists {
    heads: [Option<usize>; MAX_ORDER + 1],
    lens: [usize; MAX_ORDER + 1],
    /// Bit `k` is set iff list `k` is non-empty
    nonempty: u32,
}

impl FreeLists {
    /// Create an empty registry
    pub const fn new() -> Self {
        Self {
            heads: [None; MAX_ORDER + 1],
            lens: [0; MAX_ORDER + 1],
            nonempty: 0,
        }
    }

    /// Forget every list. Headers in the arena are left untouched.
    pub fn clear(&mut self) {
        self.heads = [None; MAX_ORDER + 1];
        self.lens = [0; MAX_ORDER + 1];
        self.nonempty = 0;
    }

    /// Mark the block at `offset` free with `order` and push it to the front of list `order`.
    pub fn insert(&mut self, arena: &mut Arena, order: usize, offset: usize) {
        let head = self.heads[order];
        arena.write_header(offset, BlockHeader::free(order, head, None));

        if let Some(head) = head {
            if !arena.update_header(head, |h| h.prev = Some(offset)) {
                error!("free list {}: head {:#x} has no valid header", order, head);
            }
        }

        self.heads[order] = Some(offset);
        self.lens[order] += 1;
        self.nonempty |= 1 << order;
    }

    /// Splice the block at `offset` out of list `order`.
    ///
    /// Returns `false` if the block is not a free block of that order.
    pub fn remove(&mut self, arena: &mut Arena, order: usize, offset: usize) -> bool {
        let header = match arena.header(offset) {
            Some(h) if !h.used && h.order == order => h,
            _ => {
                error!(
                    "free list {}: block {:#x} is not a free block of this order",
                    order, offset
                );
                return false;
            }
        };

        match header.prev {
            Some(prev) => {
                arena.update_header(prev, |h| h.next = header.next);
            }
            None => self.heads[order] = header.next,
        }
        if let Some(next) = header.next {
            arena.update_header(next, |h| h.prev = header.prev);
        }

        self.lens[order] -= 1;
        if self.heads[order].is_none() {
            self.nonempty &= !(1 << order);
        }
        true
    }

    /// Pop the most recently inserted block of `order`.
    pub fn pop_front(&mut self, arena: &mut Arena, order: usize) -> Option<usize> {
        let head = self.heads[order]?;
        self.remove(arena, order, head).then_some(head)
    }

    /// Smallest order strictly above `order` that has a free block.
    pub fn first_nonempty_above(&self, order: usize) -> Option<usize> {
        if order >= MAX_ORDER {
            return None;
        }
        let above = self.nonempty >> (order + 1);
        (above != 0).then(|| order + 1 + above.trailing_zeros() as usize)
    }

    /// Largest order that has a free block.
    pub fn highest_nonempty(&self) -> Option<usize> {
        (self.nonempty != 0).then(|| (u32::BITS - 1 - self.nonempty.leading_zeros()) as usize)
    }

    pub fn head(&self, order: usize) -> Option<usize> {
        self.heads.get(order).copied().flatten()
    }

    pub fn is_empty(&self, order: usize) -> bool {
        self.head(order).is_none()
    }

    /// Number of free blocks in list `order`.
    pub fn len(&self, order: usize) -> usize {
        self.lens.get(order).copied().unwrap_or(0)
    }

    /// Iterate the offsets of list `order`, head first.
    pub fn iter<'a>(&self, arena: &'a Arena, order: usize) -> FreeListIter<'a> {
        FreeListIter {
            arena,
            current: self.head(order),
        }
    }
}

impl Default for FreeLists {
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator over the block offsets of one free list.
pub struct FreeListIter<'a> {
    arena: &'a Arena,
    current: Option<usize>,
}

impl Iterator for FreeListIter<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<Self::Item> {
        let offset = self.current?;
        self.current = self.arena.header(offset).and_then(|h| h.next);
        Some(offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;

    #[test]
    fn test_free_list_lifo() {
        let mut arena = Arena::new(256);
        let mut lists = FreeLists::new();
        assert!(lists.is_empty(4));

        lists.insert(&mut arena, 4, 0x00);
        lists.insert(&mut arena, 4, 0x20);
        lists.insert(&mut arena, 4, 0x40);
        assert_eq!(lists.len(4), 3);

        let items: Vec<_> = lists.iter(&arena, 4).collect();
        assert_eq!(items, [0x40, 0x20, 0x00]);

        assert_eq!(lists.pop_front(&mut arena, 4), Some(0x40));
        assert_eq!(lists.pop_front(&mut arena, 4), Some(0x20));
        assert_eq!(lists.pop_front(&mut arena, 4), Some(0x00));
        assert_eq!(lists.pop_front(&mut arena, 4), None);
        assert!(lists.is_empty(4));
    }

    #[test]
    fn test_free_list_remove_middle_and_tail() {
        let mut arena = Arena::new(256);
        let mut lists = FreeLists::new();
        for offset in [0x00, 0x20, 0x40, 0x60] {
            lists.insert(&mut arena, 5, offset);
        }

        assert!(lists.remove(&mut arena, 5, 0x40));
        assert!(lists.remove(&mut arena, 5, 0x00));
        let items: Vec<_> = lists.iter(&arena, 5).collect();
        assert_eq!(items, [0x60, 0x20]);
        assert_eq!(arena.header(0x20).unwrap().prev, Some(0x60));
        assert_eq!(arena.header(0x20).unwrap().next, None);

        assert!(lists.remove(&mut arena, 5, 0x60));
        assert_eq!(lists.head(5), Some(0x20));
        assert_eq!(arena.header(0x20).unwrap().prev, None);
    }

    #[test]
    fn test_free_list_rejects_wrong_order() {
        let mut arena = Arena::new(64);
        let mut lists = FreeLists::new();
        lists.insert(&mut arena, 4, 0x10);

        assert!(!lists.remove(&mut arena, 5, 0x10));
        assert!(!lists.remove(&mut arena, 4, 0x20));
        assert_eq!(lists.len(4), 1);
    }

    #[test]
    fn test_nonempty_mask() {
        let mut arena = Arena::new(1024);
        let mut lists = FreeLists::new();
        assert_eq!(lists.first_nonempty_above(0), None);
        assert_eq!(lists.highest_nonempty(), None);

        lists.insert(&mut arena, 6, 0x000);
        lists.insert(&mut arena, 9, 0x200);
        assert_eq!(lists.first_nonempty_above(3), Some(6));
        assert_eq!(lists.first_nonempty_above(6), Some(9));
        assert_eq!(lists.first_nonempty_above(9), None);
        assert_eq!(lists.first_nonempty_above(MAX_ORDER), None);
        assert_eq!(lists.highest_nonempty(), Some(9));

        lists.pop_front(&mut arena, 6);
        assert_eq!(lists.first_nonempty_above(3), Some(9));

        lists.clear();
        assert_eq!(lists.highest_nonempty(), None);
        assert_eq!(lists.len(9), 0);
    }
}

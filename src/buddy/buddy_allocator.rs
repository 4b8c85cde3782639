//! Buddy allocator over a single owned arena
//!
//! Allocation rounds the request (plus header) up to a power-of-two order and
//! splits the smallest sufficient free block down to that order. Release walks
//! upward from the freed block, merging with its buddy for as long as the
//! buddy is a free block of the same order.

use crate::{AllocError, AllocResult};

#[cfg(feature = "log")]
use log::{debug, info, trace, warn};

#[cfg(feature = "tracking")]
use super::stats::{BuddyStats, MemoryStatsReporter};

use super::{
    arena::Arena,
    buddy_block::{
        buddy_offset, order_for, size_for_order, BlockHandle, BlockHeader, HEADER_SIZE,
        MAX_ORDER, MIN_ARENA_ORDER, MIN_BLOCK_ORDER,
    },
    free_list::{FreeListIter, FreeLists},
};

/// Buddy allocator owning an arena of `2^ORDER` bytes
///
/// The arena and the free-list registry are owned by this value; every
/// operation goes through `&mut self`. Wrap it in a lock to share it.
pub struct BuddyAllocator<const ORDER: usize = { crate::DEFAULT_ARENA_ORDER }> {
    arena: Arena,
    free_lists: FreeLists,
    #[cfg(feature = "tracking")]
    stats: BuddyStats,
}

impl<const ORDER: usize> BuddyAllocator<ORDER> {
    /// Arena size in bytes.
    pub const ARENA_SIZE: usize = size_for_order(ORDER);

    /// Create an allocator with a fresh arena holding one free block of `ORDER`.
    pub fn new() -> Self {
        const {
            assert!(
                ORDER >= MIN_ARENA_ORDER && ORDER <= MAX_ORDER,
                "arena order out of supported range"
            );
        };

        let mut allocator = Self {
            arena: Arena::new(Self::ARENA_SIZE),
            free_lists: FreeLists::new(),
            #[cfg(feature = "tracking")]
            stats: BuddyStats::new(),
        };
        allocator.initialize();
        allocator
    }

    /// Reset to a single free block covering the whole arena.
    ///
    /// Every handle issued before the call becomes invalid.
    pub fn initialize(&mut self) {
        self.arena.reset();
        self.free_lists.clear();
        self.free_lists.insert(&mut self.arena, ORDER, 0);

        #[cfg(feature = "tracking")]
        {
            self.stats = BuddyStats::new();
        }
    }

    /// Allocate a block whose payload holds at least `size` bytes.
    pub fn allocate(&mut self, size: usize) -> AllocResult<BlockHandle> {
        if size == 0 {
            warn!("buddy allocator: zero-size allocation rejected");
            return Err(AllocError::ZeroSizeRequest);
        }

        let order = match size.checked_add(HEADER_SIZE).map(order_for) {
            Some(order) if order <= ORDER => order,
            _ => {
                warn!(
                    "buddy allocator: request of {} bytes does not fit arena of {} bytes",
                    size,
                    Self::ARENA_SIZE
                );
                return Err(AllocError::OversizedRequest);
            }
        };

        let offset = match self.obtain_block(order) {
            Some(offset) => offset,
            None => {
                debug!(
                    "buddy allocator: allocation failure: {} bytes (order {})",
                    size, order
                );
                #[cfg(feature = "tracking")]
                self.report_failure(size, order);
                return Err(AllocError::PoolExhausted);
            }
        };

        self.arena.write_header(offset, BlockHeader::used(order));

        #[cfg(feature = "tracking")]
        {
            self.stats.allocations += 1;
        }

        Ok(BlockHandle::for_block(offset))
    }

    /// Release a block previously returned by [`Self::allocate`].
    ///
    /// The block is merged with its buddy as long as the buddy is free and of
    /// the same order. Handles that do not name a live block are rejected with
    /// [`AllocError::InvalidRelease`] and leave the arena untouched.
    pub fn release(&mut self, handle: BlockHandle) -> AllocResult {
        let (mut offset, mut order) = self.live_block(handle)?;

        while order < ORDER {
            let buddy = buddy_offset(offset, order);
            match self.arena.header(buddy) {
                Some(header) if !header.used && header.order == order => {}
                _ => break,
            }
            if !self.free_lists.remove(&mut self.arena, order, buddy) {
                break;
            }

            trace!(
                "buddy allocator: merge {:#x} with buddy {:#x} at order {}",
                offset,
                buddy,
                order
            );

            // The lower half is the parent's start; the upper header is now payload.
            self.arena.erase_header(offset.max(buddy));
            offset = offset.min(buddy);
            order += 1;
        }

        self.free_lists.insert(&mut self.arena, order, offset);

        #[cfg(feature = "tracking")]
        {
            self.stats.releases += 1;
        }

        Ok(())
    }

    /// Payload bytes of a live block.
    pub fn payload(&self, handle: BlockHandle) -> AllocResult<&[u8]> {
        let (offset, order) = self.live_block(handle)?;
        Ok(self
            .arena
            .slice(offset + HEADER_SIZE, size_for_order(order) - HEADER_SIZE))
    }

    /// Mutable payload bytes of a live block.
    pub fn payload_mut(&mut self, handle: BlockHandle) -> AllocResult<&mut [u8]> {
        let (offset, order) = self.live_block(handle)?;
        Ok(self
            .arena
            .slice_mut(offset + HEADER_SIZE, size_for_order(order) - HEADER_SIZE))
    }

    /// Take a free block of exactly `order`, splitting a larger one if needed.
    fn obtain_block(&mut self, order: usize) -> Option<usize> {
        if let Some(offset) = self.free_lists.pop_front(&mut self.arena, order) {
            return Some(offset);
        }

        let from = self.free_lists.first_nonempty_above(order)?;
        let offset = self.free_lists.pop_front(&mut self.arena, from)?;
        Some(self.split_block(offset, from, order))
    }

    /// Halve the detached block at `offset` from order `from` down to `to`,
    /// registering every upper half as a free block.
    fn split_block(&mut self, offset: usize, from: usize, to: usize) -> usize {
        let mut order = from;
        while order > to {
            order -= 1;
            let upper = offset + size_for_order(order);
            trace!(
                "buddy allocator: split {:#x} into order {} halves, upper {:#x}",
                offset,
                order,
                upper
            );
            self.free_lists.insert(&mut self.arena, order, upper);
        }
        offset
    }

    /// Resolve `handle` to the `(offset, order)` of the used block it points into.
    fn live_block(&self, handle: BlockHandle) -> AllocResult<(usize, usize)> {
        let block = handle
            .block_offset()
            .filter(|&offset| offset < Self::ARENA_SIZE)
            .and_then(|offset| self.arena.header(offset).map(|header| (offset, header)));

        match block {
            Some((offset, header))
                if header.used
                    && (MIN_BLOCK_ORDER..=ORDER).contains(&header.order)
                    && offset % size_for_order(header.order) == 0 =>
            {
                Ok((offset, header.order))
            }
            _ => {
                warn!(
                    "buddy allocator: handle {:#x} does not refer to a live block",
                    handle.offset()
                );
                Err(AllocError::InvalidRelease)
            }
        }
    }

    /// Arena size exponent.
    pub const fn order(&self) -> usize {
        ORDER
    }

    /// Arena size in bytes.
    pub const fn arena_size(&self) -> usize {
        Self::ARENA_SIZE
    }

    /// Number of free blocks of the given order.
    pub fn free_block_count(&self, order: usize) -> usize {
        self.free_lists.len(order)
    }

    /// Offsets of the free blocks of `order`, in the order they will be served.
    pub fn free_blocks(&self, order: usize) -> FreeListIter<'_> {
        self.free_lists.iter(&self.arena, order)
    }

    /// Total bytes held by free blocks.
    pub fn free_bytes(&self) -> usize {
        (0..=ORDER)
            .map(|order| self.free_lists.len(order) * size_for_order(order))
            .sum()
    }

    /// Largest order that currently has a free block.
    pub fn largest_free_order(&self) -> Option<usize> {
        self.free_lists.highest_nonempty()
    }

    /// Walk the arena block by block, following the headers.
    ///
    /// The walk stops early if a block start holds no valid header.
    pub fn blocks(&self) -> Blocks<'_> {
        Blocks {
            arena: &self.arena,
            offset: 0,
        }
    }

    #[cfg(feature = "tracking")]
    pub fn stats(&self) -> BuddyStats {
        let mut stats = self.stats;
        for order in 0..=MAX_ORDER {
            stats.free_blocks_by_order[order] = self.free_lists.len(order);
        }
        stats.refresh_bytes(Self::ARENA_SIZE);
        stats
    }

    #[cfg(feature = "tracking")]
    fn report_failure(&mut self, size: usize, order: usize) {
        self.stats.failed_allocations += 1;
        MemoryStatsReporter::print_alloc_failure_stats(&self.stats(), size, order);
    }

    /// Print the arena layout and free-list distribution
    pub fn print_free_lists(&self) {
        info!("========== Buddy Allocator Free Lists ==========");
        info!(
            "Arena size: {:#x} ({} KB), order {}",
            Self::ARENA_SIZE,
            Self::ARENA_SIZE / 1024,
            ORDER
        );
        info!("Free bytes: {:#x}", self.free_bytes());

        for order in (0..=ORDER).rev() {
            let block_count = self.free_lists.len(order);
            if block_count > 0 {
                info!(
                    "  Order {}: {} blocks (size {} bytes each, total {:#x})",
                    order,
                    block_count,
                    size_for_order(order),
                    block_count * size_for_order(order)
                );
            }
        }
        info!("================================================");
    }
}

impl<const ORDER: usize> Default for BuddyAllocator<ORDER> {
    fn default() -> Self {
        Self::new()
    }
}

/// One block found while walking the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockInfo {
    pub offset: usize,
    pub order: usize,
    pub used: bool,
}

impl BlockInfo {
    pub const fn size(&self) -> usize {
        size_for_order(self.order)
    }
}

/// Iterator returned by [`BuddyAllocator::blocks`].
pub struct Blocks<'a> {
    arena: &'a Arena,
    offset: usize,
}

impl Iterator for Blocks<'_> {
    type Item = BlockInfo;

    fn next(&mut self) -> Option<Self::Item> {
        if self.offset >= self.arena.len() {
            return None;
        }
        let header = self.arena.header(self.offset)?;
        let info = BlockInfo {
            offset: self.offset,
            order: header.order,
            used: header.used,
        };
        self.offset += info.size();
        Some(info)
    }
}

//! Buddy allocator module
//!
//! This module provides the complete buddy system over one owned arena:
//! - Inline block headers and the buddy address arithmetic
//! - Intrusive per-order free lists
//! - Split and merge engines behind `allocate` / `release`
//! - Statistics and debugging

pub mod arena;
pub mod buddy_allocator;
pub mod buddy_block;
pub mod free_list;
#[cfg(feature = "tracking")]
pub mod stats;

pub use arena::Arena;
pub use buddy_allocator::{BlockInfo, Blocks, BuddyAllocator};
pub use buddy_block::{
    buddy_offset, order_for, size_for_order, BlockHandle, BlockHeader, HEADER_SIZE, MAX_ORDER,
    MIN_ARENA_ORDER, MIN_BLOCK_ORDER,
};
pub use free_list::{FreeListIter, FreeLists};
#[cfg(feature = "tracking")]
pub use stats::BuddyStats;

//! Buddy Arena Allocator
//!
//! A fixed-size, power-of-two buddy allocator over a single owned arena,
//! featuring:
//! - Per-order free lists whose links live inline in the block headers
//! - O(log N) splitting on allocation and buddy coalescing on release
//! - Hardened release that rejects foreign or already-released handles
//! - Optional statistics and failure reporting (`tracking` feature)

#![no_std]

extern crate alloc;

use core::fmt;

// Logging support - conditionally import log crate
#[cfg(feature = "log")]
extern crate log;

// Stub macros when log is disabled - these become no-ops
#[cfg(not(feature = "log"))]
macro_rules! error {
    ($($arg:tt)*) => {};
}
#[cfg(not(feature = "log"))]
macro_rules! warn {
    ($($arg:tt)*) => {};
}
#[cfg(not(feature = "log"))]
macro_rules! info {
    ($($arg:tt)*) => {};
}
#[cfg(not(feature = "log"))]
macro_rules! debug {
    ($($arg:tt)*) => {};
}
#[cfg(not(feature = "log"))]
macro_rules! trace {
    ($($arg:tt)*) => {};
}

/// Default arena size exponent (`2^20` = 1 MiB).
pub const DEFAULT_ARENA_ORDER: usize = 20;

/// The error type used for allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocError {
    /// A zero-byte allocation was requested.
    ZeroSizeRequest,
    /// The request plus header overhead does not fit in the whole arena.
    OversizedRequest,
    /// No free block is large enough, even after splitting.
    PoolExhausted,
    /// The handle does not name a block currently handed out by the allocator.
    InvalidRelease,
}

impl fmt::Display for AllocError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AllocError::ZeroSizeRequest => f.write_str("zero-size allocation requested"),
            AllocError::OversizedRequest => f.write_str("request exceeds the arena size"),
            AllocError::PoolExhausted => f.write_str("no free block large enough"),
            AllocError::InvalidRelease => f.write_str("handle does not refer to a live block"),
        }
    }
}

/// A [`Result`] type with [`AllocError`] as the error type.
pub type AllocResult<T = ()> = Result<T, AllocError>;

pub mod buddy;
pub use buddy::{
    buddy_offset, order_for, size_for_order, BlockHandle, BlockInfo, BuddyAllocator,
    HEADER_SIZE, MAX_ORDER, MIN_ARENA_ORDER, MIN_BLOCK_ORDER,
};
#[cfg(feature = "tracking")]
pub use buddy::BuddyStats;

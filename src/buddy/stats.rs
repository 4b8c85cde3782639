//! Statistics and debugging for buddy allocator
//!
//! Provides statistics tracking and failure reporting. Only built with the
//! `tracking` feature.

use super::buddy_block::{size_for_order, MAX_ORDER};

/// Buddy system statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuddyStats {
    pub total_bytes: usize,
    pub free_bytes: usize,
    pub used_bytes: usize,
    pub free_blocks_by_order: [usize; MAX_ORDER + 1],
    /// Successful allocations since the last `initialize`
    pub allocations: usize,
    /// Successful releases since the last `initialize`
    pub releases: usize,
    pub failed_allocations: usize,
}

impl Default for BuddyStats {
    fn default() -> Self {
        Self::new()
    }
}

impl BuddyStats {
    pub const fn new() -> Self {
        Self {
            total_bytes: 0,
            free_bytes: 0,
            used_bytes: 0,
            free_blocks_by_order: [0; MAX_ORDER + 1],
            allocations: 0,
            releases: 0,
            failed_allocations: 0,
        }
    }

    /// Number of blocks currently handed out.
    pub fn live_allocations(&self) -> usize {
        self.allocations.saturating_sub(self.releases)
    }

    /// Recompute the byte totals from `free_blocks_by_order`.
    pub(crate) fn refresh_bytes(&mut self, total_bytes: usize) {
        self.total_bytes = total_bytes;
        self.free_bytes = self
            .free_blocks_by_order
            .iter()
            .enumerate()
            .map(|(order, &count)| count * size_for_order(order))
            .sum();
        self.used_bytes = total_bytes.saturating_sub(self.free_bytes);
    }
}

/// Detailed memory statistics reporter
pub struct MemoryStatsReporter;

impl MemoryStatsReporter {
    /// Print detailed allocation failure statistics
    /// This is a standalone function to keep allocation logic clean
    #[allow(unused_variables)]
    pub fn print_alloc_failure_stats(
        stats: &BuddyStats,
        request_bytes: usize,
        request_order: usize,
    ) {
        {
            #[cfg(feature = "log")]
            use log::error;
            error!("========================================");
            error!(
                "Request: {} bytes (order {}, block {} bytes)",
                request_bytes,
                request_order,
                size_for_order(request_order)
            );

            error!("Arena State:");
            error!("  Total bytes: {}", stats.total_bytes);
            error!("  Free bytes: {}", stats.free_bytes);
            error!("  Used bytes: {}", stats.used_bytes);
            error!(
                "  Live allocations: {} (failed so far: {})",
                stats.live_allocations(),
                stats.failed_allocations
            );
            error!("  Free blocks by order:");

            for order in (0..=MAX_ORDER).rev() {
                let count = stats.free_blocks_by_order[order];
                if count > 0 {
                    error!(
                        "    Order {}: {} blocks ({} bytes each, {} bytes total)",
                        order,
                        count,
                        size_for_order(order),
                        count * size_for_order(order)
                    );
                }
            }

            error!("========================================");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refresh_bytes() {
        let mut stats = BuddyStats::new();
        stats.free_blocks_by_order[4] = 2;
        stats.free_blocks_by_order[6] = 1;
        stats.refresh_bytes(256);

        assert_eq!(stats.total_bytes, 256);
        assert_eq!(stats.free_bytes, 96);
        assert_eq!(stats.used_bytes, 160);
    }

    #[test]
    fn test_live_allocations() {
        let mut stats = BuddyStats::new();
        stats.allocations = 5;
        stats.releases = 3;
        assert_eq!(stats.live_allocations(), 2);
    }
}

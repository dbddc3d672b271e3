use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Trait for tracking adjacency store activity during a bulk load.
///
/// Implementations receive one callback per appended target and per
/// structural event (block relocation, array growth). The stores call these
/// from their single writer; the `Send + Sync` bound only lets a handle be
/// shared with whoever reports the numbers.
pub trait StoreMetrics: Send + Sync {
    /// Records one appended adjacency entry.
    fn target_added(&self);

    /// Records a paged-store block overflow that chained a new block.
    fn block_relocated(&self);

    /// Records forward pointers followed while locating a node's active block.
    fn page_hops(&self, hops: u64);

    /// Records a per-node array (plain or byte) being grown.
    fn array_grown(&self);
}

/// A no-op implementation of [`StoreMetrics`] that discards all recorded metrics.
#[derive(Default)]
pub struct NoopMetrics;

impl StoreMetrics for NoopMetrics {
    fn target_added(&self) {}
    fn block_relocated(&self) {}
    fn page_hops(&self, _hops: u64) {}
    fn array_grown(&self) {}
}

/// Atomic counter implementation of [`StoreMetrics`].
#[derive(Default)]
pub struct CounterMetrics {
    /// Number of adjacency entries appended.
    pub targets_added: AtomicU64,

    /// Number of blocks chained after an overflow.
    pub blocks_relocated: AtomicU64,

    /// Total forward pointers followed across all appends.
    pub page_hops: AtomicU64,

    /// Number of per-node array growths.
    pub arrays_grown: AtomicU64,
}

impl StoreMetrics for CounterMetrics {
    fn target_added(&self) {
        self.targets_added.fetch_add(1, Ordering::Relaxed);
    }

    fn block_relocated(&self) {
        self.blocks_relocated.fetch_add(1, Ordering::Relaxed);
    }

    fn page_hops(&self, hops: u64) {
        if hops > 0 {
            self.page_hops.fetch_add(hops, Ordering::Relaxed);
        }
    }

    fn array_grown(&self) {
        self.arrays_grown.fetch_add(1, Ordering::Relaxed);
    }
}

/// Returns the default metrics implementation (no-op).
pub fn default_metrics() -> Arc<dyn StoreMetrics> {
    Arc::new(NoopMetrics)
}

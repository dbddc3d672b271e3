//! Adjacency storage engine and its compressed building blocks.
//!
//! Implements the bulk-built per-node adjacency stores and the sorted pair
//! block used for relationship-to-node id maps.

/// Per-node adjacency stores.
///
/// The tagged store enum and its variants, from the discarding baseline to
/// the block-chained paged arena.
pub mod adjacency;

/// Sorted id pair block.
///
/// Delta and delta-of-delta compressed `(primary, secondary)` pairs.
pub mod pair_block;

mod metrics;
mod options;

/// Store variants and lifecycle.
pub use adjacency::{
    estimated_fan_out, AdjacencyStore, AppendTrace, BlockInfo, ByteArrayStore, NullStore,
    PagedBufferStore, Phase, PlainArrayStore, StoreKind, StoreSizing,
};

/// Metrics and profiling.
pub use metrics::{default_metrics, CounterMetrics, NoopMetrics, StoreMetrics};

/// Store configuration options.
pub use options::{
    StoreOptions, DEFAULT_ARENA_GROWTH_FACTOR, DEFAULT_BYTES_PER_EDGE, DEFAULT_MIN_FAN_OUT,
};

pub use pair_block::{IdPair, PairBlock};

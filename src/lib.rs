//! Compressed in-memory adjacency lists for bulk-loaded graphs.
//!
//! Edge tuples are streamed into one of several [`storage::AdjacencyStore`]
//! variants that trade CPU for memory: delta-encoded target ids, run-length
//! collapsed repeats, and minimal-width variable-length integers.

pub mod primitives;
pub mod storage;
pub mod types;

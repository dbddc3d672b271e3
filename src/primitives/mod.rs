//! Low-level primitives for building the adjacency stores.
//!
//! Includes the integer codecs and the run-length id buffer.

/// Byte-level utilities and encoding/decoding.
///
/// Variable-length integer codecs and fixed-width helpers over byte slices.
pub mod bytes;

/// Run-length compressed integer sequences.
///
/// Write-once, replay-many buffers of biased, run-collapsed values.
pub mod rle;

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::primitives::bytes::IntCodec;
use crate::storage::metrics::StoreMetrics;
use crate::types::{AdjError, Result};

/// Default per-edge byte budget used to size a node's first block or array.
pub const DEFAULT_BYTES_PER_EDGE: usize = 4;
/// Smallest fan-out estimate any store is sized with.
pub const DEFAULT_MIN_FAN_OUT: usize = 4;
/// Paged arena limit relative to the root block region.
pub const DEFAULT_ARENA_GROWTH_FACTOR: f64 = 1.5;

/// Configuration options supplied when constructing an adjacency store.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreOptions {
    /// Integer codec for the byte-array and paged stores
    pub codec: IntCodec,
    /// Bytes reserved per estimated edge when sizing initial capacity
    pub bytes_per_edge: usize,
    /// Lower bound for the fan-out estimate
    pub min_fan_out: usize,
    /// Arena limit as a multiple of `total_nodes * block_size`
    pub arena_growth_factor: f64,
    /// Optional metrics collection implementation
    #[serde(skip)]
    pub metrics: Option<Arc<dyn StoreMetrics>>,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            codec: IntCodec::default(),
            bytes_per_edge: DEFAULT_BYTES_PER_EDGE,
            min_fan_out: DEFAULT_MIN_FAN_OUT,
            arena_growth_factor: DEFAULT_ARENA_GROWTH_FACTOR,
            metrics: None,
        }
    }
}

impl StoreOptions {
    /// Creates options with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses options from a TOML document. Missing keys keep their defaults.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let options: StoreOptions = toml::from_str(raw)?;
        options.validate()?;
        Ok(options)
    }

    /// Reads and parses a TOML options file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    /// Selects the integer codec.
    pub fn codec(mut self, codec: IntCodec) -> Self {
        self.codec = codec;
        self
    }

    /// Sets the per-edge byte budget.
    pub fn bytes_per_edge(mut self, bytes: usize) -> Self {
        self.bytes_per_edge = bytes;
        self
    }

    /// Sets the minimum fan-out estimate.
    pub fn min_fan_out(mut self, fan_out: usize) -> Self {
        self.min_fan_out = fan_out;
        self
    }

    /// Sets the arena growth factor for the paged store.
    pub fn arena_growth_factor(mut self, factor: f64) -> Self {
        self.arena_growth_factor = factor;
        self
    }

    /// Sets the metrics collection implementation.
    pub fn metrics(mut self, metrics: Arc<dyn StoreMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.bytes_per_edge == 0 {
            return Err(AdjError::Invalid("bytes_per_edge must be positive"));
        }
        if self.min_fan_out == 0 {
            return Err(AdjError::Invalid("min_fan_out must be positive"));
        }
        if !(self.arena_growth_factor.is_finite() && self.arena_growth_factor >= 1.0) {
            return Err(AdjError::Invalid("arena_growth_factor must be at least 1.0"));
        }
        Ok(())
    }
}

impl fmt::Debug for StoreOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreOptions")
            .field("codec", &self.codec)
            .field("bytes_per_edge", &self.bytes_per_edge)
            .field("min_fan_out", &self.min_fan_out)
            .field("arena_growth_factor", &self.arena_growth_factor)
            .field("metrics", &self.metrics.is_some())
            .finish()
    }
}

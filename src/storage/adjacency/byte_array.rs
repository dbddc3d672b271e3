use std::sync::Arc;

use tracing::debug;

use super::{checked_capacity, log_close, log_init, metrics_from, reserved, Lifecycle, StoreKind};
use crate::primitives::bytes::IntCodec;
use crate::storage::metrics::StoreMetrics;
use crate::storage::options::StoreOptions;
use crate::types::{AdjError, Direction, NodeId, RelType, Result};

/// One growable byte array per node holding codec-encoded target ids.
///
/// An array is doubled whenever fewer than `codec.max_len()` bytes remain,
/// so an append never has to split an encoded value.
pub struct ByteArrayStore {
    options: StoreOptions,
    codec: IntCodec,
    metrics: Arc<dyn StoreMetrics>,
    nodes: Vec<Vec<u8>>,
    reallocations: u64,
    bytes_written: u64,
    pub(super) lifecycle: Lifecycle,
}

impl ByteArrayStore {
    pub fn new(options: StoreOptions) -> Self {
        Self {
            codec: options.codec,
            metrics: metrics_from(&options),
            options,
            nodes: Vec::new(),
            reallocations: 0,
            bytes_written: 0,
            lifecycle: Lifecycle::new(),
        }
    }

    pub fn init(&mut self, total_nodes: u64, total_rels: u64) -> Result<()> {
        let sizing = self.lifecycle.plan(total_nodes, total_rels, &self.options)?;
        let node_count = sizing.total_nodes as usize;
        let budget = checked_capacity("byte array", sizing.fan_out, self.options.bytes_per_edge)?;
        let initial = budget.saturating_add(self.codec.max_len());
        checked_capacity("byte arrays", node_count, initial)?;
        let mut nodes = reserved("node table", node_count)?;
        for _ in 0..node_count {
            nodes.push(reserved("byte array", initial)?);
        }
        self.nodes = nodes;
        self.lifecycle.begin(sizing);
        log_init(StoreKind::ByteArray, &sizing, self.determine_size());
        Ok(())
    }

    pub fn add_target(
        &mut self,
        node: NodeId,
        target: NodeId,
        _ty: RelType,
        _direction: Direction,
    ) -> Result<()> {
        let idx = self.lifecycle.admit(node, target)?;
        let max_len = self.codec.max_len();
        let bytes = &mut self.nodes[idx];
        if bytes.len() + max_len > bytes.capacity() {
            let grow = bytes.capacity().max(max_len);
            bytes.reserve_exact(grow);
            self.reallocations += 1;
            self.metrics.array_grown();
            debug!(
                node = node.0,
                capacity = bytes.capacity(),
                "byte_array.array.grown"
            );
        }
        let written = self.codec.push_u64(target.0, bytes);
        self.bytes_written += written as u64;
        self.metrics.target_added();
        Ok(())
    }

    pub fn targets(&mut self, node: NodeId) -> Result<Vec<NodeId>> {
        let idx = self.lifecycle.begin_read(node)?;
        self.lifecycle.seal();
        let bytes = &self.nodes[idx];
        let mut out = Vec::new();
        let mut pos = 0;
        while pos < bytes.len() {
            let (value, len) = self.codec.decode_u64(bytes, pos)?;
            out.push(NodeId(value));
            pos += len;
        }
        if pos != bytes.len() {
            return Err(AdjError::DecodeInconsistency("trailing bytes in node array"));
        }
        Ok(out)
    }

    /// Logical bytes of encoded ids across all nodes.
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    pub fn determine_size(&self) -> u64 {
        self.nodes
            .iter()
            .map(|bytes| bytes.capacity() as u64)
            .sum()
    }

    pub fn reallocation_count(&self) -> u64 {
        self.reallocations
    }

    pub fn close(&mut self) -> Result<()> {
        self.lifecycle.close()?;
        log_close(
            StoreKind::ByteArray,
            self.determine_size(),
            self.reallocations,
            self.lifecycle.appended(),
        );
        Ok(())
    }
}

impl std::fmt::Debug for ByteArrayStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ByteArrayStore")
            .field("codec", &self.codec)
            .field("nodes", &self.nodes.len())
            .field("reallocations", &self.reallocations)
            .field("bytes_written", &self.bytes_written)
            .field("lifecycle", &self.lifecycle)
            .finish()
    }
}

use std::mem;
use std::sync::Arc;

use tracing::debug;

use super::{checked_capacity, log_close, log_init, metrics_from, reserved, Lifecycle, StoreKind};
use crate::storage::metrics::StoreMetrics;
use crate::storage::options::StoreOptions;
use crate::types::{Direction, NodeId, RelType, Result};

/// Uncompressed id arrays, one per node, doubled when full.
pub struct PlainArrayStore {
    options: StoreOptions,
    metrics: Arc<dyn StoreMetrics>,
    nodes: Vec<Vec<u64>>,
    reallocations: u64,
    pub(super) lifecycle: Lifecycle,
}

impl PlainArrayStore {
    pub fn new(options: StoreOptions) -> Self {
        Self {
            metrics: metrics_from(&options),
            options,
            nodes: Vec::new(),
            reallocations: 0,
            lifecycle: Lifecycle::new(),
        }
    }

    pub fn init(&mut self, total_nodes: u64, total_rels: u64) -> Result<()> {
        let sizing = self.lifecycle.plan(total_nodes, total_rels, &self.options)?;
        // StoreSizing::new checked that the node count fits in usize.
        let node_count = sizing.total_nodes as usize;
        checked_capacity(
            "plain arrays",
            node_count,
            checked_capacity("plain array", sizing.fan_out, mem::size_of::<u64>())?,
        )?;
        let mut nodes = reserved("node table", node_count)?;
        for _ in 0..node_count {
            nodes.push(reserved("plain array", sizing.fan_out)?);
        }
        self.nodes = nodes;
        self.lifecycle.begin(sizing);
        log_init(StoreKind::PlainArray, &sizing, self.determine_size());
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
        let entries = &mut self.nodes[idx];
        if entries.len() == entries.capacity() {
            let grow = entries.capacity().max(1);
            entries.reserve_exact(grow);
            self.reallocations += 1;
            self.metrics.array_grown();
            debug!(
                node = node.0,
                capacity = entries.capacity(),
                "plain.array.grown"
            );
        }
        entries.push(target.0);
        self.metrics.target_added();
        Ok(())
    }

    pub fn targets(&mut self, node: NodeId) -> Result<Vec<NodeId>> {
        let idx = self.lifecycle.begin_read(node)?;
        self.lifecycle.seal();
        Ok(self.nodes[idx].iter().copied().map(NodeId).collect())
    }

    pub fn determine_size(&self) -> u64 {
        self.nodes
            .iter()
            .map(|entries| (entries.capacity() * mem::size_of::<u64>()) as u64)
            .sum()
    }

    pub fn reallocation_count(&self) -> u64 {
        self.reallocations
    }

    pub fn close(&mut self) -> Result<()> {
        self.lifecycle.close()?;
        log_close(
            StoreKind::PlainArray,
            self.determine_size(),
            self.reallocations,
            self.lifecycle.appended(),
        );
        Ok(())
    }
}

impl std::fmt::Debug for PlainArrayStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlainArrayStore")
            .field("nodes", &self.nodes.len())
            .field("reallocations", &self.reallocations)
            .field("lifecycle", &self.lifecycle)
            .finish()
    }
}

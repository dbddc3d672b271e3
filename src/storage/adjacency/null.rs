use std::sync::Arc;

use super::{log_close, log_init, metrics_from, Lifecycle, StoreKind};
use crate::storage::metrics::StoreMetrics;
use crate::storage::options::StoreOptions;
use crate::types::{Direction, NodeId, RelType, Result};

/// Accepts and discards every entry; the baseline for producer throughput.
pub struct NullStore {
    options: StoreOptions,
    metrics: Arc<dyn StoreMetrics>,
    pub(super) lifecycle: Lifecycle,
}

impl NullStore {
    pub fn new(options: StoreOptions) -> Self {
        Self {
            metrics: metrics_from(&options),
            options,
            lifecycle: Lifecycle::new(),
        }
    }

    pub fn init(&mut self, total_nodes: u64, total_rels: u64) -> Result<()> {
        let sizing = self.lifecycle.plan(total_nodes, total_rels, &self.options)?;
        self.lifecycle.begin(sizing);
        log_init(StoreKind::Null, &sizing, 0);
        Ok(())
    }

    pub fn add_target(
        &mut self,
        node: NodeId,
        target: NodeId,
        _ty: RelType,
        _direction: Direction,
    ) -> Result<()> {
        self.lifecycle.admit(node, target)?;
        self.metrics.target_added();
        Ok(())
    }

    pub fn targets(&mut self, node: NodeId) -> Result<Vec<NodeId>> {
        self.lifecycle.begin_read(node)?;
        self.lifecycle.seal();
        Ok(Vec::new())
    }

    pub fn determine_size(&self) -> u64 {
        0
    }

    pub fn reallocation_count(&self) -> u64 {
        0
    }

    pub fn close(&mut self) -> Result<()> {
        self.lifecycle.close()?;
        log_close(StoreKind::Null, 0, 0, self.lifecycle.appended());
        Ok(())
    }
}

impl std::fmt::Debug for NullStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NullStore")
            .field("lifecycle", &self.lifecycle)
            .finish()
    }
}

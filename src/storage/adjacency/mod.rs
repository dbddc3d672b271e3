//! Bulk-built per-node adjacency lists.
//!
//! Every variant follows the same one-shot contract: `init` once with the
//! node and relationship totals, `add_target` up to `2 * total_rels` times,
//! read back, then `close`. The variants differ only in how the target ids
//! are laid out in memory.

use std::mem;
use std::sync::Arc;

use tracing::{info, warn};

use crate::storage::metrics::{default_metrics, StoreMetrics};
use crate::storage::options::StoreOptions;
use crate::types::{AdjError, Direction, EdgeTuple, NodeId, RelType, Relationship, Result};

mod byte_array;
mod null;
mod paged;
mod plain;

pub use byte_array::ByteArrayStore;
pub use null::NullStore;
pub use paged::{AppendTrace, BlockInfo, PagedBufferStore};
pub use plain::PlainArrayStore;

/// Selects the [`AdjacencyStore`] variant at construction time.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum StoreKind {
    /// Discards every entry.
    Null,
    /// One uncompressed growable id array per node.
    PlainArray,
    /// One codec-encoded growable byte array per node.
    ByteArray,
    /// Delta-encoded chains of fixed-size blocks in one shared arena.
    PagedBuffer,
}

impl StoreKind {
    pub const ALL: [StoreKind; 4] = [
        StoreKind::Null,
        StoreKind::PlainArray,
        StoreKind::ByteArray,
        StoreKind::PagedBuffer,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            StoreKind::Null => "null",
            StoreKind::PlainArray => "plain_array",
            StoreKind::ByteArray => "byte_array",
            StoreKind::PagedBuffer => "paged_buffer",
        }
    }
}

/// Where a store is in its write-once lifecycle.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Phase {
    /// Constructed, waiting for `init`.
    Created,
    /// Accepting `add_target` calls.
    Loading,
    /// A read-back happened; the store is read-only.
    Sealed,
    Closed,
}

/// Totals declared at `init` and the capacity estimate derived from them.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct StoreSizing {
    pub total_nodes: u64,
    pub total_rels: u64,
    /// Initial per-node entry capacity.
    pub fan_out: usize,
}

impl StoreSizing {
    pub fn new(total_nodes: u64, total_rels: u64, min_fan_out: usize) -> Result<Self> {
        if total_nodes == 0 {
            return Err(AdjError::Invalid("total_nodes must be positive"));
        }
        if usize::try_from(total_nodes).is_err() {
            warn!(total_nodes, "adjacency.nodes.unaddressable");
            return Err(AdjError::capacity(
                "node count",
                usize::MAX as u64,
                total_nodes,
            ));
        }
        let fan_out = estimated_fan_out(total_nodes, total_rels, min_fan_out);
        Ok(Self {
            total_nodes,
            total_rels,
            fan_out,
        })
    }

    /// Upper bound on `add_target` calls: one per relationship endpoint.
    pub fn max_appends(&self) -> u64 {
        self.total_rels.saturating_mul(2)
    }
}

/// Smallest power of two `>= 2 * (total_rels / total_nodes)`, at least `min_fan_out`.
pub fn estimated_fan_out(total_nodes: u64, total_rels: u64, min_fan_out: usize) -> usize {
    let per_node = total_rels / total_nodes.max(1);
    let estimate = per_node
        .saturating_mul(2)
        .checked_next_power_of_two()
        .unwrap_or(1 << 63);
    usize::try_from(estimate)
        .unwrap_or(usize::MAX)
        .max(min_fan_out)
}

/// Sequencing and bounds checks shared by every variant.
#[derive(Debug)]
pub(crate) struct Lifecycle {
    phase: Phase,
    sizing: Option<StoreSizing>,
    appended: u64,
}

impl Lifecycle {
    pub(crate) fn new() -> Self {
        Self {
            phase: Phase::Created,
            sizing: None,
            appended: 0,
        }
    }

    pub(crate) fn phase(&self) -> Phase {
        self.phase
    }

    pub(crate) fn sizing(&self) -> Option<StoreSizing> {
        self.sizing
    }

    pub(crate) fn appended(&self) -> u64 {
        self.appended
    }

    /// Checks an `init` call and derives its sizing without leaving `Created`,
    /// so a store whose allocation then fails never accepts appends.
    pub(crate) fn plan(
        &self,
        total_nodes: u64,
        total_rels: u64,
        options: &StoreOptions,
    ) -> Result<StoreSizing> {
        if self.phase != Phase::Created {
            return Err(AdjError::SequencingViolation("init called more than once"));
        }
        options.validate()?;
        StoreSizing::new(total_nodes, total_rels, options.min_fan_out)
    }

    pub(crate) fn begin(&mut self, sizing: StoreSizing) {
        self.sizing = Some(sizing);
        self.phase = Phase::Loading;
    }

    /// Validates one append and returns the node index to write to.
    pub(crate) fn admit(&mut self, node: NodeId, target: NodeId) -> Result<usize> {
        let sizing = match (self.phase, self.sizing) {
            (Phase::Loading, Some(sizing)) => sizing,
            (Phase::Created, _) => {
                return Err(AdjError::SequencingViolation("add_target before init"))
            }
            (Phase::Sealed, _) => {
                return Err(AdjError::SequencingViolation("add_target after read-back"))
            }
            (Phase::Closed, _) | (Phase::Loading, None) => {
                return Err(AdjError::SequencingViolation("add_target after close"))
            }
        };
        for id in [node, target] {
            if id.0 >= sizing.total_nodes {
                warn!(
                    node = id.0,
                    total_nodes = sizing.total_nodes,
                    "adjacency.node.out_of_range"
                );
                return Err(AdjError::capacity(
                    "node id",
                    sizing.total_nodes,
                    id.0.saturating_add(1),
                ));
            }
        }
        if self.appended >= sizing.max_appends() {
            warn!(
                appended = self.appended,
                limit = sizing.max_appends(),
                "adjacency.appends.exhausted"
            );
            return Err(AdjError::capacity(
                "adjacency entries",
                sizing.max_appends(),
                self.appended + 1,
            ));
        }
        self.appended += 1;
        // Bounded by total_nodes, which init checked against usize.
        Ok(node.0 as usize)
    }

    /// Checks that `node` may be read back; the first read seals the store.
    pub(crate) fn begin_read(&self, node: NodeId) -> Result<usize> {
        let sizing = match (self.phase, self.sizing) {
            (Phase::Loading | Phase::Sealed, Some(sizing)) => sizing,
            (Phase::Created, _) => return Err(AdjError::SequencingViolation("read before init")),
            _ => return Err(AdjError::SequencingViolation("read after close")),
        };
        if node.0 >= sizing.total_nodes {
            return Err(AdjError::capacity(
                "node id",
                sizing.total_nodes,
                node.0.saturating_add(1),
            ));
        }
        Ok(node.0 as usize)
    }

    pub(crate) fn seal(&mut self) {
        if self.phase == Phase::Loading {
            self.phase = Phase::Sealed;
        }
    }

    pub(crate) fn close(&mut self) -> Result<()> {
        match self.phase {
            Phase::Closed => Err(AdjError::SequencingViolation("close called twice")),
            _ => {
                self.phase = Phase::Closed;
                Ok(())
            }
        }
    }
}

/// An adjacency store variant chosen at construction time.
#[derive(Debug)]
pub enum AdjacencyStore {
    Null(NullStore),
    PlainArray(PlainArrayStore),
    ByteArray(ByteArrayStore),
    PagedBuffer(PagedBufferStore),
}

impl AdjacencyStore {
    pub fn new(kind: StoreKind, options: StoreOptions) -> Self {
        match kind {
            StoreKind::Null => AdjacencyStore::Null(NullStore::new(options)),
            StoreKind::PlainArray => AdjacencyStore::PlainArray(PlainArrayStore::new(options)),
            StoreKind::ByteArray => AdjacencyStore::ByteArray(ByteArrayStore::new(options)),
            StoreKind::PagedBuffer => AdjacencyStore::PagedBuffer(PagedBufferStore::new(options)),
        }
    }

    pub fn kind(&self) -> StoreKind {
        match self {
            AdjacencyStore::Null(_) => StoreKind::Null,
            AdjacencyStore::PlainArray(_) => StoreKind::PlainArray,
            AdjacencyStore::ByteArray(_) => StoreKind::ByteArray,
            AdjacencyStore::PagedBuffer(_) => StoreKind::PagedBuffer,
        }
    }

    pub fn init(&mut self, total_nodes: u64, total_rels: u64) -> Result<()> {
        match self {
            AdjacencyStore::Null(store) => store.init(total_nodes, total_rels),
            AdjacencyStore::PlainArray(store) => store.init(total_nodes, total_rels),
            AdjacencyStore::ByteArray(store) => store.init(total_nodes, total_rels),
            AdjacencyStore::PagedBuffer(store) => store.init(total_nodes, total_rels),
        }
    }

    /// Appends `target` to `node`'s adjacency list. Relationship type and
    /// direction are accepted but not retained by any variant.
    pub fn add_target(
        &mut self,
        node: NodeId,
        target: NodeId,
        ty: RelType,
        direction: Direction,
    ) -> Result<()> {
        match self {
            AdjacencyStore::Null(store) => store.add_target(node, target, ty, direction),
            AdjacencyStore::PlainArray(store) => store.add_target(node, target, ty, direction),
            AdjacencyStore::ByteArray(store) => store.add_target(node, target, ty, direction),
            AdjacencyStore::PagedBuffer(store) => store.add_target(node, target, ty, direction),
        }
    }

    pub fn add(&mut self, tuple: &EdgeTuple) -> Result<()> {
        self.add_target(tuple.node, tuple.target, tuple.ty, tuple.direction)
    }

    /// Records both endpoints of `rel`: outgoing from the source, incoming to the target.
    pub fn add_relationship(&mut self, rel: &Relationship) -> Result<()> {
        for tuple in rel.tuples() {
            self.add(&tuple)?;
        }
        Ok(())
    }

    /// Decodes `node`'s targets in append order. The first read seals the store.
    pub fn targets(&mut self, node: NodeId) -> Result<Vec<NodeId>> {
        match self {
            AdjacencyStore::Null(store) => store.targets(node),
            AdjacencyStore::PlainArray(store) => store.targets(node),
            AdjacencyStore::ByteArray(store) => store.targets(node),
            AdjacencyStore::PagedBuffer(store) => store.targets(node),
        }
    }

    /// Bytes of backing memory committed, not merely used.
    pub fn determine_size(&self) -> u64 {
        match self {
            AdjacencyStore::Null(store) => store.determine_size(),
            AdjacencyStore::PlainArray(store) => store.determine_size(),
            AdjacencyStore::ByteArray(store) => store.determine_size(),
            AdjacencyStore::PagedBuffer(store) => store.determine_size(),
        }
    }

    pub fn reallocation_count(&self) -> u64 {
        match self {
            AdjacencyStore::Null(store) => store.reallocation_count(),
            AdjacencyStore::PlainArray(store) => store.reallocation_count(),
            AdjacencyStore::ByteArray(store) => store.reallocation_count(),
            AdjacencyStore::PagedBuffer(store) => store.reallocation_count(),
        }
    }

    pub fn close(&mut self) -> Result<()> {
        match self {
            AdjacencyStore::Null(store) => store.close(),
            AdjacencyStore::PlainArray(store) => store.close(),
            AdjacencyStore::ByteArray(store) => store.close(),
            AdjacencyStore::PagedBuffer(store) => store.close(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.lifecycle().phase()
    }

    pub fn sizing(&self) -> Option<StoreSizing> {
        self.lifecycle().sizing()
    }

    /// Number of `add_target` calls accepted so far.
    pub fn appended(&self) -> u64 {
        self.lifecycle().appended()
    }

    /// Node count declared at `init`, zero before it.
    pub fn total_nodes(&self) -> u64 {
        self.sizing().map_or(0, |sizing| sizing.total_nodes)
    }

    pub fn total_rels(&self) -> u64 {
        self.sizing().map_or(0, |sizing| sizing.total_rels)
    }

    /// Initial per-node capacity chosen at `init`, zero before it.
    pub fn fan_out(&self) -> usize {
        self.sizing().map_or(0, |sizing| sizing.fan_out)
    }

    fn lifecycle(&self) -> &Lifecycle {
        match self {
            AdjacencyStore::Null(store) => &store.lifecycle,
            AdjacencyStore::PlainArray(store) => &store.lifecycle,
            AdjacencyStore::ByteArray(store) => &store.lifecycle,
            AdjacencyStore::PagedBuffer(store) => &store.lifecycle,
        }
    }
}

/// Allocates an empty vector with room for `capacity` elements, turning
/// arithmetic overflow and allocation failure into a capacity error.
pub(crate) fn reserved<T>(what: &'static str, capacity: usize) -> Result<Vec<T>> {
    let mut out = Vec::new();
    if out.try_reserve_exact(capacity).is_err() {
        let limit = isize::MAX as usize / mem::size_of::<T>().max(1);
        warn!(what, capacity, limit, "adjacency.reserve.failed");
        return Err(AdjError::capacity(what, limit as u64, capacity as u64));
    }
    Ok(out)
}

/// `a * b` as a capacity request, or a capacity error naming `what`.
pub(crate) fn checked_capacity(what: &'static str, a: usize, b: usize) -> Result<usize> {
    a.checked_mul(b).ok_or_else(|| {
        warn!(what, a, b, "adjacency.capacity.overflow");
        AdjError::capacity(what, usize::MAX as u64, u64::MAX)
    })
}

pub(crate) fn metrics_from(options: &StoreOptions) -> Arc<dyn StoreMetrics> {
    options.metrics.clone().unwrap_or_else(default_metrics)
}

pub(crate) fn log_init(kind: StoreKind, sizing: &StoreSizing, initial_bytes: u64) {
    info!(
        store = kind.as_str(),
        total_nodes = sizing.total_nodes,
        total_rels = sizing.total_rels,
        rels_per_node = sizing.total_rels / sizing.total_nodes,
        fan_out = sizing.fan_out,
        initial_bytes,
        "adjacency.init"
    );
}

pub(crate) fn log_close(kind: StoreKind, size: u64, reallocations: u64, appended: u64) {
    info!(
        store = kind.as_str(),
        size,
        reallocations,
        appended,
        "adjacency.close"
    );
}

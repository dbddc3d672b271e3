//! Block-chained adjacency lists in a single shared byte arena.
//!
//! The arena starts with one root block per node (node `n` owns the block at
//! `n * block_size`) and grows by whole blocks appended after the root
//! region. Each block is laid out as
//!
//! ```text
//! [header slot][delta 0][delta 1]...[delta k][tail]
//! ```
//!
//! The header slot is `header_len` bytes wide and holds one unsigned codec
//! value `h`:
//!
//! * `h < block_size`: the block is active and `h` bytes of deltas follow the
//!   header. The tail after them is the raw last target id, kept so the next
//!   append can compute its delta; the next delta overwrites it.
//! * `h >= block_size`: the block is exhausted. `h - h % block_size` is the
//!   absolute offset of the next block in the chain and `h % block_size` is
//!   the number of delta bytes left in this one.
//!
//! Deltas are signed differences between consecutive targets of a node across
//! its whole chain; the first one is taken against zero.

use std::sync::Arc;

use tracing::{debug, trace, warn};

use super::{checked_capacity, log_close, log_init, metrics_from, reserved, Lifecycle, StoreKind};
use crate::primitives::bytes::{decode_offset, IntCodec};
use crate::storage::metrics::StoreMetrics;
use crate::storage::options::StoreOptions;
use crate::types::{AdjError, Direction, NodeId, RelType, Result};

/// Diagnostics for a single append.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct AppendTrace {
    pub node: NodeId,
    /// Root block of the node's chain.
    pub start_block: usize,
    /// Block the entry was written to.
    pub block: usize,
    /// Delta bytes in `block` before this entry.
    pub entry_offset: usize,
    /// Forward pointers followed to reach the active block.
    pub page_hops: u64,
    pub last_value: u64,
    pub delta: i64,
    pub delta_len: usize,
    pub tail_len: usize,
    /// Header bytes rewritten, including a forward pointer on relocation.
    pub header_len: usize,
    /// New block chained because the active one was full.
    pub relocated_to: Option<usize>,
}

/// One block of a node's chain as seen by a reader.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct BlockInfo {
    pub offset: usize,
    /// Delta bytes stored after the header.
    pub used: usize,
    pub next: Option<usize>,
}

pub struct PagedBufferStore {
    options: StoreOptions,
    codec: IntCodec,
    metrics: Arc<dyn StoreMetrics>,
    arena: Vec<u8>,
    block_size: usize,
    header_len: usize,
    arena_limit: usize,
    next_free_block: usize,
    reallocations: u64,
    bytes_written: u64,
    pub(super) lifecycle: Lifecycle,
}

impl PagedBufferStore {
    pub fn new(options: StoreOptions) -> Self {
        Self {
            codec: options.codec,
            metrics: metrics_from(&options),
            options,
            arena: Vec::new(),
            block_size: 0,
            header_len: 0,
            arena_limit: 0,
            next_free_block: 0,
            reallocations: 0,
            bytes_written: 0,
            lifecycle: Lifecycle::new(),
        }
    }

    pub fn init(&mut self, total_nodes: u64, total_rels: u64) -> Result<()> {
        let sizing = self.lifecycle.plan(total_nodes, total_rels, &self.options)?;
        // StoreSizing::new checked that the node count fits in usize.
        let nodes = sizing.total_nodes as usize;
        let deltas = checked_capacity("paged block", sizing.fan_out, self.options.bytes_per_edge)?;
        let payload = deltas
            .checked_add(2 * self.codec.max_len())
            .ok_or_else(|| layout_overflow("paged block", nodes))?;

        // The header slot must fit the widest forward word the arena limit
        // allows, and the limit itself depends on the block size.
        let mut header_len = 1;
        let (block_size, root_len, arena_limit) = loop {
            let block_size = payload
                .checked_add(header_len)
                .ok_or_else(|| layout_overflow("paged block", nodes))?;
            let root_len = nodes
                .checked_mul(block_size)
                .ok_or_else(|| layout_overflow("paged arena", nodes))?;
            let extra_blocks = (root_len as f64 * (self.options.arena_growth_factor - 1.0)
                / block_size as f64)
                .ceil() as usize;
            let arena_limit = extra_blocks
                .checked_mul(block_size)
                .and_then(|extra| extra.checked_add(root_len))
                .ok_or_else(|| layout_overflow("paged arena", nodes))?;
            let widest = self.codec.size_of_u64(arena_limit as u64);
            if widest <= header_len {
                break (block_size, root_len, arena_limit);
            }
            header_len = widest;
        };

        let mut arena = reserved("paged arena", root_len)?;
        arena.resize(root_len, 0);
        self.arena = arena;
        self.block_size = block_size;
        self.header_len = header_len;
        self.arena_limit = arena_limit;
        self.next_free_block = root_len;
        self.lifecycle.begin(sizing);
        log_init(StoreKind::PagedBuffer, &sizing, self.determine_size());
        debug!(
            block_size,
            header_len,
            arena_limit,
            codec = ?self.codec,
            "paged.layout"
        );
        Ok(())
    }

    pub fn add_target(
        &mut self,
        node: NodeId,
        target: NodeId,
        ty: RelType,
        direction: Direction,
    ) -> Result<()> {
        let step = self.append(node, target, ty, direction)?;
        trace!(
            node = step.node.0,
            block = step.block,
            entry_offset = step.entry_offset,
            page_hops = step.page_hops,
            delta = step.delta,
            relocated = step.relocated_to.is_some(),
            "paged.append"
        );
        Ok(())
    }

    /// Appends `target` to `node`'s chain and reports where it landed.
    pub fn append(
        &mut self,
        node: NodeId,
        target: NodeId,
        _ty: RelType,
        _direction: Direction,
    ) -> Result<AppendTrace> {
        let idx = self.lifecycle.admit(node, target)?;
        let start_block = idx * self.block_size;
        let (mut block, used, page_hops) = self.locate(start_block)?;
        self.metrics.page_hops(page_hops);

        let last_value = if used == 0 {
            if page_hops > 0 {
                return Err(AdjError::DecodeInconsistency("chained block without entries"));
            }
            0
        } else {
            let tail = block + self.header_len + used;
            self.codec
                .decode_u64(&self.arena[..block + self.block_size], tail)?
                .0
        };
        let delta = target.0.wrapping_sub(last_value) as i64;
        let delta_len = self.codec.size_of_i64(delta);
        let tail_len = self.codec.size_of_u64(target.0);

        let mut entry_offset = used;
        let mut header_len = 0;
        let mut relocated_to = None;
        if self.header_len + entry_offset + delta_len + tail_len >= self.block_size {
            let next = self.allocate_block()?;
            header_len += self.write_header(block, next + used)?;
            self.metrics.block_relocated();
            debug!(
                node = node.0,
                from = block,
                to = next,
                used,
                page_hops,
                "paged.block.relocated"
            );
            relocated_to = Some(next);
            block = next;
            entry_offset = 0;
        }

        let block_end = block + self.block_size;
        let pos = block + self.header_len + entry_offset;
        let written_delta = self
            .codec
            .encode_i64(&mut self.arena[..block_end], pos, delta)?;
        let written_tail =
            self.codec
                .encode_u64(&mut self.arena[..block_end], pos + written_delta, target.0)?;
        header_len += self.write_header(block, entry_offset + written_delta)?;

        self.bytes_written += (written_delta + written_tail + header_len) as u64;
        self.metrics.target_added();
        Ok(AppendTrace {
            node,
            start_block,
            block,
            entry_offset,
            page_hops,
            last_value,
            delta,
            delta_len: written_delta,
            tail_len: written_tail,
            header_len,
            relocated_to,
        })
    }

    /// Follows forward pointers from `start` to the active block.
    /// Returns `(block, used, hops)`.
    fn locate(&self, start: usize) -> Result<(usize, usize, u64)> {
        let mut block = start;
        let mut hops = 0;
        loop {
            let h = self.read_header(block)?;
            if h < self.block_size {
                return Ok((block, h, hops));
            }
            block = self.forward_target(block, h)?;
            hops += 1;
        }
    }

    fn forward_target(&self, block: usize, h: usize) -> Result<usize> {
        let next = h - h % self.block_size;
        if next <= block || next + self.block_size > self.arena.len() {
            return Err(AdjError::DecodeInconsistency("forward pointer out of range"));
        }
        Ok(next)
    }

    fn read_header(&self, block: usize) -> Result<usize> {
        let slot = &self.arena[block..block + self.header_len];
        Ok(decode_offset(self.codec, slot, 0)?.0)
    }

    fn write_header(&mut self, block: usize, value: usize) -> Result<usize> {
        let slot = &mut self.arena[block..block + self.header_len];
        self.codec.encode_u64(slot, 0, value as u64)
    }

    fn allocate_block(&mut self) -> Result<usize> {
        let offset = self.next_free_block;
        let end = offset + self.block_size;
        if end > self.arena_limit {
            warn!(
                arena_limit = self.arena_limit,
                requested = end,
                reallocations = self.reallocations,
                "paged.arena.exhausted"
            );
            return Err(AdjError::capacity(
                "paged arena",
                self.arena_limit as u64,
                end as u64,
            ));
        }
        if end > self.arena.capacity() {
            let grow = (self.arena.len() / 2)
                .max(self.block_size)
                .min(self.arena_limit - self.arena.len());
            if self.arena.try_reserve_exact(grow).is_err() {
                warn!(
                    arena_len = self.arena.len(),
                    grow,
                    "paged.arena.reserve_failed"
                );
                return Err(AdjError::capacity(
                    "paged arena",
                    self.arena.capacity() as u64,
                    end as u64,
                ));
            }
        }
        self.arena.resize(end, 0);
        self.next_free_block = end;
        self.reallocations += 1;
        Ok(offset)
    }

    fn blocks(&self, idx: usize) -> Result<Vec<BlockInfo>> {
        let mut out = Vec::new();
        let mut block = idx * self.block_size;
        loop {
            let h = self.read_header(block)?;
            if h < self.block_size {
                out.push(BlockInfo {
                    offset: block,
                    used: h,
                    next: None,
                });
                return Ok(out);
            }
            let next = self.forward_target(block, h)?;
            out.push(BlockInfo {
                offset: block,
                used: h % self.block_size,
                next: Some(next),
            });
            block = next;
        }
    }

    /// Blocks of `node`'s chain in allocation order. Like [`Self::targets`],
    /// this is a read-back and seals the store.
    pub fn chain(&mut self, node: NodeId) -> Result<Vec<BlockInfo>> {
        let idx = self.lifecycle.begin_read(node)?;
        self.lifecycle.seal();
        self.blocks(idx)
    }

    /// Decodes `node`'s targets in append order across its whole chain.
    pub fn targets(&mut self, node: NodeId) -> Result<Vec<NodeId>> {
        let idx = self.lifecycle.begin_read(node)?;
        self.lifecycle.seal();
        let mut out = Vec::new();
        let mut last = 0u64;
        for info in self.blocks(idx)? {
            let start = info.offset + self.header_len;
            let end = start + info.used;
            if end + self.codec.size_of_u64(0) > info.offset + self.block_size {
                return Err(AdjError::DecodeInconsistency("block usage exceeds block size"));
            }
            let mut pos = start;
            while pos < end {
                let (delta, len) = self.codec.decode_i64(&self.arena[..end], pos)?;
                last = last.wrapping_add(delta as u64);
                out.push(NodeId(last));
                pos += len;
            }
        }
        Ok(out)
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn header_len(&self) -> usize {
        self.header_len
    }

    pub fn arena_limit(&self) -> usize {
        self.arena_limit
    }

    /// Logical bytes written: deltas, tail values and headers.
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    pub fn determine_size(&self) -> u64 {
        self.arena.capacity() as u64
    }

    pub fn reallocation_count(&self) -> u64 {
        self.reallocations
    }

    pub fn close(&mut self) -> Result<()> {
        self.lifecycle.close()?;
        log_close(
            StoreKind::PagedBuffer,
            self.determine_size(),
            self.reallocations,
            self.lifecycle.appended(),
        );
        debug!(
            bytes_written = self.bytes_written,
            arena_used = self.next_free_block,
            "paged.close"
        );
        Ok(())
    }
}

fn layout_overflow(what: &'static str, nodes: usize) -> AdjError {
    warn!(what, nodes, "paged.layout.overflow");
    AdjError::capacity(what, usize::MAX as u64, u64::MAX)
}

impl std::fmt::Debug for PagedBufferStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PagedBufferStore")
            .field("codec", &self.codec)
            .field("block_size", &self.block_size)
            .field("header_len", &self.header_len)
            .field("arena_len", &self.arena.len())
            .field("arena_limit", &self.arena_limit)
            .field("reallocations", &self.reallocations)
            .field("lifecycle", &self.lifecycle)
            .finish()
    }
}

//! Sorted `(primary, secondary)` id pairs in two run-length buffers.
//!
//! The primary buffer starts with a two-value header (`last primary id`,
//! `pair count`) followed by the first primary id and the deltas between
//! consecutive sorted primary ids. The secondary buffer holds the first
//! `secondary - primary` offset followed by the delta of that offset from
//! pair to pair. When secondary ids grow in step with primary ids that
//! second difference is mostly zero and collapses into runs.

use core::fmt;

use crate::primitives::bytes::IntCodec;
use crate::primitives::rle::{BufferSize, Mode, RunLengthDeltaBuffer, Signedness};
use crate::types::{AdjError, Result};

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub struct IdPair {
    pub primary: i64,
    pub secondary: i64,
}

impl IdPair {
    pub const fn new(primary: i64, secondary: i64) -> Self {
        Self { primary, secondary }
    }

    #[inline]
    fn offset(self) -> i64 {
        self.secondary.wrapping_sub(self.primary)
    }
}

impl From<(i64, i64)> for IdPair {
    fn from((primary, secondary): (i64, i64)) -> Self {
        Self { primary, secondary }
    }
}

pub struct PairBlock {
    primary: RunLengthDeltaBuffer,
    secondary: RunLengthDeltaBuffer,
    count: usize,
    last_primary: i64,
}

impl PairBlock {
    pub fn new(size: BufferSize, codec: IntCodec) -> Self {
        Self {
            primary: RunLengthDeltaBuffer::new(size, codec, Signedness::Unsigned),
            secondary: RunLengthDeltaBuffer::new(size, codec, Signedness::Signed),
            count: 0,
            last_primary: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Replaces the block contents with `pairs`, sorted by primary id.
    /// Primary ids must be non-negative.
    pub fn set(&mut self, pairs: &[IdPair]) -> Result<()> {
        let mut sorted = pairs.to_vec();
        sorted.sort_by_key(|pair| pair.primary);
        if sorted.first().is_some_and(|pair| pair.primary < 0) {
            return Err(AdjError::Invalid("primary ids must be non-negative"));
        }

        self.begin_write()?;
        self.count = 0;
        self.last_primary = sorted.last().map_or(0, |pair| pair.primary);

        let count =
            i64::try_from(sorted.len()).map_err(|_| AdjError::Invalid("too many pairs"))?;
        self.primary.store(self.last_primary)?;
        self.primary.store(count)?;

        if let Some((first, rest)) = sorted.split_first() {
            self.primary.store(first.primary)?;
            self.secondary.store(first.offset())?;
            let mut prev = *first;
            for &pair in rest {
                self.primary.store(pair.primary - prev.primary)?;
                self.secondary
                    .store(pair.offset().wrapping_sub(prev.offset()))?;
                prev = pair;
            }
        }

        self.primary.toggle_mode()?;
        self.secondary.toggle_mode()?;
        self.count = sorted.len();
        Ok(())
    }

    /// Decodes all pairs into `target` in ascending primary order and returns
    /// how many were written.
    pub fn get(&mut self, target: &mut [IdPair]) -> Result<usize> {
        let count = self.begin_read()?;
        if target.len() < count {
            return Err(AdjError::DecodeInconsistency(
                "pair count exceeds the output buffer",
            ));
        }
        let mut replay = Replay::new(self, count);
        for slot in target.iter_mut().take(count) {
            match replay.next_pair()? {
                Some(pair) => *slot = pair,
                None => break,
            }
        }
        Ok(count)
    }

    /// Convenience wrapper around [`PairBlock::get`] allocating the output.
    pub fn to_vec(&mut self) -> Result<Vec<IdPair>> {
        let mut out = vec![IdPair::default(); self.count];
        let n = self.get(&mut out)?;
        out.truncate(n);
        Ok(out)
    }

    /// Linear scan for the secondary id stored with `primary`.
    pub fn lookup_secondary_by_primary(&mut self, primary: i64) -> Result<Option<i64>> {
        if self.count == 0 || primary > self.last_primary {
            return Ok(None);
        }
        let count = self.begin_read()?;
        let mut replay = Replay::new(self, count);
        while let Some(pair) = replay.next_pair()? {
            if pair.primary == primary {
                return Ok(Some(pair.secondary));
            }
            if pair.primary > primary {
                break;
            }
        }
        Ok(None)
    }

    fn begin_write(&mut self) -> Result<()> {
        for buffer in [&mut self.primary, &mut self.secondary] {
            if buffer.mode() == Mode::Read {
                buffer.toggle_mode()?;
            }
        }
        Ok(())
    }

    /// Rewinds both buffers and consumes the header, returning the pair count.
    fn begin_read(&mut self) -> Result<usize> {
        if self.primary.mode() != Mode::Read {
            return Err(AdjError::SequencingViolation("pair block read before set"));
        }
        self.primary.rewind()?;
        self.secondary.rewind()?;
        let _last_primary = self.primary.read()?;
        let count = self.primary.read()?;
        usize::try_from(count).map_err(|_| AdjError::DecodeInconsistency("negative pair count"))
    }
}

/// Sequential reconstruction of pairs from both buffers.
struct Replay<'a> {
    block: &'a mut PairBlock,
    remaining: usize,
    prev: Option<IdPair>,
}

impl<'a> Replay<'a> {
    fn new(block: &'a mut PairBlock, count: usize) -> Self {
        Self {
            block,
            remaining: count,
            prev: None,
        }
    }

    fn next_pair(&mut self) -> Result<Option<IdPair>> {
        if self.remaining == 0 {
            return Ok(None);
        }
        let primary_step = self.block.primary.read()?;
        let offset_step = self.block.secondary.read()?;
        let pair = match self.prev {
            None => IdPair::new(primary_step, primary_step.wrapping_add(offset_step)),
            Some(prev) => {
                let primary = prev.primary + primary_step;
                let offset = prev.offset().wrapping_add(offset_step);
                IdPair::new(primary, primary.wrapping_add(offset))
            }
        };
        self.prev = Some(pair);
        self.remaining -= 1;
        Ok(Some(pair))
    }
}

impl fmt::Display for PairBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PairBlock{{ primary deltas: {}, secondary deltas: {} }}",
            self.primary, self.secondary
        )
    }
}

#![forbid(unsafe_code)]
//! Run-length compressed integer sequences over a fixed byte buffer.
//!
//! A buffer is filled in one pass ([`Mode::Write`]) and replayed in later
//! passes ([`Mode::Read`]) over the same bytes. Consecutive equal values are
//! collapsed: a single occurrence is stored as the value itself, a run of
//! `k > 1` as `MARKER, k, value`.
//!
//! Every stored value is biased one step away from zero (`v + 1` for `v >= 0`,
//! `v - 1` otherwise) before it reaches the codec, so the raw encoded zero is
//! reserved for the run marker and never produced by real data.

use core::fmt;

use tracing::warn;

use crate::primitives::bytes::{ord, IntCodec};
use crate::types::{AdjError, Result};

/// Bytes at the front of every buffer holding its size as a big-endian u32.
pub const HEADER_LEN: usize = 4;

/// Raw (biased) value announcing a `count, value` run pair.
const MARKER: i64 = 0;

/// Backing buffer presets.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum BufferSize {
    /// 1 KiB.
    Small,
    /// 1 MiB.
    Medium,
    /// 128 MiB.
    Large,
    /// 1 GiB.
    Huge,
}

impl BufferSize {
    pub const fn byte_size(self) -> usize {
        match self {
            BufferSize::Small => 1024,
            BufferSize::Medium => 1024 * 1024,
            BufferSize::Large => 128 * 1024 * 1024,
            BufferSize::Huge => 1024 * 1024 * 1024,
        }
    }

    /// Allocates a zeroed buffer with its size header written.
    pub fn allocate(self) -> Vec<u8> {
        let mut buf = vec![0u8; self.byte_size()];
        ord::put_u32_be(&mut buf, self.byte_size() as u32);
        buf
    }
}

/// Whether a buffer accepts negative values.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Signedness {
    /// Counts and ascending deltas; negative input is rejected.
    Unsigned,
    Signed,
}

/// Current role of a [`RunLengthDeltaBuffer`].
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Mode {
    Write,
    Read,
}

pub struct RunLengthDeltaBuffer {
    buf: Vec<u8>,
    codec: IntCodec,
    signedness: Signedness,
    mode: Mode,
    pos: usize,
    /// End of the bytes produced by the last write pass.
    end: usize,
    last: i64,
    counter: u64,
    stored: u64,
    bytes: usize,
}

impl RunLengthDeltaBuffer {
    pub fn new(size: BufferSize, codec: IntCodec, signedness: Signedness) -> Self {
        Self::with_buffer(size.allocate(), codec, signedness)
    }

    /// Wraps an existing buffer. The first [`HEADER_LEN`] bytes are left as-is.
    pub fn with_buffer(buf: Vec<u8>, codec: IntCodec, signedness: Signedness) -> Self {
        Self {
            buf,
            codec,
            signedness,
            mode: Mode::Write,
            pos: HEADER_LEN,
            end: HEADER_LEN,
            last: 0,
            counter: 0,
            stored: 0,
            bytes: 0,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Ends the current pass and starts one in the opposite role. A write pass
    /// is flushed first; a new write pass overwrites the previous contents.
    pub fn toggle_mode(&mut self) -> Result<()> {
        match self.mode {
            Mode::Write => {
                self.flush()?;
                self.end = self.pos;
                self.mode = Mode::Read;
            }
            Mode::Read => {
                self.end = HEADER_LEN;
                self.stored = 0;
                self.bytes = 0;
                self.mode = Mode::Write;
            }
        }
        self.reset_cursor();
        Ok(())
    }

    /// Restarts a read pass from the first stored value.
    pub fn rewind(&mut self) -> Result<()> {
        if self.mode != Mode::Read {
            return Err(AdjError::SequencingViolation(
                "rewind requires a buffer in read mode",
            ));
        }
        self.reset_cursor();
        Ok(())
    }

    fn reset_cursor(&mut self) {
        self.pos = HEADER_LEN;
        self.last = 0;
        self.counter = 0;
    }

    pub fn store(&mut self, value: i64) -> Result<()> {
        if self.mode != Mode::Write {
            return Err(AdjError::SequencingViolation("store on a buffer in read mode"));
        }
        if self.signedness == Signedness::Unsigned && value < 0 {
            return Err(AdjError::Invalid("negative value for an unsigned buffer"));
        }
        if self.counter > 0 && value == self.last {
            self.counter += 1;
            return Ok(());
        }
        self.flush()?;
        self.last = value;
        self.counter = 1;
        Ok(())
    }

    /// Emits the pending run, if any. A run that does not fit leaves the
    /// buffer as it was before the call.
    pub fn flush(&mut self) -> Result<()> {
        if self.mode != Mode::Write || self.counter == 0 {
            return Ok(());
        }
        let count = if self.counter > 1 {
            let count = i64::try_from(self.counter)
                .map_err(|_| AdjError::Invalid("run length exceeds i64"))?;
            Some(bias(count)?)
        } else {
            None
        };
        let value = bias(self.last)?;

        let (pos, bytes) = (self.pos, self.bytes);
        if let Err(err) = self.encode_run(count, value) {
            self.pos = pos;
            self.bytes = bytes;
            return Err(err);
        }
        self.stored += self.counter;
        self.counter = 0;
        Ok(())
    }

    fn encode_run(&mut self, count: Option<i64>, value: i64) -> Result<()> {
        if let Some(count) = count {
            self.encode_raw(MARKER)?;
            self.encode_raw(count)?;
        }
        self.encode_raw(value)
    }

    pub fn read(&mut self) -> Result<i64> {
        if self.mode != Mode::Read {
            return Err(AdjError::SequencingViolation("read on a buffer in write mode"));
        }
        if self.counter == 0 {
            let raw = self.decode_raw()?;
            if raw == MARKER {
                let count = unbias(self.decode_raw()?)?;
                if count < 2 {
                    return Err(AdjError::DecodeInconsistency("run shorter than two values"));
                }
                self.counter = count as u64;
                self.last = unbias(self.decode_raw()?)?;
            } else {
                self.counter = 1;
                self.last = unbias(raw)?;
            }
        }
        self.counter -= 1;
        Ok(self.last)
    }

    fn encode_raw(&mut self, raw: i64) -> Result<()> {
        let written = match self.signedness {
            // Unsigned biased values are never negative.
            Signedness::Unsigned => self.codec.encode_u64(&mut self.buf, self.pos, raw as u64),
            Signedness::Signed => self.codec.encode_i64(&mut self.buf, self.pos, raw),
        };
        let written = written.map_err(|err| {
            warn!(
                capacity = self.buf.len(),
                position = self.pos,
                stored = self.stored,
                "rle.buffer.full"
            );
            err
        })?;
        self.pos += written;
        self.bytes += written;
        Ok(())
    }

    fn decode_raw(&mut self) -> Result<i64> {
        if self.pos >= self.end {
            return Err(AdjError::DecodeInconsistency(
                "read past the end of the stored values",
            ));
        }
        let (raw, len) = match self.signedness {
            Signedness::Unsigned => {
                let (raw, len) = self.codec.decode_u64(&self.buf[..self.end], self.pos)?;
                let raw = i64::try_from(raw)
                    .map_err(|_| AdjError::DecodeInconsistency("unsigned value exceeds i64"))?;
                (raw, len)
            }
            Signedness::Signed => self.codec.decode_i64(&self.buf[..self.end], self.pos)?,
        };
        self.pos += len;
        Ok(raw)
    }

    /// Logical values stored by the last write pass.
    pub fn values_stored(&self) -> u64 {
        self.stored
    }

    /// Physical bytes written by the last write pass, excluding the header.
    pub fn bytes_used(&self) -> usize {
        self.bytes
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Size recorded in the buffer header.
    pub fn declared_size(&self) -> Option<u32> {
        ord::try_get_u32_be(&self.buf)
    }

    pub fn bytes_per_value(&self) -> f64 {
        if self.stored == 0 {
            0.0
        } else {
            self.bytes as f64 / self.stored as f64
        }
    }
}

impl fmt::Display for RunLengthDeltaBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "RunLengthDeltaBuffer stored ids {} bytes used {} buffer size {} bytes/id {:.4}",
            self.stored,
            self.bytes,
            self.buf.len(),
            self.bytes_per_value()
        )
    }
}

impl fmt::Debug for RunLengthDeltaBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunLengthDeltaBuffer")
            .field("codec", &self.codec)
            .field("signedness", &self.signedness)
            .field("mode", &self.mode)
            .field("pos", &self.pos)
            .field("end", &self.end)
            .field("stored", &self.stored)
            .finish()
    }
}

#[inline]
fn bias(v: i64) -> Result<i64> {
    let biased = if v >= 0 {
        v.checked_add(1)
    } else {
        v.checked_sub(1)
    };
    biased.ok_or(AdjError::Invalid("value outside the run-length range"))
}

#[inline]
fn unbias(raw: i64) -> Result<i64> {
    match raw {
        MARKER => Err(AdjError::DecodeInconsistency("unexpected run marker")),
        r if r > 0 => Ok(r - 1),
        r => Ok(r + 1),
    }
}

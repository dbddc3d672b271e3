#![forbid(unsafe_code)]
//! Integer codecs and fixed-width helpers shared by the id buffers and stores.
//!
//! Two variable-length strategies sit behind [`IntCodec`]:
//!
//! * [`IntCodec::Base128`]: little-endian groups of 7 bits with a continuation
//!   flag; signed values go through ZigZag so the sign lands in the low bit.
//! * [`IntCodec::LengthPrefixed`]: one header byte whose absolute value is the
//!   number of big-endian magnitude bytes that follow and whose sign is the
//!   value's sign. Zero is the lone header byte `0x00`.
//!
//! Both encode zero as the single byte `0x00`, which is also what a zeroed
//! buffer decodes to.

use serde::{Deserialize, Serialize};

use crate::types::{AdjError, Result};

pub mod ord {
    //! Fixed-width big-endian helpers.

    const U32_LEN: usize = core::mem::size_of::<u32>();

    /// Big-endian encoding of a u32 into the first four bytes of `dst`.
    pub fn put_u32_be(dst: &mut [u8], v: u32) {
        assert!(dst.len() >= U32_LEN, "destination too small");
        dst[..U32_LEN].copy_from_slice(&v.to_be_bytes());
    }

    /// Decodes a u32 from big-endian byte order.
    pub fn get_u32_be(src: &[u8]) -> u32 {
        let head = src
            .get(..U32_LEN)
            .unwrap_or_else(|| panic!("u32 source shorter than 4 bytes (have {})", src.len()));
        let mut bytes = [0u8; U32_LEN];
        bytes.copy_from_slice(head);
        u32::from_be_bytes(bytes)
    }

    /// Same as [`get_u32_be`] but without the panic, for untrusted slices.
    pub fn try_get_u32_be(src: &[u8]) -> Option<u32> {
        let head: [u8; U32_LEN] = src.get(..U32_LEN)?.try_into().ok()?;
        Some(u32::from_be_bytes(head))
    }
}

pub mod var {
    //! Unsigned base-128 varints and ZigZag signed integers.

    use crate::types::{AdjError, Result};

    /// Longest encoding of a u64.
    pub const MAX_LEN: usize = 10;

    /// Number of bytes [`put_u64`] writes for `v`.
    #[inline]
    pub fn len_u64(v: u64) -> usize {
        let bits = 64 - (v | 1).leading_zeros() as usize;
        (bits + 6) / 7
    }

    #[inline]
    pub fn len_i64(v: i64) -> usize {
        len_u64(zigzag(v))
    }

    #[inline]
    pub fn zigzag(v: i64) -> u64 {
        ((v << 1) ^ (v >> 63)) as u64
    }

    #[inline]
    pub fn unzigzag(z: u64) -> i64 {
        ((z >> 1) as i64) ^ (-((z & 1) as i64))
    }

    /// Appends `v` as an unsigned varint.
    pub fn push_u64(mut v: u64, out: &mut Vec<u8>) -> usize {
        let start = out.len();
        loop {
            let byte = (v & 0x7f) as u8;
            v >>= 7;
            if v == 0 {
                out.push(byte);
                break;
            }
            out.push(byte | 0x80);
        }
        out.len() - start
    }

    /// Writes `v` at `dst[off..]`, returning the bytes written.
    pub fn put_u64(dst: &mut [u8], off: usize, mut v: u64) -> Result<usize> {
        let len = len_u64(v);
        let end = off + len;
        if end > dst.len() {
            return Err(AdjError::capacity(
                "varint destination",
                dst.len() as u64,
                end as u64,
            ));
        }
        for slot in &mut dst[off..end - 1] {
            *slot = (v & 0x7f) as u8 | 0x80;
            v >>= 7;
        }
        dst[end - 1] = (v & 0x7f) as u8;
        Ok(len)
    }

    /// Decodes a u64 varint at `src[off..]`, returning the value and its length.
    pub fn get_u64(src: &[u8], off: usize) -> Result<(u64, usize)> {
        let mut result = 0u64;
        let mut shift = 0u32;
        for i in 0..MAX_LEN {
            let byte = *src
                .get(off + i)
                .ok_or(AdjError::DecodeInconsistency("varint truncated"))?;
            let payload = (byte & 0x7f) as u64;
            if i == MAX_LEN - 1 && payload > 1 {
                return Err(AdjError::DecodeInconsistency(
                    "varint overflow (more than 64 bits)",
                ));
            }
            result |= payload << shift;
            if byte & 0x80 == 0 {
                return Ok((result, i + 1));
            }
            shift += 7;
        }
        Err(AdjError::DecodeInconsistency("varint too long"))
    }

    pub fn push_i64(v: i64, out: &mut Vec<u8>) -> usize {
        push_u64(zigzag(v), out)
    }

    pub fn put_i64(dst: &mut [u8], off: usize, v: i64) -> Result<usize> {
        put_u64(dst, off, zigzag(v))
    }

    pub fn get_i64(src: &[u8], off: usize) -> Result<(i64, usize)> {
        let (z, len) = get_u64(src, off)?;
        Ok((unzigzag(z), len))
    }
}

pub mod lenpref {
    //! Sign-and-length header byte followed by a minimal big-endian magnitude.

    use crate::types::{AdjError, Result};

    /// Header byte plus up to eight magnitude bytes.
    pub const MAX_LEN: usize = 9;

    #[inline]
    fn magnitude_len(m: u64) -> usize {
        (64 - m.leading_zeros() as usize + 7) / 8
    }

    #[inline]
    pub fn len_u64(v: u64) -> usize {
        1 + magnitude_len(v)
    }

    #[inline]
    pub fn len_i64(v: i64) -> usize {
        1 + magnitude_len(v.unsigned_abs())
    }

    fn push(negative: bool, magnitude: u64, out: &mut Vec<u8>) -> usize {
        let n = magnitude_len(magnitude);
        let header = if negative { -(n as i8) } else { n as i8 };
        out.push(header as u8);
        out.extend_from_slice(&magnitude.to_be_bytes()[8 - n..]);
        n + 1
    }

    fn put(dst: &mut [u8], off: usize, negative: bool, magnitude: u64) -> Result<usize> {
        let n = magnitude_len(magnitude);
        let end = off + n + 1;
        if end > dst.len() {
            return Err(AdjError::capacity(
                "length-prefixed destination",
                dst.len() as u64,
                end as u64,
            ));
        }
        let header = if negative { -(n as i8) } else { n as i8 };
        dst[off] = header as u8;
        dst[off + 1..end].copy_from_slice(&magnitude.to_be_bytes()[8 - n..]);
        Ok(n + 1)
    }

    /// Returns `(negative, magnitude, encoded length)`.
    fn get(src: &[u8], off: usize) -> Result<(bool, u64, usize)> {
        let header = *src
            .get(off)
            .ok_or(AdjError::DecodeInconsistency("length prefix truncated"))?
            as i8;
        let n = header.unsigned_abs() as usize;
        if n > 8 {
            return Err(AdjError::DecodeInconsistency(
                "length prefix exceeds eight bytes",
            ));
        }
        let body = src
            .get(off + 1..off + 1 + n)
            .ok_or(AdjError::DecodeInconsistency("magnitude truncated"))?;
        let magnitude = body.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64);
        Ok((header < 0, magnitude, n + 1))
    }

    pub fn push_u64(v: u64, out: &mut Vec<u8>) -> usize {
        push(false, v, out)
    }

    pub fn push_i64(v: i64, out: &mut Vec<u8>) -> usize {
        push(v < 0, v.unsigned_abs(), out)
    }

    pub fn put_u64(dst: &mut [u8], off: usize, v: u64) -> Result<usize> {
        put(dst, off, false, v)
    }

    pub fn put_i64(dst: &mut [u8], off: usize, v: i64) -> Result<usize> {
        put(dst, off, v < 0, v.unsigned_abs())
    }

    pub fn get_u64(src: &[u8], off: usize) -> Result<(u64, usize)> {
        let (negative, magnitude, len) = get(src, off)?;
        if negative {
            return Err(AdjError::DecodeInconsistency(
                "negative length prefix in unsigned slot",
            ));
        }
        Ok((magnitude, len))
    }

    pub fn get_i64(src: &[u8], off: usize) -> Result<(i64, usize)> {
        let (negative, magnitude, len) = get(src, off)?;
        let value = if negative {
            if magnitude > 1u64 << 63 {
                return Err(AdjError::DecodeInconsistency("magnitude overflows i64"));
            }
            0u64.wrapping_sub(magnitude) as i64
        } else {
            if magnitude > i64::MAX as u64 {
                return Err(AdjError::DecodeInconsistency("magnitude overflows i64"));
            }
            magnitude as i64
        };
        Ok((value, len))
    }
}

/// Variable-length integer strategy used by a buffer or store.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntCodec {
    /// 7 value bits per byte with a continuation flag; ZigZag for signed values.
    Base128,
    /// Signed length byte followed by big-endian magnitude bytes.
    #[default]
    LengthPrefixed,
}

impl IntCodec {
    /// Longest encoding this codec can produce for any 64-bit value.
    pub const fn max_len(self) -> usize {
        match self {
            IntCodec::Base128 => var::MAX_LEN,
            IntCodec::LengthPrefixed => lenpref::MAX_LEN,
        }
    }

    #[inline]
    pub fn size_of_u64(self, v: u64) -> usize {
        match self {
            IntCodec::Base128 => var::len_u64(v),
            IntCodec::LengthPrefixed => lenpref::len_u64(v),
        }
    }

    #[inline]
    pub fn size_of_i64(self, v: i64) -> usize {
        match self {
            IntCodec::Base128 => var::len_i64(v),
            IntCodec::LengthPrefixed => lenpref::len_i64(v),
        }
    }

    pub fn encode_u64(self, dst: &mut [u8], off: usize, v: u64) -> Result<usize> {
        match self {
            IntCodec::Base128 => var::put_u64(dst, off, v),
            IntCodec::LengthPrefixed => lenpref::put_u64(dst, off, v),
        }
    }

    pub fn encode_i64(self, dst: &mut [u8], off: usize, v: i64) -> Result<usize> {
        match self {
            IntCodec::Base128 => var::put_i64(dst, off, v),
            IntCodec::LengthPrefixed => lenpref::put_i64(dst, off, v),
        }
    }

    pub fn decode_u64(self, src: &[u8], off: usize) -> Result<(u64, usize)> {
        match self {
            IntCodec::Base128 => var::get_u64(src, off),
            IntCodec::LengthPrefixed => lenpref::get_u64(src, off),
        }
    }

    pub fn decode_i64(self, src: &[u8], off: usize) -> Result<(i64, usize)> {
        match self {
            IntCodec::Base128 => var::get_i64(src, off),
            IntCodec::LengthPrefixed => lenpref::get_i64(src, off),
        }
    }

    /// Appends the encoding of `v` to `out`.
    pub fn push_u64(self, v: u64, out: &mut Vec<u8>) -> usize {
        match self {
            IntCodec::Base128 => var::push_u64(v, out),
            IntCodec::LengthPrefixed => lenpref::push_u64(v, out),
        }
    }

    pub fn push_i64(self, v: i64, out: &mut Vec<u8>) -> usize {
        match self {
            IntCodec::Base128 => var::push_i64(v, out),
            IntCodec::LengthPrefixed => lenpref::push_i64(v, out),
        }
    }
}

/// Decodes a u64 and narrows it to a buffer offset.
pub(crate) fn decode_offset(codec: IntCodec, src: &[u8], off: usize) -> Result<(usize, usize)> {
    let (v, len) = codec.decode_u64(src, off)?;
    let v = usize::try_from(v)
        .map_err(|_| AdjError::DecodeInconsistency("offset does not fit in usize"))?;
    Ok((v, len))
}

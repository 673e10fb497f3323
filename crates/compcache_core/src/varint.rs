//! Compressed unsigned integers.
//!
//! Each byte carries 7 bits of payload, least significant group first.
//! The high bit is set on every byte except the last one.

use std::io::{self, Read, Write};

use crate::err::{CodecError, CodecResult};

/// Max bytes a `u64` can occupy once compressed
pub const MAX_COMPRESSED_BYTES: usize = 10;

/// Failure modes of slice-based decoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarintError {
    /// The encoded value does not fit in 64 bits
    Overflow,
    /// The input ended on a byte with the continuation bit set
    Truncated,
}

impl From<VarintError> for CodecError {
    fn from(value: VarintError) -> Self {
        match value {
            VarintError::Overflow => CodecError::VarintOverflow,
            VarintError::Truncated => CodecError::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "truncated compressed integer",
            )),
        }
    }
}

/// Encode a value into a fixed buffer, returning the number of bytes used.
pub fn encode_compressed(mut value: u64, buf: &mut [u8; MAX_COMPRESSED_BYTES]) -> usize {
    let mut i = 0;
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            buf[i] = byte;
            return i + 1;
        }
        buf[i] = byte | 0x80;
        i += 1;
    }
}

/// Encode a value and write it out. Returns the number of bytes written.
pub fn write_compressed_uint<W: Write + ?Sized>(writer: &mut W, value: u64) -> io::Result<usize> {
    let mut buf = [0_u8; MAX_COMPRESSED_BYTES];
    let len = encode_compressed(value, &mut buf);
    writer.write_all(&buf[..len])?;

    Ok(len)
}

/// Decode a value from the start of a slice.
///
/// Returns the value and the number of bytes consumed.
pub fn decode_compressed(buf: &[u8]) -> Result<(u64, usize), VarintError> {
    let mut result = 0_u64;
    let mut shift = 0_u32;

    for (i, &byte) in buf.iter().enumerate() {
        result = accumulate(result, shift, byte)?;

        if byte & 0x80 == 0 {
            return Ok((result, i + 1));
        }
        shift += 7;
    }

    Err(VarintError::Truncated)
}

/// Decode a value from a reader, one byte at a time.
pub fn read_compressed_uint<R: Read + ?Sized>(reader: &mut R) -> CodecResult<u64> {
    let mut result = 0_u64;
    let mut shift = 0_u32;
    let mut buf = [0_u8; 1];

    loop {
        reader.read_exact(&mut buf)?;
        let byte = buf[0];
        result = accumulate(result, shift, byte)?;

        if byte & 0x80 == 0 {
            return Ok(result);
        }
        shift += 7;
    }
}

/// Fold the payload bits of one byte into `result`, rejecting anything past bit 63.
#[inline]
fn accumulate(result: u64, shift: u32, byte: u8) -> Result<u64, VarintError> {
    let payload = u64::from(byte & 0x7f);

    match shift {
        0..=56 => Ok(result | payload << shift),
        // only the lowest payload bit still fits, and nothing may follow it
        63 if payload <= 1 && byte & 0x80 == 0 => Ok(result | payload << shift),
        _ => Err(VarintError::Overflow),
    }
}

/// Map a signed value onto an unsigned one so small magnitudes stay short
#[inline]
pub const fn zigzag_encode(value: i64) -> u64 {
    ((value << 1) ^ (value >> 63)) as u64
}

/// Inverse of [zigzag_encode]
#[inline]
pub const fn zigzag_decode(value: u64) -> i64 {
    (value >> 1) as i64 ^ -((value & 1) as i64)
}

/// Number of bytes needed to encode a value
#[inline]
pub const fn compressed_len(value: u64) -> usize {
    if value == 0 {
        return 1;
    }
    let bits = 64 - value.leading_zeros() as usize;
    (bits + 6) / 7
}

//! Binary record format for blocks, as persisted in the store.
//!
//! ```text
//! height      u64 LE
//! timestamp   i64 LE
//! hash        varint len ‖ UTF-8 bytes
//! prev_hash   varint len ‖ UTF-8 bytes
//! difficulty  i32 LE
//! nonce       i64 LE
//! data        varint len ‖ raw bytes
//! ```
//!
//! Varints are unsigned LEB128. Encoding sizes the buffer up front and fills it
//! in a single allocation.

use super::Block;
use crate::error::DecodeError;

/// Bytes taken by the fixed-width fields.
pub const FIXED_LEN: usize = 28;

/// Largest LEB128 encoding of a `u64`.
const MAX_VARINT_LEN: usize = 10;

/// Number of bytes `value` occupies as a LEB128 varint.
pub fn varint_len(mut value: u64) -> usize {
    let mut n = 1;
    while value >= 0x80 {
        value >>= 7;
        n += 1;
    }
    n
}

fn put_varint(out: &mut Vec<u8>, mut value: u64) {
    while value >= 0x80 {
        out.push(value as u8 | 0x80);
        value >>= 7;
    }
    out.push(value as u8);
}

fn put_bytes(out: &mut Vec<u8>, bytes: &[u8]) {
    put_varint(out, bytes.len() as u64);
    out.extend_from_slice(bytes);
}

fn prefixed_len(len: usize) -> usize {
    varint_len(len as u64) + len
}

/// Exact size of `encode(block)`.
pub fn encoded_len(block: &Block) -> usize {
    FIXED_LEN
        + prefixed_len(block.hash.len())
        + prefixed_len(block.prev_hash.len())
        + prefixed_len(block.data.len())
}

pub fn encode(block: &Block) -> Vec<u8> {
    let size = encoded_len(block);
    let mut out = Vec::with_capacity(size);

    out.extend_from_slice(&block.height.to_le_bytes());
    out.extend_from_slice(&block.timestamp.to_le_bytes());
    put_bytes(&mut out, block.hash.as_bytes());
    put_bytes(&mut out, block.prev_hash.as_bytes());
    out.extend_from_slice(&block.difficulty.to_le_bytes());
    out.extend_from_slice(&block.nonce.to_le_bytes());
    put_bytes(&mut out, &block.data);

    debug_assert_eq!(out.len(), size);
    out
}

/// Decode one block from the front of `buf`, returning it with the number of
/// bytes consumed. Trailing bytes are left untouched.
pub fn decode(buf: &[u8]) -> Result<(Block, usize), DecodeError> {
    let mut input = buf;

    let height = u64::from_le_bytes(read_array(&mut input)?);
    let timestamp = i64::from_le_bytes(read_array(&mut input)?);
    let hash = read_string(&mut input, "hash")?;
    let prev_hash = read_string(&mut input, "prev_hash")?;
    let difficulty = i32::from_le_bytes(read_array(&mut input)?);
    let nonce = i64::from_le_bytes(read_array(&mut input)?);
    let data = read_prefixed(&mut input)?.to_vec();

    let block = Block {
        height,
        timestamp,
        hash,
        prev_hash,
        difficulty,
        nonce,
        data,
    };
    Ok((block, buf.len() - input.len()))
}

/// Reads exactly `n` bytes from the input, advancing the slice.
fn read_bytes<'a>(input: &mut &'a [u8], n: usize) -> Result<&'a [u8], DecodeError> {
    if input.len() < n {
        return Err(DecodeError::UnexpectedEof {
            needed: n,
            remaining: input.len(),
        });
    }
    let (bytes, rest) = input.split_at(n);
    *input = rest;
    Ok(bytes)
}

fn read_array<const N: usize>(input: &mut &[u8]) -> Result<[u8; N], DecodeError> {
    let mut arr = [0u8; N];
    arr.copy_from_slice(read_bytes(input, N)?);
    Ok(arr)
}

fn read_varint(input: &mut &[u8]) -> Result<u64, DecodeError> {
    let mut value = 0u64;
    for i in 0..MAX_VARINT_LEN {
        let [byte] = read_array::<1>(input)?;
        let payload = u64::from(byte & 0x7F);
        let shift = 7 * i as u32;
        // The tenth byte may only contribute the top bit.
        if i == MAX_VARINT_LEN - 1 && payload > 1 {
            return Err(DecodeError::VarintOverflow);
        }
        value |= payload << shift;
        if byte & 0x80 == 0 {
            return Ok(value);
        }
    }
    Err(DecodeError::VarintOverflow)
}

fn read_prefixed<'a>(input: &mut &'a [u8]) -> Result<&'a [u8], DecodeError> {
    let len = usize::try_from(read_varint(input)?).map_err(|_| DecodeError::LengthOverflow)?;
    read_bytes(input, len)
}

fn read_string(input: &mut &[u8], field: &'static str) -> Result<String, DecodeError> {
    let bytes = read_prefixed(input)?;
    String::from_utf8(bytes.to_vec()).map_err(|_| DecodeError::InvalidUtf8 { field })
}

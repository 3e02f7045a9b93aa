//! Unsigned LEB128 varints, as used for frame lengths and string lengths.
//!
//! Seven data bits per byte, low group first, high bit set on every byte
//! except the last. A `u32` needs at most five bytes.

use bytes::BufMut;

use crate::ProtocolError;

/// Longest encoding of a `u32`.
pub const MAX_VARINT_LEN: usize = 5;

/// Appends `value` to `buf`.
pub fn put_varint(buf: &mut impl BufMut, mut value: u32) {
    while value >= 0x80 {
        buf.put_u8((value as u8 & 0x7f) | 0x80);
        value >>= 7;
    }
    buf.put_u8(value as u8);
}

/// Number of bytes `put_varint` writes for `value`.
pub fn varint_len(value: u32) -> usize {
    match value {
        0..=0x7f => 1,
        0x80..=0x3fff => 2,
        0x4000..=0x1f_ffff => 3,
        0x20_0000..=0x0fff_ffff => 4,
        _ => 5,
    }
}

/// Reads a varint from the front of `data` without consuming it.
///
/// Returns `Ok(None)` when `data` ends mid-varint, and the decoded value
/// with the number of bytes it occupied otherwise.
pub fn peek_varint(data: &[u8]) -> Result<Option<(u32, usize)>, ProtocolError> {
    let mut value: u32 = 0;
    for (i, &byte) in data.iter().take(MAX_VARINT_LEN).enumerate() {
        let group = (byte & 0x7f) as u32;
        if i == MAX_VARINT_LEN - 1 && (byte & 0x80 != 0 || group > 0x0f) {
            return Err(ProtocolError::MalformedVarint);
        }
        value |= group << (7 * i);
        if byte & 0x80 == 0 {
            return Ok(Some((value, i + 1)));
        }
    }
    Ok(None)
}

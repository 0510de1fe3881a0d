//! Primitive big-endian codec for the Kafka wire format.
//!
//! All reads are checked against the remaining buffer length and return
//! [`ProtocolError::Truncated`] rather than panicking. The compact
//! (varint-prefixed) encodings used by flexible message versions live here
//! as well.

use crate::error::ProtocolError;
use bytes::{Buf, BufMut};

fn ensure(buf: &impl Buf, needed: usize) -> Result<(), ProtocolError> {
    if buf.remaining() < needed {
        return Err(ProtocolError::Truncated {
            needed: needed - buf.remaining(),
        });
    }
    Ok(())
}

pub fn get_i8(buf: &mut impl Buf) -> Result<i8, ProtocolError> {
    ensure(buf, 1)?;
    Ok(buf.get_i8())
}

pub fn get_i16(buf: &mut impl Buf) -> Result<i16, ProtocolError> {
    ensure(buf, 2)?;
    Ok(buf.get_i16())
}

pub fn get_i32(buf: &mut impl Buf) -> Result<i32, ProtocolError> {
    ensure(buf, 4)?;
    Ok(buf.get_i32())
}

/// Reads a standard string: i16 length followed by UTF-8 bytes.
pub fn get_string(buf: &mut impl Buf) -> Result<String, ProtocolError> {
    let len = get_i16(buf)?;
    if len < 0 {
        return Err(ProtocolError::InvalidLength(len as i64));
    }
    take_string(buf, len as usize)
}

/// Reads a nullable string: i16 length, -1 meaning null.
pub fn get_nullable_string(buf: &mut impl Buf) -> Result<Option<String>, ProtocolError> {
    let len = get_i16(buf)?;
    if len == -1 {
        return Ok(None);
    }
    if len < 0 {
        return Err(ProtocolError::InvalidLength(len as i64));
    }
    take_string(buf, len as usize).map(Some)
}

fn take_string(buf: &mut impl Buf, len: usize) -> Result<String, ProtocolError> {
    ensure(buf, len)?;
    let bytes = buf.copy_to_bytes(len);
    String::from_utf8(bytes.to_vec()).map_err(|_| ProtocolError::InvalidUtf8)
}

/// Writes a standard string: i16 length followed by UTF-8 bytes.
pub fn put_string(buf: &mut impl BufMut, s: &str) -> Result<(), ProtocolError> {
    if s.len() > i16::MAX as usize {
        return Err(ProtocolError::InvalidLength(s.len() as i64));
    }
    buf.put_i16(s.len() as i16);
    buf.put_slice(s.as_bytes());
    Ok(())
}

/// Writes a nullable string, encoding `None` as length -1.
pub fn put_nullable_string(buf: &mut impl BufMut, s: Option<&str>) -> Result<(), ProtocolError> {
    match s {
        Some(s) => put_string(buf, s),
        None => {
            buf.put_i16(-1);
            Ok(())
        }
    }
}

/// Reads an unsigned varint as used by the flexible encodings (KIP-482).
pub fn get_unsigned_varint(buf: &mut impl Buf) -> Result<u32, ProtocolError> {
    let mut value: u32 = 0;
    let mut shift = 0;
    loop {
        ensure(buf, 1)?;
        let byte = buf.get_u8();
        // The fifth byte may only carry the top 4 bits of a u32.
        if shift == 28 && byte & 0xF0 != 0 {
            return Err(ProtocolError::VarintOverflow);
        }
        value |= u32::from(byte & 0x7F) << shift;
        if byte & 0x80 == 0 {
            return Ok(value);
        }
        shift += 7;
        if shift > 28 {
            return Err(ProtocolError::VarintOverflow);
        }
    }
}

pub fn put_unsigned_varint(buf: &mut impl BufMut, mut value: u32) {
    loop {
        let mut byte = (value & 0x7F) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        buf.put_u8(byte);
        if value == 0 {
            return;
        }
    }
}

/// Reads a COMPACT_NULLABLE_STRING: varint of (length + 1), 0 meaning null.
pub fn get_compact_nullable_string(buf: &mut impl Buf) -> Result<Option<String>, ProtocolError> {
    let len = get_unsigned_varint(buf)?;
    if len == 0 {
        return Ok(None);
    }
    take_string(buf, (len - 1) as usize).map(Some)
}

/// Writes a COMPACT_NULLABLE_STRING.
pub fn put_compact_nullable_string(buf: &mut impl BufMut, s: Option<&str>) {
    match s {
        Some(s) => {
            put_unsigned_varint(buf, s.len() as u32 + 1);
            buf.put_slice(s.as_bytes());
        }
        None => put_unsigned_varint(buf, 0),
    }
}

/// Encodes a slice as a standard protocol array: i32 count, then elements.
pub fn put_array<T, F, W>(buf: &mut W, items: &[T], mut f: F) -> Result<(), ProtocolError>
where
    F: FnMut(&mut W, &T) -> Result<(), ProtocolError>,
    W: BufMut,
{
    buf.put_i32(items.len() as i32);
    for item in items {
        f(buf, item)?;
    }
    Ok(())
}

/// Encodes a slice as a compact array: varint of (count + 1), then elements.
pub fn put_compact_array<T, F, W>(buf: &mut W, items: &[T], mut f: F) -> Result<(), ProtocolError>
where
    F: FnMut(&mut W, &T) -> Result<(), ProtocolError>,
    W: BufMut,
{
    put_unsigned_varint(buf, items.len() as u32 + 1);
    for item in items {
        f(buf, item)?;
    }
    Ok(())
}

/// Skips a tagged-field section: varint count, then (tag, size, bytes) each.
pub fn skip_tagged_fields(buf: &mut impl Buf) -> Result<(), ProtocolError> {
    let count = get_unsigned_varint(buf)?;
    for _ in 0..count {
        let _tag = get_unsigned_varint(buf)?;
        let size = get_unsigned_varint(buf)? as usize;
        ensure(buf, size)?;
        buf.advance(size);
    }
    Ok(())
}

/// Writes an empty tagged-field section: a single zero varint.
pub fn put_empty_tagged_fields(buf: &mut impl BufMut) {
    buf.put_u8(0);
}

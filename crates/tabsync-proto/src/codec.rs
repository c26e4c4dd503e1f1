//! Protocol encoding/decoding traits and helpers.
//!
//! Two string flavours live here: game packets use a VarUInt32 length prefix
//! (`write_string` / `read_string`), the replication wire format uses a
//! big-endian `u16` length prefix (`write_utf` / `read_utf`).

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tracing::warn;

use crate::error::ProtoError;
use crate::types::VarUInt32;

/// Encode a value onto a buffer.
pub trait ProtoEncode {
    fn proto_encode(&self, buf: &mut impl BufMut);
}

/// Decode a value from a buffer.
pub trait ProtoDecode: Sized {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError>;
}

/// Encode a value into a fresh, frozen buffer.
pub fn encode_to_bytes<T: ProtoEncode>(value: &T) -> Bytes {
    let mut buf = BytesMut::new();
    value.proto_encode(&mut buf);
    buf.freeze()
}

/// Decode a value that must occupy the whole buffer.
pub fn decode_exact<T: ProtoDecode>(mut data: &[u8]) -> Result<T, ProtoError> {
    let value = T::proto_decode(&mut data)?;
    if data.has_remaining() {
        return Err(ProtoError::TrailingBytes(data.remaining()));
    }
    Ok(value)
}

/// Fail with `BufferTooShort` unless `needed` bytes remain.
pub fn ensure_remaining(buf: &impl Buf, needed: usize) -> Result<(), ProtoError> {
    if buf.remaining() < needed {
        return Err(ProtoError::BufferTooShort {
            needed,
            remaining: buf.remaining(),
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Game packet strings (VarUInt32 length)
// ---------------------------------------------------------------------------

/// Write a game protocol string (VarUInt32 length + UTF-8).
pub fn write_string(buf: &mut impl BufMut, s: &str) {
    VarUInt32(s.len() as u32).proto_encode(buf);
    buf.put_slice(s.as_bytes());
}

/// Read a game protocol string (VarUInt32 length + UTF-8).
pub fn read_string(buf: &mut impl Buf) -> Result<String, ProtoError> {
    let len = VarUInt32::proto_decode(buf)?.0 as usize;
    read_utf8(buf, len)
}

// ---------------------------------------------------------------------------
// Replication strings (u16 big-endian length)
// ---------------------------------------------------------------------------

/// Largest payload a `u16` length prefix can describe.
pub const MAX_UTF_LEN: usize = u16::MAX as usize;

/// Write a replication string (u16 BE length + UTF-8).
///
/// Strings longer than [`MAX_UTF_LEN`] bytes are cut at the last char
/// boundary that fits, so encoding never fails.
pub fn write_utf(buf: &mut impl BufMut, s: &str) {
    let s = if s.len() > MAX_UTF_LEN {
        let mut end = MAX_UTF_LEN;
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        warn!("Truncating {} byte string to {end} bytes", s.len());
        &s[..end]
    } else {
        s
    };
    buf.put_u16(s.len() as u16);
    buf.put_slice(s.as_bytes());
}

/// Read a replication string (u16 BE length + UTF-8).
pub fn read_utf(buf: &mut impl Buf) -> Result<String, ProtoError> {
    ensure_remaining(buf, 2)?;
    let len = buf.get_u16() as usize;
    read_utf8(buf, len)
}

/// Write a presence flag followed by the string when present.
pub fn write_optional_utf(buf: &mut impl BufMut, s: Option<&str>) {
    write_bool(buf, s.is_some());
    if let Some(s) = s {
        write_utf(buf, s);
    }
}

pub fn read_optional_utf(buf: &mut impl Buf) -> Result<Option<String>, ProtoError> {
    if read_bool(buf)? {
        Ok(Some(read_utf(buf)?))
    } else {
        Ok(None)
    }
}

fn read_utf8(buf: &mut impl Buf, len: usize) -> Result<String, ProtoError> {
    ensure_remaining(buf, len)?;
    let data = buf.copy_to_bytes(len);
    String::from_utf8(data.to_vec()).map_err(|_| ProtoError::InvalidUtf8)
}

// ---------------------------------------------------------------------------
// Scalars
// ---------------------------------------------------------------------------

pub fn write_bool(buf: &mut impl BufMut, value: bool) {
    buf.put_u8(value as u8);
}

/// Any non-zero byte reads as `true`.
pub fn read_bool(buf: &mut impl Buf) -> Result<bool, ProtoError> {
    Ok(read_u8(buf)? != 0)
}

pub fn read_u8(buf: &mut impl Buf) -> Result<u8, ProtoError> {
    ensure_remaining(buf, 1)?;
    Ok(buf.get_u8())
}

pub fn read_u16(buf: &mut impl Buf) -> Result<u16, ProtoError> {
    ensure_remaining(buf, 2)?;
    Ok(buf.get_u16())
}

pub fn read_i32(buf: &mut impl Buf) -> Result<i32, ProtoError> {
    ensure_remaining(buf, 4)?;
    Ok(buf.get_i32())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    #[test]
    fn string_roundtrip() {
        let mut buf = BytesMut::new();
        write_string(&mut buf, "Hello, scoreboard!");
        let result = read_string(&mut buf.freeze()).unwrap();
        assert_eq!(result, "Hello, scoreboard!");
    }

    #[test]
    fn string_buffer_too_short() {
        let mut buf = BytesMut::new();
        write_string(&mut buf, "Hello");
        let truncated = buf.freeze().slice(..3);
        assert!(read_string(&mut truncated.clone()).is_err());
    }

    #[test]
    fn utf_empty() {
        let mut buf = BytesMut::new();
        write_utf(&mut buf, "");
        assert_eq!(&buf[..], &[0, 0]);
        assert_eq!(read_utf(&mut buf.freeze()).unwrap(), "");
    }

    #[test]
    fn utf_unicode_length_is_bytes() {
        let mut buf = BytesMut::new();
        write_utf(&mut buf, "日本語テスト");
        assert_eq!(u16::from_be_bytes([buf[0], buf[1]]), 18);
        assert_eq!(read_utf(&mut buf.freeze()).unwrap(), "日本語テスト");
    }

    #[test]
    fn utf_oversized_is_truncated_on_char_boundary() {
        let long = "é".repeat(40_000); // 80_000 bytes
        let mut buf = BytesMut::new();
        write_utf(&mut buf, &long);
        let decoded = read_utf(&mut buf.freeze()).unwrap();
        assert!(decoded.len() <= MAX_UTF_LEN);
        assert_eq!(decoded.len() % 2, 0);
        assert!(long.starts_with(&decoded));
    }

    #[test]
    fn utf_invalid_bytes() {
        let data = [0u8, 2, 0xC3, 0x28];
        assert!(matches!(
            read_utf(&mut &data[..]),
            Err(ProtoError::InvalidUtf8)
        ));
    }

    #[test]
    fn optional_utf_roundtrip() {
        let mut buf = BytesMut::new();
        write_optional_utf(&mut buf, Some("sig"));
        write_optional_utf(&mut buf, None);
        let mut data = buf.freeze();
        assert_eq!(read_optional_utf(&mut data).unwrap().as_deref(), Some("sig"));
        assert_eq!(read_optional_utf(&mut data).unwrap(), None);
        assert!(!data.has_remaining());
    }

    #[test]
    fn decode_exact_rejects_trailing() {
        let data = [0u8, 0, 0, 5, 1];
        assert!(matches!(
            decode_exact::<crate::types::VarUInt32>(&data[1..]),
            Err(ProtoError::TrailingBytes(_))
        ));
    }

    #[test]
    fn scalars_truncated() {
        assert!(read_i32(&mut &[0u8, 1, 2][..]).is_err());
        assert!(read_bool(&mut &[0u8; 0][..]).is_err());
    }
}

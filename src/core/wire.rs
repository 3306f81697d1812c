//! # Wire Primitives
//!
//! Primitive value reading and writing for the binary protocol.
//!
//! Every value is fixed-width little-endian or self-delimiting:
//! - Strings: UTF-8 bytes followed by a single 0x00 terminator
//! - Blobs: i32 little-endian length prefix, then exactly that many bytes
//! - Integers: fixed-width little-endian, no padding or alignment
//! - Colors: three bytes, RGB order
//!
//! Readers never return partially-filled values: a string whose terminator
//! is missing or a blob whose declared length exceeds the remaining buffer
//! fails without consuming a partial result.

use crate::error::{constants, ProtocolError, Result};
use bytes::{BufMut, BytesMut};

/// RGB color carried by chat payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Default for Color {
    fn default() -> Self {
        Color::WHITE
    }
}

impl Color {
    pub const WHITE: Color = Color {
        r: 0xff,
        g: 0xff,
        b: 0xff,
    };

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse `#rrggbb`, `rrggbb`, `#rgb` or `rgb`. Returns `None` on any
    /// malformed input; callers keep their configured default in that case.
    pub fn from_hex(s: &str) -> Option<Color> {
        let hex = s.strip_prefix('#').unwrap_or(s);
        if !hex.is_ascii() {
            return None;
        }
        match hex.len() {
            6 => {
                let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
                let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
                let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
                Some(Color { r, g, b })
            }
            3 => {
                let r = u8::from_str_radix(&hex[0..1], 16).ok()?;
                let g = u8::from_str_radix(&hex[1..2], 16).ok()?;
                let b = u8::from_str_radix(&hex[2..3], 16).ok()?;
                Some(Color {
                    r: r * 17,
                    g: g * 17,
                    b: b * 17,
                })
            }
            _ => None,
        }
    }

    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// Writes primitive values into a growable buffer.
///
/// Primitive integer writes cannot fail; only values with representability
/// constraints (strings, blobs) return `Result`.
pub struct WireWriter<'a> {
    buf: &'a mut BytesMut,
}

impl<'a> WireWriter<'a> {
    pub fn new(buf: &'a mut BytesMut) -> Self {
        Self { buf }
    }

    /// UTF-8 bytes followed by the 0x00 terminator. A string containing an
    /// interior NUL cannot round-trip and is rejected.
    pub fn put_str(&mut self, value: &str) -> Result<()> {
        if value.as_bytes().contains(&0) {
            return Err(ProtocolError::InvalidString);
        }
        self.buf.put_slice(value.as_bytes());
        self.buf.put_u8(0);
        Ok(())
    }

    /// i32 little-endian length prefix, then the bytes.
    pub fn put_blob(&mut self, blob: &[u8]) -> Result<()> {
        let len = i32::try_from(blob.len())
            .map_err(|_| ProtocolError::OversizedFrame(blob.len()))?;
        self.buf.put_i32_le(len);
        self.buf.put_slice(blob);
        Ok(())
    }

    pub fn put_u8(&mut self, value: u8) {
        self.buf.put_u8(value);
    }

    pub fn put_bool(&mut self, value: bool) {
        self.buf.put_u8(u8::from(value));
    }

    pub fn put_u16(&mut self, value: u16) {
        self.buf.put_u16_le(value);
    }

    pub fn put_u32(&mut self, value: u32) {
        self.buf.put_u32_le(value);
    }

    pub fn put_u64(&mut self, value: u64) {
        self.buf.put_u64_le(value);
    }

    pub fn put_i32(&mut self, value: i32) {
        self.buf.put_i32_le(value);
    }

    pub fn put_color(&mut self, color: Color) {
        self.buf.put_u8(color.r);
        self.buf.put_u8(color.g);
        self.buf.put_u8(color.b);
    }
}

/// Reads primitive values from a borrowed buffer, tracking its position.
pub struct WireReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> WireReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.remaining() < n {
            return Err(ProtocolError::UnexpectedEof);
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub fn get_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    /// Any nonzero byte reads as true.
    pub fn get_bool(&mut self) -> Result<bool> {
        Ok(self.get_u8()? != 0)
    }

    pub fn get_u16(&mut self) -> Result<u16> {
        let bytes = self.take(2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    pub fn get_u32(&mut self) -> Result<u32> {
        let bytes = self.take(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn get_u64(&mut self) -> Result<u64> {
        let bytes = self.take(8)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(bytes);
        Ok(u64::from_le_bytes(raw))
    }

    pub fn get_i32(&mut self) -> Result<i32> {
        let bytes = self.take(4)?;
        Ok(i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Reads until the 0x00 terminator. Fails with `UnexpectedEof` when the
    /// buffer ends first, without consuming anything.
    pub fn get_str(&mut self) -> Result<String> {
        let rest = &self.buf[self.pos..];
        let terminator = rest
            .iter()
            .position(|&b| b == 0)
            .ok_or(ProtocolError::MalformedStream(
                constants::ERR_UNTERMINATED_STRING,
            ))?;
        let value = std::str::from_utf8(&rest[..terminator])
            .map_err(|_| ProtocolError::MalformedStream(constants::ERR_INVALID_UTF8))?
            .to_string();
        self.pos += terminator + 1;
        Ok(value)
    }

    /// Reads an i32 length prefix then exactly that many bytes. A negative
    /// length is malformed; a length past the end of the buffer fails before
    /// any allocation.
    pub fn get_blob(&mut self) -> Result<Vec<u8>> {
        let len = self.get_i32()?;
        if len < 0 {
            return Err(ProtocolError::MalformedStream(
                constants::ERR_NEGATIVE_LENGTH,
            ));
        }
        Ok(self.take(len as usize)?.to_vec())
    }

    pub fn get_color(&mut self) -> Result<Color> {
        let bytes = self.take(3)?;
        Ok(Color {
            r: bytes[0],
            g: bytes[1],
            b: bytes[2],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip_str(value: &str) -> String {
        let mut buf = BytesMut::new();
        WireWriter::new(&mut buf).put_str(value).unwrap();
        WireReader::new(&buf).get_str().unwrap()
    }

    #[test]
    fn test_string_roundtrip() {
        assert_eq!(roundtrip_str("hello"), "hello");
        assert_eq!(roundtrip_str(""), "");
        assert_eq!(roundtrip_str("héllo wörld ✨"), "héllo wörld ✨");
    }

    #[test]
    fn test_string_with_nul_rejected_on_write() {
        let mut buf = BytesMut::new();
        let err = WireWriter::new(&mut buf).put_str("a\0b").unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidString));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_unterminated_string_fails() {
        let err = WireReader::new(b"no terminator").get_str().unwrap_err();
        assert!(matches!(err, ProtocolError::MalformedStream(_)));
    }

    #[test]
    fn test_invalid_utf8_fails() {
        let err = WireReader::new(&[0xff, 0xfe, 0x00]).get_str().unwrap_err();
        assert!(matches!(err, ProtocolError::MalformedStream(_)));
    }

    #[test]
    fn test_blob_roundtrip() {
        let mut buf = BytesMut::new();
        let mut w = WireWriter::new(&mut buf);
        w.put_blob(&[1, 2, 3]).unwrap();
        w.put_blob(&[]).unwrap();

        let mut r = WireReader::new(&buf);
        assert_eq!(r.get_blob().unwrap(), vec![1, 2, 3]);
        assert_eq!(r.get_blob().unwrap(), Vec::<u8>::new());
        assert!(r.is_empty());
    }

    #[test]
    fn test_blob_negative_length_fails() {
        let mut buf = BytesMut::new();
        buf.put_i32_le(-1);
        let err = WireReader::new(&buf).get_blob().unwrap_err();
        assert!(matches!(err, ProtocolError::MalformedStream(_)));
    }

    #[test]
    fn test_blob_overrun_returns_no_partial_buffer() {
        let mut buf = BytesMut::new();
        buf.put_i32_le(100);
        buf.put_slice(&[9; 10]);

        let mut r = WireReader::new(&buf);
        let err = r.get_blob().unwrap_err();
        assert!(matches!(err, ProtocolError::UnexpectedEof));
        // The ten available bytes were not consumed as a partial blob.
        assert_eq!(r.remaining(), 10);
    }

    #[test]
    fn test_integers_are_little_endian() {
        let mut buf = BytesMut::new();
        let mut w = WireWriter::new(&mut buf);
        w.put_u16(0x1234);
        w.put_u32(0xdead_beef);
        w.put_i32(-2);

        assert_eq!(&buf[0..2], &[0x34, 0x12]);
        assert_eq!(&buf[2..6], &[0xef, 0xbe, 0xad, 0xde]);
        assert_eq!(&buf[6..10], &[0xfe, 0xff, 0xff, 0xff]);

        let mut r = WireReader::new(&buf);
        assert_eq!(r.get_u16().unwrap(), 0x1234);
        assert_eq!(r.get_u32().unwrap(), 0xdead_beef);
        assert_eq!(r.get_i32().unwrap(), -2);
    }

    #[test]
    fn test_truncated_integer_fails() {
        let mut r = WireReader::new(&[0x01, 0x02]);
        assert!(matches!(
            r.get_u32().unwrap_err(),
            ProtocolError::UnexpectedEof
        ));
        // Nothing consumed by the failed read.
        assert_eq!(r.remaining(), 2);
    }

    #[test]
    fn test_color_hex_parsing() {
        assert_eq!(Color::from_hex("#00adee"), Some(Color::new(0, 0xad, 0xee)));
        assert_eq!(Color::from_hex("00adee"), Some(Color::new(0, 0xad, 0xee)));
        assert_eq!(Color::from_hex("#fff"), Some(Color::WHITE));
        assert_eq!(Color::from_hex("#zzzzzz"), None);
        assert_eq!(Color::from_hex(""), None);
        assert_eq!(Color::from_hex("#12345"), None);
    }

    #[test]
    fn test_color_roundtrip() {
        let color = Color::new(0x12, 0x34, 0x56);
        let mut buf = BytesMut::new();
        WireWriter::new(&mut buf).put_color(color);
        assert_eq!(WireReader::new(&buf).get_color().unwrap(), color);
        assert_eq!(Color::from_hex(&color.to_hex()), Some(color));
    }

    #[test]
    fn test_bool_nonzero_reads_true() {
        let mut r = WireReader::new(&[0, 1, 7]);
        assert!(!r.get_bool().unwrap());
        assert!(r.get_bool().unwrap());
        assert!(r.get_bool().unwrap());
    }
}

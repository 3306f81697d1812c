//! # Frame Codec
//!
//! Delimits whole messages on a byte stream with a u32 little-endian length
//! prefix. The payload inside a frame is one `[DataID][payload]` message;
//! framing is what lets the receiver skip a message it cannot parse without
//! desynchronizing the stream.

use crate::config::MAX_FRAME_SIZE;
use crate::error::ProtocolError;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

const LEN_PREFIX: usize = 4;

/// Length-prefixed frame codec with a per-frame size cap.
#[derive(Debug, Clone, Copy)]
pub struct FrameCodec {
    max_frame_size: usize,
}

impl FrameCodec {
    pub fn new(max_frame_size: usize) -> Self {
        Self { max_frame_size }
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new(MAX_FRAME_SIZE)
    }
}

impl Encoder<Bytes> for FrameCodec {
    type Error = ProtocolError;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<(), Self::Error> {
        if item.len() > self.max_frame_size {
            return Err(ProtocolError::OversizedFrame(item.len()));
        }
        dst.reserve(LEN_PREFIX + item.len());
        dst.put_u32_le(item.len() as u32);
        dst.put_slice(&item);
        Ok(())
    }
}

impl Decoder for FrameCodec {
    type Item = BytesMut;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < LEN_PREFIX {
            return Ok(None);
        }

        let mut len_bytes = [0u8; LEN_PREFIX];
        len_bytes.copy_from_slice(&src[..LEN_PREFIX]);
        let len = u32::from_le_bytes(len_bytes) as usize;

        // Reject before reserving anything for it.
        if len > self.max_frame_size {
            return Err(ProtocolError::OversizedFrame(len));
        }

        if src.len() < LEN_PREFIX + len {
            src.reserve(LEN_PREFIX + len - src.len());
            return Ok(None);
        }

        src.advance(LEN_PREFIX);
        Ok(Some(src.split_to(len)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_roundtrip() {
        let mut codec = FrameCodec::default();
        let mut buf = BytesMut::new();
        codec
            .encode(Bytes::from_static(b"chat\0hello"), &mut buf)
            .unwrap();

        let frame = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(&frame[..], b"chat\0hello");
        assert!(buf.is_empty());
    }

    #[test]
    fn test_partial_frame_needs_more_data() {
        let mut codec = FrameCodec::default();
        let mut buf = BytesMut::new();
        codec.encode(Bytes::from_static(b"payload"), &mut buf).unwrap();

        let mut partial = buf.split_to(buf.len() - 3);
        assert!(codec.decode(&mut partial).unwrap().is_none());

        partial.unsplit(buf);
        let frame = codec.decode(&mut partial).unwrap().unwrap();
        assert_eq!(&frame[..], b"payload");
    }

    #[test]
    fn test_short_length_prefix_needs_more_data() {
        let mut codec = FrameCodec::default();
        let mut buf = BytesMut::from(&[0x05, 0x00][..]);
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn test_zero_length_frame() {
        let mut codec = FrameCodec::default();
        let mut buf = BytesMut::new();
        codec.encode(Bytes::new(), &mut buf).unwrap();
        assert_eq!(buf.len(), LEN_PREFIX);

        let frame = codec.decode(&mut buf).unwrap().unwrap();
        assert!(frame.is_empty());
    }

    #[test]
    fn test_oversized_frame_rejected_on_encode() {
        let mut codec = FrameCodec::new(16);
        let mut buf = BytesMut::new();
        let err = codec
            .encode(Bytes::from(vec![0u8; 17]), &mut buf)
            .unwrap_err();
        assert!(matches!(err, ProtocolError::OversizedFrame(17)));
    }

    #[test]
    fn test_oversized_frame_rejected_on_decode() {
        let mut codec = FrameCodec::new(16);
        let mut buf = BytesMut::new();
        buf.put_u32_le(1024);
        buf.put_slice(&[0u8; 8]);
        let err = codec.decode(&mut buf).unwrap_err();
        assert!(matches!(err, ProtocolError::OversizedFrame(1024)));
    }

    #[test]
    fn test_multiple_frames_in_one_buffer() {
        let mut codec = FrameCodec::default();
        let mut buf = BytesMut::new();
        codec.encode(Bytes::from_static(b"one"), &mut buf).unwrap();
        codec.encode(Bytes::from_static(b"two"), &mut buf).unwrap();

        assert_eq!(&codec.decode(&mut buf).unwrap().unwrap()[..], b"one");
        assert_eq!(&codec.decode(&mut buf).unwrap().unwrap()[..], b"two");
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }
}

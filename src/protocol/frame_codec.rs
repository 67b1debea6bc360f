//! Length-delimited framing for byte-stream connections.
//!
//! The format is as follows:
//! 1. VarInt - size of the rest of the frame, in bytes
//! 2. VarInt - packet identifier
//! 3. Packet payload
//!
//! Identifiers are written as the VarInt of their bit pattern, so the
//! full `u32` range survives the trip.

use crate::{
    dispatcher::Frame,
    protocol::{packet::PacketId, var_int_size, DecodeError, Decoder, Encoder, BUFFER_LIMIT},
};
use bytes::{Buf, BytesMut};
use tokio_util::codec;

/// An error while framing or unframing a byte stream.
///
/// Any of these leaves the stream unusable.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("frame length of {length} exceeds maximum of {max}")]
    TooLarge { length: usize, max: usize },
    #[error("malformed frame header: {0}")]
    Header(#[from] DecodeError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Splits a byte stream into [`Frame`]s and writes frames back out.
#[derive(Debug, Clone)]
pub struct FrameCodec {
    max_length: usize,
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new(BUFFER_LIMIT)
    }
}

impl FrameCodec {
    /// Creates a codec that rejects frames longer than `max_length` bytes
    /// (identifier and payload, without the length prefix).
    pub fn new(max_length: usize) -> Self {
        Self { max_length }
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }
}

impl codec::Decoder for FrameCodec {
    type Item = Frame;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, FrameError> {
        let mut decoder = Decoder::new(&src[..]);
        let (length, prefix_size) = match decoder.read_var_int_with_size() {
            Ok(x) => x,
            Err(DecodeError::EndOfStream(_)) => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let length = usize::try_from(length).map_err(DecodeError::from)?;
        if length > self.max_length {
            return Err(FrameError::TooLarge {
                length,
                max: self.max_length,
            });
        }

        let available = decoder.buffer().len();
        if available < length {
            src.reserve(length - available);
            return Ok(None);
        }

        let mut body = Decoder::new(&decoder.buffer()[..length]);
        let (id, id_size) = body.read_var_int_with_size()?;
        let id = PacketId(bytemuck::cast(id));

        src.advance(prefix_size);
        let mut frame = src.split_to(length);
        frame.advance(id_size);
        Ok(Some(Frame {
            id,
            payload: frame.freeze(),
        }))
    }
}

impl codec::Encoder<Frame> for FrameCodec {
    type Error = FrameError;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<(), FrameError> {
        let id: i32 = bytemuck::cast(frame.id.0);
        let length = var_int_size(id) + frame.payload.len();
        if length > self.max_length {
            return Err(FrameError::TooLarge {
                length,
                max: self.max_length,
            });
        }

        let mut header = Vec::with_capacity(10);
        let mut encoder = Encoder::new(&mut header);
        encoder.write_var_int(length.try_into().map_err(DecodeError::from)?);
        encoder.write_var_int(id);

        dst.reserve(header.len() + frame.payload.len());
        dst.extend_from_slice(&header);
        dst.extend_from_slice(&frame.payload);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_util::codec::{Decoder as _, Encoder as _};

    fn encode(codec: &mut FrameCodec, frame: Frame) -> BytesMut {
        let mut buf = BytesMut::new();
        codec.encode(frame, &mut buf).unwrap();
        buf
    }

    #[test]
    fn frame_layout() {
        let mut codec = FrameCodec::default();
        let buf = encode(&mut codec, Frame::new(PacketId(7), vec![0, 0, 0, 42]));
        assert_eq!(&buf[..], [0x05, 0x07, 0x00, 0x00, 0x00, 0x2a]);
    }

    #[test]
    fn frames_survive_split_reads() {
        let mut codec = FrameCodec::default();
        let mut wire = encode(&mut codec, Frame::new(PacketId(300), b"hello".to_vec()));
        wire.extend_from_slice(&encode(&mut codec, Frame::new(PacketId(1), Vec::new())));

        let mut src = BytesMut::new();
        let mut frames = Vec::new();
        for byte in wire {
            src.extend_from_slice(&[byte]);
            while let Some(frame) = codec.decode(&mut src).unwrap() {
                frames.push(frame);
            }
        }

        assert!(src.is_empty());
        assert_eq!(
            frames,
            [
                Frame::new(PacketId(300), b"hello".to_vec()),
                Frame::new(PacketId(1), Vec::new()),
            ]
        );
    }

    #[test]
    fn full_identifier_range() {
        let mut codec = FrameCodec::default();
        let frame = Frame::new(PacketId(u32::MAX), vec![1]);
        let mut buf = encode(&mut codec, frame.clone());
        assert_eq!(codec.decode(&mut buf).unwrap(), Some(frame));
    }

    #[test]
    fn oversized_frames_are_rejected() {
        let mut codec = FrameCodec::new(8);
        let mut buf = BytesMut::new();
        let err = codec
            .encode(Frame::new(PacketId(1), vec![0; 8]), &mut buf)
            .unwrap_err();
        assert!(matches!(err, FrameError::TooLarge { length: 9, max: 8 }));

        // declared length 100, nothing else has arrived yet
        let mut src = BytesMut::from(&[100u8][..]);
        assert!(matches!(
            codec.decode(&mut src),
            Err(FrameError::TooLarge { length: 100, max: 8 })
        ));
    }

    #[test]
    fn empty_frame_has_no_identifier() {
        let mut codec = FrameCodec::default();
        let mut src = BytesMut::from(&[0x00, 0x01][..]);
        assert!(matches!(
            codec.decode(&mut src),
            Err(FrameError::Header(DecodeError::EndOfStream(1)))
        ));
    }

    #[test]
    fn negative_length_is_rejected() {
        let mut codec = FrameCodec::default();
        let mut src = BytesMut::from(&[0xff, 0xff, 0xff, 0xff, 0x0f][..]);
        assert!(matches!(
            codec.decode(&mut src),
            Err(FrameError::Header(DecodeError::IntConversion(_)))
        ));
    }
}

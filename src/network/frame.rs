//! Framing
//!
//! Wire envelope: `[type:u8][length:u32 BE][payload]`. The decoder
//! accumulates arbitrary read chunks and yields complete frames. A header
//! declaring more than the configured maximum is rejected as soon as the
//! header is visible, before any payload is buffered for it.

use std::fmt;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;

use super::codec::WireError;

/// Header size: 1 type byte + 4 length bytes.
pub const HEADER_LEN: usize = 5;

/// Default maximum payload length (1 MiB).
pub const DEFAULT_MAX_FRAME_LEN: usize = 1 << 20;

// =============================================================================
// MESSAGE TYPE
// =============================================================================

/// Frame type tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum MessageType {
    HeartBeat = 0,
    Movement = 1,
    GameObjects = 2,
    Users = 3,
    Fire = 4,
    GameMode = 5,
    PositionUpdate = 6,
    LobbyCountdown = 7,
}

impl MessageType {
    /// Wire byte.
    #[inline]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// True for messages a newer one of the same type fully supersedes.
    pub const fn is_snapshot(self) -> bool {
        matches!(self, MessageType::PositionUpdate | MessageType::HeartBeat)
    }
}

impl TryFrom<u8> for MessageType {
    type Error = WireError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => MessageType::HeartBeat,
            1 => MessageType::Movement,
            2 => MessageType::GameObjects,
            3 => MessageType::Users,
            4 => MessageType::Fire,
            5 => MessageType::GameMode,
            6 => MessageType::PositionUpdate,
            7 => MessageType::LobbyCountdown,
            other => return Err(WireError::UnknownMessageType(other)),
        })
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

// =============================================================================
// HEADER / MESSAGE
// =============================================================================

/// Decoded header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DataHeader {
    /// Raw type byte (may be unknown)
    pub message_type: u8,
    /// Payload length
    pub length: u32,
}

impl DataHeader {
    /// Parse from the first `HEADER_LEN` bytes; `None` if fewer are present.
    pub fn peek(buf: &[u8]) -> Option<Self> {
        if buf.len() < HEADER_LEN {
            return None;
        }
        Some(Self {
            message_type: buf[0],
            length: u32::from_be_bytes([buf[1], buf[2], buf[3], buf[4]]),
        })
    }
}

/// One complete frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BinaryMessage {
    pub message_type: MessageType,
    pub payload: Bytes,
}

impl BinaryMessage {
    /// Create a frame.
    pub fn new(message_type: MessageType, payload: impl Into<Bytes>) -> Self {
        Self {
            message_type,
            payload: payload.into(),
        }
    }

    /// Header plus payload, ready for the socket.
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(HEADER_LEN + self.payload.len());
        buf.put_u8(self.message_type.as_u8());
        buf.put_u32(u32::try_from(self.payload.len()).unwrap_or(u32::MAX));
        buf.extend_from_slice(&self.payload);
        buf.freeze()
    }

    /// Bytes on the wire.
    pub fn wire_len(&self) -> usize {
        HEADER_LEN + self.payload.len()
    }
}

// =============================================================================
// DECODER
// =============================================================================

/// Framing failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// Stream cannot be resynchronized; drop the connection.
    #[error("frame of {declared} bytes exceeds maximum of {max}")]
    TooLarge { declared: usize, max: usize },

    /// The frame was consumed and discarded; the stream is still usable.
    #[error("unknown message type {0}")]
    UnknownType(u8),
}

impl FrameError {
    /// True if the connection must be torn down.
    pub fn is_fatal(&self) -> bool {
        matches!(self, FrameError::TooLarge { .. })
    }
}

/// Incremental frame reassembly.
#[derive(Debug)]
pub struct FrameDecoder {
    buf: BytesMut,
    max_frame_len: usize,
}

impl FrameDecoder {
    /// Decoder rejecting payloads above `max_frame_len`.
    pub fn new(max_frame_len: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(4096),
            max_frame_len,
        }
    }

    /// Append freshly read bytes.
    pub fn extend(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// Bytes waiting for a complete frame.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Next complete frame, if any.
    ///
    /// `Ok(None)` means more bytes are needed. Unknown types are consumed
    /// and reported; oversize declarations leave the buffer untouched and
    /// are fatal.
    pub fn next_frame(&mut self) -> Result<Option<BinaryMessage>, FrameError> {
        let header = match DataHeader::peek(&self.buf) {
            Some(h) => h,
            None => return Ok(None),
        };

        let length = header.length as usize;
        if length > self.max_frame_len {
            return Err(FrameError::TooLarge {
                declared: length,
                max: self.max_frame_len,
            });
        }
        if self.buf.len() < HEADER_LEN + length {
            return Ok(None);
        }

        self.buf.advance(HEADER_LEN);
        let payload = self.buf.split_to(length).freeze();

        match MessageType::try_from(header.message_type) {
            Ok(message_type) => Ok(Some(BinaryMessage { message_type, payload })),
            Err(_) => Err(FrameError::UnknownType(header.message_type)),
        }
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_LEN)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(decoder: &mut FrameDecoder) -> Vec<BinaryMessage> {
        let mut out = Vec::new();
        while let Some(frame) = decoder.next_frame().unwrap() {
            out.push(frame);
        }
        out
    }

    #[test]
    fn test_encode_header() {
        let frame = BinaryMessage::new(MessageType::Fire, vec![1u8, 2, 3]);
        let bytes = frame.encode();
        assert_eq!(&bytes[..], &[4, 0, 0, 0, 3, 1, 2, 3]);
        assert_eq!(frame.wire_len(), 8);
    }

    #[test]
    fn test_fragmented_reads_reassemble_two_frames() {
        let a = BinaryMessage::new(MessageType::Movement, vec![7u8; 9]);
        let b = BinaryMessage::new(MessageType::PositionUpdate, vec![9u8; 300]);
        let mut stream = a.encode().to_vec();
        stream.extend_from_slice(&b.encode());

        let mut decoder = FrameDecoder::default();
        let mut frames = Vec::new();
        let mut offset = 0;
        for size in [2usize, 10, 4096] {
            let end = (offset + size).min(stream.len());
            decoder.extend(&stream[offset..end]);
            offset = end;
            frames.extend(drain(&mut decoder));
        }

        assert_eq!(frames, vec![a, b]);
        assert_eq!(decoder.buffered(), 0);
    }

    #[test]
    fn test_oversize_rejected_without_buffering() {
        let mut decoder = FrameDecoder::default();
        let mut bytes = vec![MessageType::GameObjects.as_u8()];
        bytes.extend_from_slice(&10_000_000u32.to_be_bytes());
        bytes.extend_from_slice(&[0u8; 45]);
        decoder.extend(&bytes);

        let err = decoder.next_frame().unwrap_err();
        assert_eq!(err, FrameError::TooLarge { declared: 10_000_000, max: DEFAULT_MAX_FRAME_LEN });
        assert!(err.is_fatal());
        assert!(decoder.buffered() <= 50);
    }

    #[test]
    fn test_unknown_type_skipped() {
        let mut decoder = FrameDecoder::default();
        decoder.extend(&[42, 0, 0, 0, 1, 0xFF]);
        decoder.extend(&BinaryMessage::new(MessageType::HeartBeat, Bytes::new()).encode());

        let err = decoder.next_frame().unwrap_err();
        assert_eq!(err, FrameError::UnknownType(42));
        assert!(!err.is_fatal());
        let next = decoder.next_frame().unwrap().unwrap();
        assert_eq!(next.message_type, MessageType::HeartBeat);
    }

    #[test]
    fn test_empty_payload() {
        let mut decoder = FrameDecoder::default();
        decoder.extend(&[0, 0, 0, 0, 0]);
        let frame = decoder.next_frame().unwrap().unwrap();
        assert_eq!(frame.message_type, MessageType::HeartBeat);
        assert!(frame.payload.is_empty());
    }

    #[test]
    fn test_message_type_codes() {
        for code in 0u8..=7 {
            assert_eq!(MessageType::try_from(code).unwrap().as_u8(), code);
        }
        assert!(MessageType::try_from(8).is_err());
    }
}

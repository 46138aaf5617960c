use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};

/// Message header: payload length (4B big-endian).
pub const HEADER_SIZE: usize = 4;

/// Default maximum payload size: 16 MiB.
///
/// The protocol itself has no upper bound. A full skeleton with every
/// channel enabled stays far below this.
pub const DEFAULT_MAX_MESSAGE: usize = 16 * 1024 * 1024;

/// Encode a message into the wire format.
///
/// Wire format:
/// ```text
/// ┌──────────────┬─────────────────┐
/// │ Length       │ Payload         │
/// │ (4B BE)      │ (Length bytes)  │
/// └──────────────┴─────────────────┘
/// ```
pub fn encode_message(payload: &[u8], dst: &mut BytesMut) -> Result<()> {
    if payload.len() > u32::MAX as usize {
        return Err(FrameError::MessageTooLarge {
            size: payload.len(),
            max: u32::MAX as usize,
        });
    }
    dst.reserve(HEADER_SIZE + payload.len());
    dst.put_u32(payload.len() as u32);
    dst.put_slice(payload);
    Ok(())
}

/// Decode one message from a buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete message yet.
/// On success, consumes the header and payload bytes from the buffer.
/// An oversized length is rejected as soon as the header is visible, before
/// any payload is buffered.
pub fn decode_message(src: &mut BytesMut, max_message: usize) -> Result<Option<Bytes>> {
    if src.len() < HEADER_SIZE {
        return Ok(None); // Need more data
    }

    let mut header = [0u8; HEADER_SIZE];
    header.copy_from_slice(&src[..HEADER_SIZE]);
    let payload_len = u32::from_be_bytes(header) as usize;

    if payload_len > max_message {
        return Err(FrameError::MessageTooLarge {
            size: payload_len,
            max: max_message,
        });
    }

    let total = HEADER_SIZE + payload_len;
    if src.len() < total {
        src.reserve(total - src.len());
        return Ok(None); // Need more data
    }

    src.advance(HEADER_SIZE);
    Ok(Some(src.split_to(payload_len).freeze()))
}

/// Configuration for the message codec.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum payload size in bytes. Default: 16 MiB.
    pub max_message_size: usize,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_message_size: DEFAULT_MAX_MESSAGE,
        }
    }
}

/// `tokio_util` codec speaking the same wire format as
/// [`MessageReader`](crate::MessageReader) and [`MessageWriter`](crate::MessageWriter).
#[cfg(feature = "async")]
#[derive(Debug, Clone)]
pub struct MessageCodec {
    config: FrameConfig,
}

#[cfg(feature = "async")]
impl MessageCodec {
    /// Create a codec with default configuration.
    pub fn new() -> Self {
        Self::with_config(FrameConfig::default())
    }

    /// Create a codec with explicit configuration.
    pub fn with_config(config: FrameConfig) -> Self {
        Self { config }
    }

    /// Current codec configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

#[cfg(feature = "async")]
impl Default for MessageCodec {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "async")]
impl tokio_util::codec::Decoder for MessageCodec {
    type Item = Bytes;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Bytes>> {
        decode_message(src, self.config.max_message_size)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Bytes>> {
        match self.decode(src)? {
            Some(message) => Ok(Some(message)),
            None if src.is_empty() => Ok(None),
            None => Err(FrameError::ConnectionClosed),
        }
    }
}

#[cfg(feature = "async")]
impl tokio_util::codec::Encoder<&[u8]> for MessageCodec {
    type Error = FrameError;

    fn encode(&mut self, payload: &[u8], dst: &mut BytesMut) -> Result<()> {
        if payload.len() > self.config.max_message_size {
            return Err(FrameError::MessageTooLarge {
                size: payload.len(),
                max: self.config.max_message_size,
            });
        }
        encode_message(payload, dst)
    }
}

#[cfg(feature = "async")]
impl tokio_util::codec::Encoder<Bytes> for MessageCodec {
    type Error = FrameError;

    fn encode(&mut self, payload: Bytes, dst: &mut BytesMut) -> Result<()> {
        tokio_util::codec::Encoder::<&[u8]>::encode(self, payload.as_ref(), dst)
    }
}

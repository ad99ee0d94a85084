//! Frame codec.
//!
//! # Wire format
//!
//! ```text
//! [1 byte: message type]
//! [4 bytes BE: payload length]
//! [length bytes: payload]
//! ```
//!
//! A reader must consume exactly `length` payload bytes before the next
//! header is valid, whatever the payload contains.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::ProtocolError;

/// Header length in bytes (type + length).
pub const HEADER_LEN: usize = 5;

/// A decoded frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Raw type byte; see [`MessageType`](crate::MessageType).
    pub msg_type: u8,
    /// Exact payload byte count that follows the header.
    pub length: u32,
}

impl FrameHeader {
    pub fn payload_len(&self) -> usize {
        self.length as usize
    }

    /// Rejects a declared payload larger than `max` bytes.
    pub fn check_len(&self, max: usize) -> Result<(), ProtocolError> {
        let len = self.payload_len();
        if len > max {
            return Err(ProtocolError::PayloadTooLarge { len, max });
        }
        Ok(())
    }
}

/// Decodes a header from the first [`HEADER_LEN`] bytes of `bytes`.
pub fn decode_header(bytes: &[u8]) -> Result<FrameHeader, ProtocolError> {
    if bytes.len() < HEADER_LEN {
        return Err(ProtocolError::TruncatedHeader { got: bytes.len() });
    }
    Ok(FrameHeader {
        msg_type: bytes[0],
        length: u32::from_be_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]),
    })
}

/// Encodes a full frame (header + payload).
pub fn encode_frame(msg_type: u8, payload: &[u8]) -> Result<Vec<u8>, ProtocolError> {
    let len =
        u32::try_from(payload.len()).map_err(|_| ProtocolError::Unframeable(payload.len()))?;
    let mut buf = Vec::with_capacity(HEADER_LEN + payload.len());
    buf.push(msg_type);
    buf.extend_from_slice(&len.to_be_bytes());
    buf.extend_from_slice(payload);
    Ok(buf)
}

/// Reads the next frame header.
///
/// Returns `None` when the peer closed the stream cleanly on a frame
/// boundary. A close after a partial header is [`ProtocolError::TruncatedHeader`].
pub async fn read_header<R: AsyncRead + Unpin>(
    reader: &mut R,
) -> Result<Option<FrameHeader>, ProtocolError> {
    let mut buf = [0u8; HEADER_LEN];
    let mut filled = 0;
    while filled < HEADER_LEN {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            if filled == 0 {
                return Ok(None);
            }
            return Err(ProtocolError::TruncatedHeader { got: filled });
        }
        filled += n;
    }
    decode_header(&buf).map(Some)
}

/// Reads exactly `len` payload bytes.
pub async fn read_payload<R: AsyncRead + Unpin>(
    reader: &mut R,
    len: usize,
) -> Result<Vec<u8>, ProtocolError> {
    let mut payload = vec![0u8; len];
    let mut got = 0;
    while got < len {
        let n = reader.read(&mut payload[got..]).await?;
        if n == 0 {
            return Err(ProtocolError::TruncatedPayload { expected: len, got });
        }
        got += n;
    }
    Ok(payload)
}

/// Writes a frame and flushes the writer.
pub async fn write_frame<W: AsyncWrite + Unpin>(
    writer: &mut W,
    msg_type: u8,
    payload: &[u8],
) -> Result<(), ProtocolError> {
    let frame = encode_frame(msg_type, payload)?;
    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}

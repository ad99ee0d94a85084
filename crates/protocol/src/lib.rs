//! Wire protocol for PhotoSync device-to-server communication.
//!
//! Every message is a frame: `[1 byte: type][4 bytes BE: length][payload]`.
//! Payloads are JSON for file transfers and catalog queries, raw UTF-8 for
//! the phone name, and ASCII for acknowledgments.

pub mod constants;
pub mod frame;
pub mod messages;

// Re-export primary types for convenience.
pub use constants::MessageType;
pub use frame::{
    FrameHeader, HEADER_LEN, decode_header, encode_frame, read_header, read_payload, write_frame,
};
pub use messages::{
    ChunkComplete, ChunkData, ChunkStart, FileUpload, ThumbListRequest, ThumbListResponse,
    ThumbRecord,
};

/// Errors produced while reading or writing frames.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("truncated header: got {got} of {HEADER_LEN} bytes")]
    TruncatedHeader { got: usize },

    #[error("truncated payload: expected {expected} bytes, got {got}")]
    TruncatedPayload { expected: usize, got: usize },

    #[error("payload too large: {len} bytes (max {max})")]
    PayloadTooLarge { len: usize, max: usize },

    #[error("payload too large to frame: {0} bytes")]
    Unframeable(usize),
}

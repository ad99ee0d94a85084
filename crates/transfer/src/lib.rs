//! File storage for uploads: single-shot direct uploads and chunked video
//! reassembly with temp-file staging.

mod direct;
mod naming;
mod reassembler;
mod validation;

use std::path::PathBuf;

pub use direct::store_direct;
pub use naming::{
    DEFAULT_VIDEO_EXTENSION, FALLBACK_EXTENSION, resolve_file_name, sanitize_media_token,
};
pub use reassembler::{
    AppendOutcome, ChunkedTransfer, Finalized, Reassembler, StartOutcome, TransferState,
};
pub use validation::validate_upload_path;

/// Errors produced by the transfer crate.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("unknown transfer: {0}")]
    UnknownTransfer(String),

    #[error("transfer not open: {0}")]
    NotOpen(String),

    #[error("could not finalize {id}: {source}; bytes left in {}", .orphan.display())]
    Finalize {
        id: String,
        orphan: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

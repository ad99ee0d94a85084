//! TCP sync server for PhotoSync.
//!
//! [`SyncServer`] accepts phone connections and runs one [`Session`] task
//! per connection. A session reads frames strictly in order, stores
//! uploads through the transfer crate and answers catalog queries through
//! the shared [`ThumbnailCoordinator`](photosync_thumbnails::ThumbnailCoordinator).

mod server;
mod session;

use std::path::PathBuf;

use photosync_protocol::ProtocolError;
use photosync_protocol::constants::DEFAULT_MAX_PAYLOAD;

pub use server::SyncServer;
pub use session::Session;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Root under which phone directories are created.
    pub receive_dir: PathBuf,
    /// Largest accepted frame payload in bytes.
    pub max_payload: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            receive_dir: PathBuf::from("received"),
            max_payload: DEFAULT_MAX_PAYLOAD,
        }
    }
}

/// Errors that end a connection (or the server).
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unexpected message type {0}")]
    UnexpectedMessage(u8),

    #[error("invalid phone name: {0}")]
    InvalidPhoneName(String),
}

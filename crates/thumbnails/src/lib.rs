//! Thumbnail generation and the thumbnail catalog.
//!
//! [`ThumbnailCoordinator`] is the process-wide entry point: it runs at most
//! one generation pass at a time and lets a new sync session cancel the
//! pass in flight. Catalog queries ([`count`], [`list_page`]) only read the
//! thumbnails directory and never wait on a pass.

mod catalog;
mod coordinator;
mod pass;
mod render;
mod tools;

use std::time::Duration;

pub use catalog::{count, list_page};
pub use coordinator::ThumbnailCoordinator;
pub use pass::{PassReport, generate_pass};
pub use render::{render_thumbnail, thumbnail_size};
pub use tools::{ExternalTools, SystemTools, ToolFuture};

/// Maximum thumbnail width in pixels.
pub const MAX_THUMB_WIDTH: u32 = 320;

/// JPEG quality for every non-PNG thumbnail.
pub const JPEG_QUALITY: u8 = 80;

/// Offset into a video where the thumbnail frame is taken.
pub const VIDEO_FRAME_AT: Duration = Duration::from_secs(1);

/// Limit for a single external tool invocation.
pub const TOOL_TIMEOUT: Duration = Duration::from_secs(15);

/// Errors produced while generating thumbnails or reading the catalog.
#[derive(Debug, thiserror::Error)]
pub enum ThumbnailError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("{0} not found")]
    ToolMissing(String),

    #[error("{tool} exited with {status}: {stderr}")]
    ToolFailed {
        tool: String,
        status: String,
        stderr: String,
    },

    #[error("{tool} timed out after {}s", .timeout.as_secs())]
    ToolTimeout { tool: String, timeout: Duration },

    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

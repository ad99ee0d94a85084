//! Media classification and on-disk layout.
//!
//! Extensions are only a hint: content sniffing overrides them for HEIC
//! (which phones happily save as `.jpg`) and for JPEGs that arrive named
//! `.heic`.

mod kind;
mod layout;
mod sniff;

pub use kind::{ImageFormat, MediaKind, classify, classify_by_extension, extension_of};
pub use layout::{
    CREATED_MARKER_CONTENT, THUMBNAIL_PREFIX, THUMBNAILS_DIR, created_marker_path,
    is_hidden, is_thumbnail_name, thumbnail_dir, thumbnail_id, thumbnail_name,
};
pub use sniff::{SNIFF_LEN, read_head, sniff_is_heic, sniff_is_jpeg, sniff_video_extension};

/// Image extensions accepted for generation and catalog listing.
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "heic"];

/// Video extensions accepted for generation.
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "m4v", "avi", "mkv"];

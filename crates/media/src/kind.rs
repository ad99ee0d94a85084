use std::path::Path;

use crate::sniff::{sniff_is_heic, sniff_is_jpeg};
use crate::VIDEO_EXTENSIONS;

/// Still-image encodings the server knows how to thumbnail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageFormat {
    Jpeg,
    Png,
    Heic,
}

impl ImageFormat {
    /// Whether thumbnails of this format are written as PNG.
    pub fn keeps_png(self) -> bool {
        matches!(self, Self::Png)
    }
}

/// Result of classifying a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Image(ImageFormat),
    Video,
    Unknown,
}

/// Lowercased extension of `name` without the dot.
pub fn extension_of(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

/// Classifies by extension alone (case-insensitive).
pub fn classify_by_extension(name: &str) -> MediaKind {
    let Some(ext) = extension_of(name) else {
        return MediaKind::Unknown;
    };
    match ext.as_str() {
        "jpg" | "jpeg" => MediaKind::Image(ImageFormat::Jpeg),
        "png" => MediaKind::Image(ImageFormat::Png),
        "heic" => MediaKind::Image(ImageFormat::Heic),
        e if VIDEO_EXTENSIONS.contains(&e) => MediaKind::Video,
        _ => MediaKind::Unknown,
    }
}

/// Classifies from the leading bytes plus the name.
///
/// The extension picks image vs. video; for images the content decides the
/// format: HEIC magic wins over any extension, and a `.heic` file that
/// starts with a JPEG marker is a JPEG.
pub fn classify(head: &[u8], name: &str) -> MediaKind {
    match classify_by_extension(name) {
        MediaKind::Image(_) if sniff_is_heic(head) => MediaKind::Image(ImageFormat::Heic),
        MediaKind::Image(ImageFormat::Heic) if sniff_is_jpeg(head) => {
            MediaKind::Image(ImageFormat::Jpeg)
        }
        other => other,
    }
}

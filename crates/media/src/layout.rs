use std::path::{Path, PathBuf};

use crate::kind::{ImageFormat, MediaKind, extension_of};

/// Filename prefix of every generated thumbnail.
pub const THUMBNAIL_PREFIX: &str = "tbn-";

/// Subdirectory of a sync directory holding thumbnails.
pub const THUMBNAILS_DIR: &str = "thumbnails";

/// Body written into a created-media marker.
pub const CREATED_MARKER_CONTENT: &str = "created";

/// `<dir>/thumbnails`.
pub fn thumbnail_dir(dir: &Path) -> PathBuf {
    dir.join(THUMBNAILS_DIR)
}

/// Returns `true` for names carrying the thumbnail prefix (any case).
pub fn is_thumbnail_name(name: &str) -> bool {
    name.get(..THUMBNAIL_PREFIX.len())
        .is_some_and(|p| p.eq_ignore_ascii_case(THUMBNAIL_PREFIX))
}

/// Dot-files are temp and marker files, never media.
pub fn is_hidden(name: &str) -> bool {
    name.starts_with('.')
}

fn stem(name: &str) -> &str {
    match name.rfind('.') {
        Some(0) | None => name,
        Some(i) => &name[..i],
    }
}

/// Thumbnail filename for a source file of the given kind.
///
/// Images keep their own name and extension, except HEIC content or a
/// `.heic` name, which become `.jpg`. Videos always get `.jpg`.
pub fn thumbnail_name(source_name: &str, kind: MediaKind) -> Option<String> {
    match kind {
        MediaKind::Image(format) => {
            let heic_name = extension_of(source_name).as_deref() == Some("heic");
            if format == ImageFormat::Heic || heic_name {
                Some(format!("{THUMBNAIL_PREFIX}{}.jpg", stem(source_name)))
            } else {
                Some(format!("{THUMBNAIL_PREFIX}{source_name}"))
            }
        }
        MediaKind::Video => Some(format!("{THUMBNAIL_PREFIX}{}.jpg", stem(source_name))),
        MediaKind::Unknown => None,
    }
}

/// Catalog id of a thumbnail: its name without extension or prefix.
pub fn thumbnail_id(thumb_name: &str) -> &str {
    let base = stem(thumb_name);
    if is_thumbnail_name(base) {
        &base[THUMBNAIL_PREFIX.len()..]
    } else {
        base
    }
}

/// `.<stem>.created` beside `video`.
pub fn created_marker_path(video: &Path) -> PathBuf {
    let stem = video
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let parent = video.parent().unwrap_or_else(|| Path::new(""));
    parent.join(format!(".{stem}.created"))
}

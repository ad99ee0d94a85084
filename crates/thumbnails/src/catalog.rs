//! Read-only queries over `<dir>/thumbnails`.

use std::path::Path;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use photosync_media::{
    IMAGE_EXTENSIONS, VIDEO_EXTENSIONS, extension_of, is_hidden, thumbnail_dir, thumbnail_id,
};
use photosync_protocol::ThumbRecord;

use crate::ThumbnailError;

/// Sorted names of listable thumbnails; empty if the directory is absent.
async fn thumbnail_names(dir: &Path) -> Result<Vec<String>, ThumbnailError> {
    let mut entries = match tokio::fs::read_dir(thumbnail_dir(dir)).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut names = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await.map(|t| t.is_dir()).unwrap_or(true) {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if is_hidden(&name) {
            continue;
        }
        if extension_of(&name).is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str())) {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
}

/// Number of thumbnails currently present for `dir`.
pub async fn count(dir: &Path) -> Result<usize, ThumbnailError> {
    Ok(thumbnail_names(dir).await?.len())
}

/// One page of the catalog, ordered by thumbnail filename.
///
/// Pages past the end are empty. A thumbnail that cannot be read is left
/// out of the page.
pub async fn list_page(
    dir: &Path,
    page_index: usize,
    page_size: usize,
) -> Result<Vec<ThumbRecord>, ThumbnailError> {
    let names = thumbnail_names(dir).await?;
    let Some(start) = page_index.checked_mul(page_size) else {
        return Ok(Vec::new());
    };
    if start >= names.len() {
        return Ok(Vec::new());
    }
    let end = start.saturating_add(page_size).min(names.len());

    let thumbs = thumbnail_dir(dir);
    let mut records = Vec::with_capacity(end - start);
    for name in &names[start..end] {
        let bytes = match tokio::fs::read(thumbs.join(name)).await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(thumbnail = %name, "read thumbnail failed: {e}");
                continue;
            }
        };
        let id = thumbnail_id(name).to_string();
        let media = if has_video_original(dir, &id) {
            "video".to_string()
        } else {
            match extension_of(name).as_deref() {
                Some("jpeg") | None => "jpg".to_string(),
                Some(ext) => ext.to_string(),
            }
        };
        records.push(ThumbRecord {
            id,
            data: STANDARD.encode(&bytes),
            media,
        });
    }
    Ok(records)
}

fn has_video_original(dir: &Path, id: &str) -> bool {
    VIDEO_EXTENSIONS
        .iter()
        .any(|ext| dir.join(format!("{id}.{ext}")).exists())
}

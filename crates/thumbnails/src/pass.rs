//! One generation pass over a sync directory.

use std::io::Write;
use std::path::{Path, PathBuf};

use photosync_media::{
    ImageFormat, MediaKind, classify, classify_by_extension, created_marker_path, is_hidden,
    is_thumbnail_name, read_head, thumbnail_dir, thumbnail_name,
};
use tempfile::NamedTempFile;
use tokio_util::sync::CancellationToken;

use crate::render::render_thumbnail;
use crate::{ExternalTools, MAX_THUMB_WIDTH, ThumbnailError, VIDEO_FRAME_AT};

/// Outcome counters for one pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassReport {
    pub written: usize,
    /// Sources whose thumbnail already existed or that carry a marker.
    pub skipped: usize,
    pub failed: usize,
    /// The pass stopped early on cancellation.
    pub cancelled: bool,
}

enum Outcome {
    Written(PathBuf),
    Skipped,
}

/// Generates missing thumbnails for the direct entries of `dir`.
///
/// Cancellation is checked before each entry. Per-file failures are logged
/// and counted; only a failure to create or list the directories aborts the
/// pass.
pub async fn generate_pass(
    dir: &Path,
    tools: &dyn ExternalTools,
    cancel: &CancellationToken,
) -> Result<PassReport, ThumbnailError> {
    let thumbs = thumbnail_dir(dir);
    tokio::fs::create_dir_all(&thumbs).await?;

    let mut names = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await.map(|t| t.is_dir()).unwrap_or(true) {
            continue;
        }
        names.push(entry.file_name().to_string_lossy().into_owned());
    }
    names.sort();

    let mut report = PassReport::default();
    for name in names {
        if cancel.is_cancelled() {
            report.cancelled = true;
            break;
        }
        if is_hidden(&name) || is_thumbnail_name(&name) {
            continue;
        }

        let src = dir.join(&name);
        let result = match classify_by_extension(&name) {
            MediaKind::Unknown => continue,
            MediaKind::Image(_) => image_thumbnail(&src, &name, &thumbs, tools).await,
            MediaKind::Video => video_thumbnail(&src, &name, &thumbs, tools).await,
        };

        match result {
            Ok(Outcome::Written(path)) => {
                tracing::debug!(path = %path.display(), "thumbnail written");
                report.written += 1;
            }
            Ok(Outcome::Skipped) => report.skipped += 1,
            Err(e) => {
                tracing::warn!(source = %src.display(), "thumbnail failed: {e}");
                report.failed += 1;
            }
        }
    }

    Ok(report)
}

async fn image_thumbnail(
    src: &Path,
    name: &str,
    thumbs: &Path,
    tools: &dyn ExternalTools,
) -> Result<Outcome, ThumbnailError> {
    let head = read_head(src)?;
    let kind = classify(&head, name);
    let MediaKind::Image(format) = kind else {
        return Ok(Outcome::Skipped);
    };
    let Some(thumb_name) = thumbnail_name(name, kind) else {
        return Ok(Outcome::Skipped);
    };
    let dest = thumbs.join(thumb_name);
    if dest.exists() {
        return Ok(Outcome::Skipped);
    }

    // HEIC goes through an intermediate JPEG that lives until the render
    // below is done.
    let transcoded = if format == ImageFormat::Heic {
        let staged = partial_file(thumbs, ".jpg")?;
        tools.heic_to_jpeg(src, staged.path()).await?;
        Some(staged)
    } else {
        None
    };
    let decode_from = transcoded
        .as_ref()
        .map(|t| t.path().to_path_buf())
        .unwrap_or_else(|| src.to_path_buf());

    let as_png = format.keeps_png();
    let bytes =
        tokio::task::spawn_blocking(move || render_thumbnail(&decode_from, as_png)).await??;

    let mut partial = partial_file(thumbs, "")?;
    partial.write_all(&bytes)?;
    partial.persist(&dest).map_err(|e| e.error)?;
    Ok(Outcome::Written(dest))
}

async fn video_thumbnail(
    src: &Path,
    name: &str,
    thumbs: &Path,
    tools: &dyn ExternalTools,
) -> Result<Outcome, ThumbnailError> {
    if created_marker_path(src).exists() {
        tracing::debug!(video = %name, "skipping locally created video");
        return Ok(Outcome::Skipped);
    }
    let Some(thumb_name) = thumbnail_name(name, MediaKind::Video) else {
        return Ok(Outcome::Skipped);
    };
    let dest = thumbs.join(thumb_name);
    if dest.exists() {
        return Ok(Outcome::Skipped);
    }

    let partial = partial_file(thumbs, ".jpg")?;
    tools
        .extract_frame(src, VIDEO_FRAME_AT, MAX_THUMB_WIDTH, partial.path())
        .await?;
    if partial.as_file().metadata()?.len() == 0 {
        return Err(ThumbnailError::Io(std::io::Error::other(
            "frame extraction produced no output",
        )));
    }
    partial.persist(&dest).map_err(|e| e.error)?;
    Ok(Outcome::Written(dest))
}

/// Hidden staging file in the thumbnails directory; removed on drop unless
/// persisted.
fn partial_file(thumbs: &Path, suffix: &str) -> std::io::Result<NamedTempFile> {
    tempfile::Builder::new()
        .prefix(".partial-")
        .suffix(suffix)
        .tempfile_in(thumbs)
}

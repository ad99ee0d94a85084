//! Copies or transcodes originals into the encoder's working directory.

use std::path::{Path, PathBuf};
use std::time::Duration;

use photosync_media::{extension_of, read_head, sniff_is_jpeg};
use tokio::process::Command;

use crate::{SlideshowError, process};

const HEIF_CONVERT_TIMEOUT: Duration = Duration::from_secs(60);

/// Stages `originals` into `work_dir` and returns the staged paths in the
/// same order. Files that fail to copy or convert are logged and dropped.
///
/// `.heic` files that are really JPEG are copied; real HEIC goes through
/// `heif_convert`.
pub async fn stage_photos(
    originals: &[PathBuf],
    work_dir: &Path,
    heif_convert: &Path,
) -> Vec<PathBuf> {
    let mut staged = Vec::with_capacity(originals.len());
    for (i, original) in originals.iter().enumerate() {
        let name = original
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let ext = extension_of(&name).unwrap_or_else(|| "jpg".into());

        let result = if ext == "heic" {
            let jpeg_inside = read_head(original)
                .map(|head| sniff_is_jpeg(&head))
                .unwrap_or(false);
            if jpeg_inside {
                tracing::debug!(path = %original.display(), "JPEG named .heic; copying");
                copy(original, work_dir.join(format!("copied_{i}.jpg"))).await
            } else {
                convert(heif_convert, original, work_dir.join(format!("converted_{i}.jpg"))).await
            }
        } else {
            copy(original, work_dir.join(format!("photo_{i}.{ext}"))).await
        };

        match result {
            Ok(path) => staged.push(path),
            Err(e) => tracing::warn!(path = %original.display(), "skipping photo: {e}"),
        }
    }
    staged
}

async fn copy(src: &Path, dest: PathBuf) -> Result<PathBuf, SlideshowError> {
    tokio::fs::copy(src, &dest).await?;
    Ok(dest)
}

async fn convert(tool: &Path, src: &Path, dest: PathBuf) -> Result<PathBuf, SlideshowError> {
    let mut cmd = Command::new(tool);
    cmd.arg(src).arg(&dest);
    process::run(cmd, HEIF_CONVERT_TIMEOUT).await?;
    Ok(dest)
}

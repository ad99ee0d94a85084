//! Thumbnail name to original photo.

use std::path::{Path, PathBuf};

use photosync_media::{IMAGE_EXTENSIONS, thumbnail_id};

use crate::is_plain_name;

/// Finds the original photo behind a thumbnail name.
///
/// The thumbnail extension may differ from the original's (HEIC originals
/// have `.jpg` thumbnails), so every image extension is tried in order.
pub async fn original_for(phone_dir: &Path, thumb_name: &str) -> Option<PathBuf> {
    if !is_plain_name(thumb_name) {
        return None;
    }
    let base = thumbnail_id(thumb_name);
    for ext in IMAGE_EXTENSIONS {
        let candidate = phone_dir.join(format!("{base}.{ext}"));
        if tokio::fs::metadata(&candidate).await.is_ok_and(|m| m.is_file()) {
            return Some(candidate);
        }
    }
    None
}

/// Resolves every selected thumbnail, keeping selection order. Misses are
/// logged and skipped.
pub async fn resolve_originals(phone_dir: &Path, thumb_names: &[String]) -> Vec<PathBuf> {
    let mut originals = Vec::with_capacity(thumb_names.len());
    for name in thumb_names {
        match original_for(phone_dir, name).await {
            Some(path) => originals.push(path),
            None => tracing::warn!(thumbnail = %name, "original not found; skipping"),
        }
    }
    originals
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn tries_each_image_extension() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("IMG_1.heic"), b"h").unwrap();
        std::fs::write(dir.path().join("IMG_2.png"), b"p").unwrap();
        std::fs::write(dir.path().join("IMG_3.jpeg"), b"j").unwrap();

        assert_eq!(
            original_for(dir.path(), "tbn-IMG_1.jpg").await,
            Some(dir.path().join("IMG_1.heic"))
        );
        assert_eq!(
            original_for(dir.path(), "TBN-IMG_2.png").await,
            Some(dir.path().join("IMG_2.png"))
        );
        assert_eq!(
            original_for(dir.path(), "tbn-IMG_3.jpeg").await,
            Some(dir.path().join("IMG_3.jpeg"))
        );
        assert_eq!(original_for(dir.path(), "tbn-missing.jpg").await, None);
        assert_eq!(original_for(dir.path(), "../tbn-IMG_2.png").await, None);
    }

    #[tokio::test]
    async fn keeps_selection_order_and_skips_misses() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["a.jpg", "b.jpg", "c.jpg"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        let selection: Vec<String> = ["tbn-c.jpg", "tbn-x.jpg", "tbn-a.jpg"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let originals = resolve_originals(dir.path(), &selection).await;
        assert_eq!(originals, vec![dir.path().join("c.jpg"), dir.path().join("a.jpg")]);
    }
}

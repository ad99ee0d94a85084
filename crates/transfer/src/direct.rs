use std::path::{Path, PathBuf};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use photosync_protocol::FileUpload;

use crate::naming::{resolve_file_name, sanitize_media_token};
use crate::{TransferError, validate_upload_path};

/// Stores a single-shot upload under `dir` and returns the written path.
///
/// Parent directories implied by the id are created.
pub fn store_direct(dir: &Path, upload: &FileUpload) -> Result<PathBuf, TransferError> {
    if let Some(field) = upload.missing_field() {
        return Err(TransferError::MissingField(field));
    }
    validate_upload_path(&upload.id)?;

    let bytes = STANDARD.decode(upload.data.as_bytes())?;
    let ext = sanitize_media_token(&upload.media);
    let path = dir.join(resolve_file_name(&upload.id, &ext));

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&path, &bytes)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upload(id: &str, data: &[u8], media: &str) -> FileUpload {
        FileUpload {
            id: id.into(),
            data: STANDARD.encode(data),
            media: media.into(),
        }
    }

    #[test]
    fn writes_decoded_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let bytes = b"\x89PNG\0\0\0\0";
        let path = store_direct(dir.path(), &upload("img001", bytes, "png")).unwrap();
        assert_eq!(path, dir.path().join("img001.png"));
        assert_eq!(std::fs::read(&path).unwrap(), bytes);
    }

    #[test]
    fn creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = store_direct(dir.path(), &upload("2024/06/a.jpg", b"x", "JPG")).unwrap();
        assert_eq!(path, dir.path().join("2024/06/a.jpg"));
        assert!(path.is_file());
    }

    #[test]
    fn unsafe_media_token_becomes_bin() {
        let dir = tempfile::tempdir().unwrap();
        let path = store_direct(dir.path(), &upload("blob", b"x", "a/b")).unwrap();
        assert_eq!(path, dir.path().join("blob.bin"));
    }

    #[test]
    fn missing_field_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let result = store_direct(dir.path(), &upload("img", b"x", ""));
        assert!(matches!(result, Err(TransferError::MissingField("media"))));
    }

    #[test]
    fn bad_base64_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let bad = FileUpload {
            id: "img".into(),
            data: "***".into(),
            media: "jpg".into(),
        };
        assert!(matches!(
            store_direct(dir.path(), &bad),
            Err(TransferError::Base64(_))
        ));
        assert!(!dir.path().join("img.jpg").exists());
    }

    #[test]
    fn traversal_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let result = store_direct(dir.path(), &upload("../escape", b"x", "jpg"));
        assert!(matches!(result, Err(TransferError::InvalidPath(_))));
    }
}

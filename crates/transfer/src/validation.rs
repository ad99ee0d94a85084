use std::path::{Component, Path};

use crate::TransferError;

/// Validates a client-chosen id that will become a relative file path
/// under the sync directory.
///
/// Rejects empty ids, absolute paths, `..` components, drive prefixes
/// (`C:`) and backslashes on every platform, and NUL bytes.
pub fn validate_upload_path(id: &str) -> Result<(), TransferError> {
    if id.is_empty() {
        return Err(TransferError::InvalidPath("empty id".into()));
    }
    if id.contains('\0') {
        return Err(TransferError::InvalidPath(format!("NUL byte in id: {id:?}")));
    }
    if id.contains('\\') {
        return Err(TransferError::InvalidPath(format!(
            "backslash not allowed: {id}"
        )));
    }
    let bytes = id.as_bytes();
    if bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' {
        return Err(TransferError::InvalidPath(format!(
            "drive prefix not allowed: {id}"
        )));
    }

    let path = Path::new(id);
    if path.is_absolute() {
        return Err(TransferError::InvalidPath(format!(
            "absolute path not allowed: {id}"
        )));
    }

    for component in path.components() {
        match component {
            Component::ParentDir => {
                return Err(TransferError::InvalidPath(format!(
                    "parent directory traversal not allowed: {id}"
                )));
            }
            Component::Prefix(_) | Component::RootDir => {
                return Err(TransferError::InvalidPath(format!(
                    "absolute path not allowed: {id}"
                )));
            }
            Component::CurDir | Component::Normal(_) => {}
        }
    }

    Ok(())
}

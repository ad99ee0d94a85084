//! Chunked upload reassembly.
//!
//! Each transfer stages its bytes in a hidden temp file inside the
//! directory that was active when it started. Chunks are appended in
//! arrival order; the declared chunk index is echoed back but never used
//! to seek.
//!
//! Finished and aborted transfers stay in the map until the connection
//! ends, so a late chunk or a second completion for the same id is
//! reported as [`TransferError::NotOpen`] instead of looking unknown.

use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use photosync_media::{VIDEO_EXTENSIONS, extension_of, read_head, sniff_video_extension};
use photosync_protocol::{ChunkComplete, ChunkData, ChunkStart};
use tempfile::{NamedTempFile, PersistError};

use crate::naming::{DEFAULT_VIDEO_EXTENSION, resolve_file_name, sanitize_media_token};
use crate::{TransferError, validate_upload_path};

/// Lifecycle of a chunked transfer. `Finalized` and `Aborted` are terminal.
#[derive(Debug)]
pub enum TransferState {
    /// Accepting chunks; the temp file exists and is open.
    Open(NamedTempFile),
    /// Moved into place at the given path.
    Finalized(PathBuf),
    /// Dropped; the temp file is gone (or orphaned after a failed finalize).
    Aborted,
}

impl TransferState {
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open(_))
    }
}

/// Moves a finished temp file onto its destination.
type Rename = fn(NamedTempFile, &Path) -> Result<File, PersistError>;

fn rename_into_place(temp: NamedTempFile, dest: &Path) -> Result<File, PersistError> {
    temp.persist(dest)
}

/// One chunked upload.
#[derive(Debug)]
pub struct ChunkedTransfer {
    id: String,
    media: String,
    received_chunks: u64,
    owner_dir: PathBuf,
    state: TransferState,
}

/// Result of a successful finalize.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finalized {
    pub id: String,
    pub path: PathBuf,
    pub received_chunks: u64,
    /// Chunk count the client declared at completion.
    pub declared_chunks: i64,
    /// `true` when the atomic rename failed and the copy fallback was used.
    pub copied: bool,
}

impl Finalized {
    pub fn count_mismatch(&self) -> bool {
        i64::try_from(self.received_chunks).ok() != Some(self.declared_chunks)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Fresh,
    /// An open transfer with the same id was aborted first.
    Replaced,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppendOutcome {
    /// Client-declared index, echoed in the ACK.
    pub index: i64,
    /// Chunks stored so far, including this one.
    pub received: u64,
}

fn temp_tag(id: &str) -> String {
    id.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

impl ChunkedTransfer {
    fn open(dir: &Path, start: &ChunkStart) -> Result<Self, TransferError> {
        let temp = tempfile::Builder::new()
            .prefix(&format!(".chunked_{}_", temp_tag(&start.id)))
            .suffix(".tmp")
            .tempfile_in(dir)?;
        Ok(Self {
            id: start.id.clone(),
            media: start.media.clone(),
            received_chunks: 0,
            owner_dir: dir.to_path_buf(),
            state: TransferState::Open(temp),
        })
    }

    pub fn received_chunks(&self) -> u64 {
        self.received_chunks
    }

    pub fn state(&self) -> &TransferState {
        &self.state
    }

    /// Path of the staging file while open.
    pub fn temp_path(&self) -> Option<&Path> {
        match &self.state {
            TransferState::Open(temp) => Some(temp.path()),
            _ => None,
        }
    }

    /// Appends `bytes`; a write failure moves the transfer to `Aborted`.
    fn append(&mut self, bytes: &[u8]) -> Result<u64, TransferError> {
        let TransferState::Open(temp) = &mut self.state else {
            return Err(TransferError::NotOpen(self.id.clone()));
        };
        if let Err(e) = temp.write_all(bytes) {
            self.state = TransferState::Aborted;
            return Err(e.into());
        }
        self.received_chunks += 1;
        Ok(self.received_chunks)
    }

    /// Returns `false` if the transfer was already terminal.
    fn abort(&mut self) -> bool {
        match self.state {
            TransferState::Open(_) => {
                self.state = TransferState::Aborted;
                true
            }
            TransferState::Finalized(_) | TransferState::Aborted => false,
        }
    }

    /// The id's own video extension, then the start media token, then the
    /// sniffed container, then mp4.
    fn final_extension(&self, staged: &Path) -> String {
        if let Some(ext) = extension_of(&self.id) {
            if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
                return ext;
            }
        }
        if !self.media.trim().is_empty() {
            return sanitize_media_token(&self.media);
        }
        read_head(staged)
            .ok()
            .and_then(|head| sniff_video_extension(&head))
            .unwrap_or(DEFAULT_VIDEO_EXTENSION)
            .to_string()
    }

    fn finalize(
        &mut self,
        declared_chunks: i64,
        rename: Rename,
    ) -> Result<Finalized, TransferError> {
        let temp = match std::mem::replace(&mut self.state, TransferState::Aborted) {
            TransferState::Open(temp) => temp,
            terminal => {
                self.state = terminal;
                return Err(TransferError::NotOpen(self.id.clone()));
            }
        };

        let ext = self.final_extension(temp.path());
        let dest = self.owner_dir.join(resolve_file_name(&self.id, &ext));

        match place(temp, &dest, rename) {
            Ok(copied) => {
                self.state = TransferState::Finalized(dest.clone());
                Ok(Finalized {
                    id: self.id.clone(),
                    path: dest,
                    received_chunks: self.received_chunks,
                    declared_chunks,
                    copied,
                })
            }
            Err((source, temp)) => {
                let orphan = match temp.keep() {
                    Ok((_, path)) => path,
                    Err(err) => err.file.path().to_path_buf(),
                };
                Err(TransferError::Finalize {
                    id: self.id.clone(),
                    orphan,
                    source,
                })
            }
        }
    }
}

/// Renames `temp` onto `dest`, falling back to copy-then-delete.
///
/// Returns whether the fallback was used. On failure the temp file is
/// handed back untouched.
fn place(
    temp: NamedTempFile,
    dest: &Path,
    rename: Rename,
) -> Result<bool, (std::io::Error, NamedTempFile)> {
    if let Some(parent) = dest.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            return Err((e, temp));
        }
    }
    match rename(temp, dest) {
        Ok(_) => Ok(false),
        Err(err) => {
            tracing::debug!(dest = %dest.display(), "rename failed, copying: {}", err.error);
            let temp = err.file;
            match std::fs::copy(temp.path(), dest) {
                // Dropping `temp` deletes the staging file.
                Ok(_) => Ok(true),
                Err(e) => Err((e, temp)),
            }
        }
    }
}

/// Per-connection map of chunked transfers, open and terminal.
#[derive(Debug)]
pub struct Reassembler {
    transfers: HashMap<String, ChunkedTransfer>,
    rename: Rename,
}

impl Default for Reassembler {
    fn default() -> Self {
        Self {
            transfers: HashMap::new(),
            rename: rename_into_place,
        }
    }
}

impl Reassembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a transfer staged in `dir`. A terminal transfer with the same
    /// id is replaced silently; an open one is aborted first.
    pub fn start(&mut self, dir: &Path, start: &ChunkStart) -> Result<StartOutcome, TransferError> {
        validate_upload_path(&start.id)?;

        let replaced = self
            .transfers
            .remove(&start.id)
            .is_some_and(|mut previous| previous.abort());
        let outcome = if replaced {
            StartOutcome::Replaced
        } else {
            StartOutcome::Fresh
        };

        let transfer = ChunkedTransfer::open(dir, start)?;
        self.transfers.insert(start.id.clone(), transfer);
        Ok(outcome)
    }

    /// Decodes and appends one chunk.
    ///
    /// A decode failure leaves the transfer open and uncounted. A write
    /// failure aborts the transfer.
    pub fn append(&mut self, chunk: &ChunkData) -> Result<AppendOutcome, TransferError> {
        let Some(transfer) = self.transfers.get_mut(&chunk.id) else {
            return Err(TransferError::UnknownTransfer(chunk.id.clone()));
        };
        if !transfer.state.is_open() {
            return Err(TransferError::NotOpen(chunk.id.clone()));
        }

        let bytes = STANDARD.decode(chunk.data.as_bytes())?;
        let received = transfer.append(&bytes)?;
        Ok(AppendOutcome {
            index: chunk.chunk_index,
            received,
        })
    }

    /// Moves the staged bytes into place. The transfer ends `Finalized`, or
    /// `Aborted` when both rename and copy fail.
    pub fn complete(&mut self, complete: &ChunkComplete) -> Result<Finalized, TransferError> {
        let Some(transfer) = self.transfers.get_mut(&complete.id) else {
            return Err(TransferError::UnknownTransfer(complete.id.clone()));
        };
        transfer.finalize(complete.total_chunks, self.rename)
    }

    /// Aborts one open transfer. Returns `false` if the id was not open.
    pub fn abort(&mut self, id: &str) -> bool {
        self.transfers.get_mut(id).is_some_and(ChunkedTransfer::abort)
    }

    /// Aborts every open transfer, forgets all of them, and returns the ids
    /// that were still open.
    pub fn abort_all(&mut self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .transfers
            .drain()
            .filter_map(|(id, mut transfer)| transfer.abort().then_some(id))
            .collect();
        ids.sort();
        ids
    }

    pub fn get(&self, id: &str) -> Option<&ChunkedTransfer> {
        self.transfers.get(id)
    }

    /// Transfers still accepting chunks.
    pub fn open_count(&self) -> usize {
        self.transfers.values().filter(|t| t.state.is_open()).count()
    }
}

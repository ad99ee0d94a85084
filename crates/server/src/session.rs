//! One phone connection.
//!
//! A session owns the active directory cursor and the connection's open
//! chunked transfers. Frames are handled in arrival order; a handler that
//! rejects a message logs it and withholds the ACK, which is the client's
//! signal to retry. Only framing errors, an invalid phone name and failed
//! writes end the connection.

use std::path::PathBuf;

use photosync_protocol::messages::ack;
use photosync_protocol::{
    ChunkComplete, ChunkData, ChunkStart, FileUpload, MessageType, ThumbListRequest,
    ThumbListResponse, read_header, read_payload, write_frame,
};
use photosync_thumbnails::ThumbnailCoordinator;
use photosync_transfer::{
    Reassembler, StartOutcome, TransferError, store_direct, validate_upload_path,
};
use serde::de::DeserializeOwned;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::sync::CancellationToken;

use crate::{ServerConfig, ServerError};

/// Whether the read loop keeps going after a message.
enum Flow {
    Continue,
    End,
}

/// Per-connection state.
pub struct Session {
    base_dir: PathBuf,
    active_dir: PathBuf,
    phone_name: Option<String>,
    sync_completed: bool,
    max_payload: usize,
    reassembler: Reassembler,
    coordinator: ThumbnailCoordinator,
}

impl Session {
    pub fn new(config: &ServerConfig, coordinator: ThumbnailCoordinator) -> Self {
        Self {
            base_dir: config.receive_dir.clone(),
            active_dir: config.receive_dir.clone(),
            phone_name: None,
            sync_completed: false,
            max_payload: config.max_payload,
            reassembler: Reassembler::new(),
            coordinator,
        }
    }

    /// Serves frames until the peer closes, sends SyncComplete, breaks the
    /// protocol, or `cancel` fires. Teardown runs in every case.
    pub async fn run<S>(
        mut self,
        mut stream: S,
        cancel: CancellationToken,
    ) -> Result<(), ServerError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let result = self.serve(&mut stream, &cancel).await;
        self.teardown();
        result
    }

    async fn serve<S>(
        &mut self,
        stream: &mut S,
        cancel: &CancellationToken,
    ) -> Result<(), ServerError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        loop {
            let header = tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::debug!("session cancelled");
                    return Ok(());
                }
                header = read_header(stream) => header?,
            };
            let Some(header) = header else {
                tracing::debug!("peer closed the connection");
                return Ok(());
            };

            let Some(msg_type) = MessageType::from_u8(header.msg_type) else {
                return Err(ServerError::UnexpectedMessage(header.msg_type));
            };
            if !msg_type.is_request() {
                return Err(ServerError::UnexpectedMessage(header.msg_type));
            }
            header.check_len(self.max_payload)?;

            let payload = read_payload(stream, header.payload_len()).await?;
            tracing::debug!(%msg_type, len = payload.len(), "frame received");

            if let Flow::End = self.dispatch(stream, msg_type, &payload).await? {
                return Ok(());
            }
        }
    }

    async fn dispatch<S>(
        &mut self,
        stream: &mut S,
        msg_type: MessageType,
        payload: &[u8],
    ) -> Result<Flow, ServerError>
    where
        S: AsyncWrite + Unpin,
    {
        match msg_type {
            MessageType::ImageData | MessageType::VideoData => {
                self.on_upload(stream, msg_type, payload).await?;
            }
            MessageType::SyncComplete => {
                self.on_sync_complete();
                return Ok(Flow::End);
            }
            MessageType::SetPhoneName => self.on_phone_name(payload).await?,
            MessageType::GetMediaCount => self.on_media_count(stream).await?,
            MessageType::MediaThumbList => self.on_thumb_list(stream, payload).await?,
            MessageType::ChunkedVideoStart => self.on_chunk_start(stream, payload).await?,
            MessageType::ChunkedVideoData => self.on_chunk_data(stream, payload).await?,
            MessageType::ChunkedVideoComplete => self.on_chunk_complete(stream, payload).await?,
            MessageType::MediaCountResponse | MessageType::MediaThumbData => {
                return Err(ServerError::UnexpectedMessage(msg_type.as_u8()));
            }
        }
        Ok(Flow::Continue)
    }

    async fn on_upload<S>(
        &mut self,
        stream: &mut S,
        msg_type: MessageType,
        payload: &[u8],
    ) -> Result<(), ServerError>
    where
        S: AsyncWrite + Unpin,
    {
        let Some(upload) = parse::<FileUpload>(msg_type, payload) else {
            return Ok(());
        };
        let id = upload.id.clone();
        let dir = self.active_dir.clone();

        let stored = tokio::task::spawn_blocking(move || store_direct(&dir, &upload)).await;
        match stored {
            Ok(Ok(path)) => {
                tracing::info!(%id, path = %path.display(), %msg_type, "saved upload");
                send_ack(stream, &ack::saved(&id)).await?;
            }
            Ok(Err(e)) => tracing::warn!(%id, "upload rejected: {e}"),
            Err(e) => tracing::error!(%id, "upload task failed: {e}"),
        }
        Ok(())
    }

    fn on_sync_complete(&mut self) {
        tracing::info!(dir = %self.active_dir.display(), "sync complete");
        self.sync_completed = true;
        self.coordinator.request_generate(self.active_dir.clone());
    }

    async fn on_phone_name(&mut self, payload: &[u8]) -> Result<(), ServerError> {
        if payload.is_empty() {
            tracing::warn!("empty phone name, ignored");
            return Ok(());
        }

        // A new sync preempts whatever pass is running.
        self.coordinator.cancel_current();

        let name = std::str::from_utf8(payload)
            .map_err(|_| ServerError::InvalidPhoneName(String::from_utf8_lossy(payload).into()))?;
        validate_upload_path(name).map_err(|e| ServerError::InvalidPhoneName(e.to_string()))?;

        let dir = self.base_dir.join(name);
        tokio::fs::create_dir_all(&dir).await?;
        tracing::info!(phone = %name, dir = %dir.display(), "phone name set");

        self.active_dir = dir;
        self.phone_name = Some(name.to_string());
        Ok(())
    }

    async fn on_media_count<S>(&mut self, stream: &mut S) -> Result<(), ServerError>
    where
        S: AsyncWrite + Unpin,
    {
        let count = match self.coordinator.count(&self.active_dir).await {
            Ok(count) => count,
            Err(e) => {
                tracing::warn!(dir = %self.active_dir.display(), "count failed: {e}");
                0
            }
        };
        let count = u32::try_from(count).unwrap_or(u32::MAX);
        tracing::debug!(count, "media count");
        write_frame(stream, MessageType::MediaCountResponse.as_u8(), &count.to_be_bytes()).await?;
        Ok(())
    }

    async fn on_thumb_list<S>(&mut self, stream: &mut S, payload: &[u8]) -> Result<(), ServerError>
    where
        S: AsyncWrite + Unpin,
    {
        let request = ThumbListRequest::parse(payload).unwrap_or_else(|e| {
            tracing::warn!("malformed thumbnail list request, using defaults: {e}");
            ThumbListRequest::default()
        });
        let (page_index, page_size) = request.normalized();

        let photos = match self
            .coordinator
            .list_page(&self.active_dir, page_index, page_size)
            .await
        {
            Ok(photos) => photos,
            Err(e) => {
                tracing::warn!(dir = %self.active_dir.display(), "listing failed: {e}");
                Vec::new()
            }
        };
        tracing::debug!(page_index, page_size, returned = photos.len(), "thumbnail page");

        let body = serde_json::to_vec(&ThumbListResponse { photos })?;
        write_frame(stream, MessageType::MediaThumbData.as_u8(), &body).await?;
        Ok(())
    }

    async fn on_chunk_start<S>(&mut self, stream: &mut S, payload: &[u8]) -> Result<(), ServerError>
    where
        S: AsyncWrite + Unpin,
    {
        let Some(start) = parse::<ChunkStart>(MessageType::ChunkedVideoStart, payload) else {
            return Ok(());
        };
        match self.reassembler.start(&self.active_dir, &start) {
            Ok(outcome) => {
                if outcome == StartOutcome::Replaced {
                    tracing::warn!(id = %start.id, "restart of open transfer; previous bytes discarded");
                }
                tracing::info!(
                    id = %start.id,
                    total_size = start.total_size,
                    chunk_size = start.chunk_size,
                    total_chunks = start.total_chunks,
                    "chunked transfer started"
                );
                send_ack(stream, ack::START).await?;
            }
            Err(e) => tracing::warn!(id = %start.id, "chunked start rejected: {e}"),
        }
        Ok(())
    }

    async fn on_chunk_data<S>(&mut self, stream: &mut S, payload: &[u8]) -> Result<(), ServerError>
    where
        S: AsyncWrite + Unpin,
    {
        let Some(chunk) = parse::<ChunkData>(MessageType::ChunkedVideoData, payload) else {
            return Ok(());
        };
        match self.reassembler.append(&chunk) {
            Ok(outcome) => {
                tracing::debug!(
                    id = %chunk.id,
                    index = outcome.index,
                    received = outcome.received,
                    "chunk stored"
                );
                send_ack(stream, &ack::chunk(outcome.index)).await?;
            }
            Err(TransferError::UnknownTransfer(id)) => {
                tracing::warn!(%id, index = chunk.chunk_index, "chunk for unknown transfer");
            }
            Err(e) => tracing::warn!(id = %chunk.id, index = chunk.chunk_index, "chunk dropped: {e}"),
        }
        Ok(())
    }

    async fn on_chunk_complete<S>(&mut self, stream: &mut S, payload: &[u8]) -> Result<(), ServerError>
    where
        S: AsyncWrite + Unpin,
    {
        let Some(complete) = parse::<ChunkComplete>(MessageType::ChunkedVideoComplete, payload)
        else {
            return Ok(());
        };
        match self.reassembler.complete(&complete) {
            Ok(done) => {
                if done.count_mismatch() {
                    tracing::warn!(
                        id = %done.id,
                        received = done.received_chunks,
                        declared = done.declared_chunks,
                        "chunk count mismatch"
                    );
                }
                tracing::info!(
                    id = %done.id,
                    path = %done.path.display(),
                    chunks = done.received_chunks,
                    copied = done.copied,
                    "saved chunked video"
                );
                send_ack(stream, &ack::saved(&done.id)).await?;
            }
            Err(TransferError::UnknownTransfer(id)) => {
                tracing::warn!(%id, "complete for unknown transfer");
            }
            Err(e @ TransferError::Finalize { .. }) => tracing::error!("{e}"),
            Err(e) => tracing::warn!(id = %complete.id, "complete rejected: {e}"),
        }
        Ok(())
    }

    fn teardown(&mut self) {
        let aborted = self.reassembler.abort_all();
        if !aborted.is_empty() {
            tracing::warn!(?aborted, "aborted unfinished chunked transfers");
        }
        if self.phone_name.is_some() && !self.sync_completed {
            self.coordinator.request_generate(self.active_dir.clone());
        }
    }
}

/// Parses a JSON payload, logging and returning `None` on failure.
fn parse<T: DeserializeOwned>(msg_type: MessageType, payload: &[u8]) -> Option<T> {
    match serde_json::from_slice(payload) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(%msg_type, "malformed payload: {e}");
            None
        }
    }
}

async fn send_ack<S: AsyncWrite + Unpin>(stream: &mut S, body: &str) -> Result<(), ServerError> {
    write_frame(stream, MessageType::ACK, body.as_bytes()).await?;
    Ok(())
}

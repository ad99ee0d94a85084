//! Listener that spawns one session per connection.

use std::net::SocketAddr;
use std::sync::Arc;

use photosync_thumbnails::ThumbnailCoordinator;
use tokio::io::BufReader;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::{ServerConfig, ServerError, Session};

/// Read buffer per connection; frame headers are 5 bytes so most reads
/// are served from the buffer.
const READ_BUFFER_SIZE: usize = 256 * 1024;

/// The PhotoSync TCP server.
pub struct SyncServer {
    listener: TcpListener,
    config: Arc<ServerConfig>,
    coordinator: ThumbnailCoordinator,
}

impl SyncServer {
    /// Binds the listener and creates the receive directory.
    pub async fn bind(
        addr: SocketAddr,
        config: ServerConfig,
        coordinator: ThumbnailCoordinator,
    ) -> Result<Self, ServerError> {
        tokio::fs::create_dir_all(&config.receive_dir).await?;
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            listener,
            config: Arc::new(config),
            coordinator,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    /// Accepts connections until `cancel` fires. Open sessions see the
    /// same token and tear down at their next frame boundary.
    pub async fn run(self, cancel: CancellationToken) -> Result<(), ServerError> {
        tracing::info!(
            addr = %self.local_addr()?,
            receive_dir = %self.config.receive_dir.display(),
            "sync server listening"
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("sync server shutting down");
                    break Ok(());
                }

                result = self.listener.accept() => {
                    match result {
                        Ok((stream, peer_addr)) => {
                            tracing::info!(%peer_addr, "connection accepted");
                            if let Err(e) = stream.set_nodelay(true) {
                                tracing::debug!(%peer_addr, "set_nodelay failed: {e}");
                            }
                            let session = Session::new(&self.config, self.coordinator.clone());
                            let stream = BufReader::with_capacity(READ_BUFFER_SIZE, stream);
                            let cancel = cancel.clone();
                            tokio::spawn(
                                async move {
                                    match session.run(stream, cancel).await {
                                        Ok(()) => tracing::info!("connection closed"),
                                        Err(e) => tracing::warn!("connection closed: {e}"),
                                    }
                                }
                                .instrument(tracing::info_span!("session", %peer_addr)),
                            );
                        }
                        Err(e) => {
                            tracing::error!("accept error: {e}");
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::time::Duration;

    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use photosync_protocol::{MessageType, read_header, read_payload, write_frame};
    use photosync_thumbnails::{ExternalTools, ThumbnailError, ToolFuture};
    use tokio::net::TcpStream;

    use super::*;

    struct NoTools;

    impl ExternalTools for NoTools {
        fn heic_to_jpeg<'a>(&'a self, _src: &'a Path, _dest: &'a Path) -> ToolFuture<'a> {
            Box::pin(async { Err(ThumbnailError::ToolMissing("magick".into())) })
        }

        fn extract_frame<'a>(
            &'a self,
            _src: &'a Path,
            _at: Duration,
            _width: u32,
            _dest: &'a Path,
        ) -> ToolFuture<'a> {
            Box::pin(async { Err(ThumbnailError::ToolMissing("ffmpeg".into())) })
        }
    }

    async fn ack(stream: &mut TcpStream) -> String {
        let header = read_header(stream).await.unwrap().unwrap();
        assert_eq!(header.msg_type, MessageType::ACK);
        let payload = read_payload(stream, header.payload_len()).await.unwrap();
        String::from_utf8(payload).unwrap()
    }

    #[tokio::test]
    async fn serves_concurrent_connections_over_tcp() {
        let dir = tempfile::tempdir().unwrap();
        let receive_dir = dir.path().join("received");
        let cancel = CancellationToken::new();
        let (coordinator, _worker) = ThumbnailCoordinator::spawn(Arc::new(NoTools), cancel.clone());

        let config = ServerConfig {
            receive_dir: receive_dir.clone(),
            ..ServerConfig::default()
        };
        let server = SyncServer::bind("127.0.0.1:0".parse().unwrap(), config, coordinator)
            .await
            .unwrap();
        assert!(receive_dir.is_dir());
        let addr = server.local_addr().unwrap();
        let server_task = tokio::spawn(server.run(cancel.clone()));

        let mut phones = Vec::new();
        for phone in ["alpha", "beta"] {
            let mut stream = TcpStream::connect(addr).await.unwrap();
            write_frame(&mut stream, MessageType::SetPhoneName.as_u8(), phone.as_bytes())
                .await
                .unwrap();
            phones.push((phone, stream));
        }
        for (phone, stream) in &mut phones {
            let body = format!(
                r#"{{"id":"{phone}-1","data":"{}","media":"jpg"}}"#,
                STANDARD.encode(phone.as_bytes())
            );
            write_frame(stream, MessageType::ImageData.as_u8(), body.as_bytes())
                .await
                .unwrap();
            assert_eq!(ack(stream).await, format!("OK:{phone}-1"));
        }

        for (phone, _) in &phones {
            let stored = receive_dir.join(phone).join(format!("{phone}-1.jpg"));
            assert_eq!(std::fs::read(stored).unwrap(), phone.as_bytes());
        }

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(5), server_task)
            .await
            .expect("server did not stop")
            .unwrap()
            .unwrap();
    }
}

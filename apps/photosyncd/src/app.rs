//! Daemon wiring: thumbnail coordinator, TCP sync server and discovery
//! responder sharing one shutdown token.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use photosync_discovery::{DiscoveryResponder, default_network_info, get_local_ips};
use photosync_server::SyncServer;
use photosync_thumbnails::{SystemTools, ThumbnailCoordinator};
use tokio_util::sync::CancellationToken;

use crate::config::DaemonConfig;

/// Runs until Ctrl-C or until the sync server fails.
pub async fn run(config: DaemonConfig) -> anyhow::Result<()> {
    let shutdown = CancellationToken::new();

    let tools = Arc::new(SystemTools::new(config.ffmpeg.clone()));
    let (coordinator, worker) = ThumbnailCoordinator::spawn(tools, shutdown.clone());

    let tcp_addr = SocketAddr::from(([0, 0, 0, 0], config.tcp_port));
    let server = SyncServer::bind(tcp_addr, config.server_config(), coordinator)
        .await
        .with_context(|| format!("failed to start sync server on {tcp_addr}"))?;

    let discovery = start_discovery(&config).await;

    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    tracing::info!("interrupt received, shutting down");
                    shutdown.cancel();
                }
                Err(e) => tracing::error!("failed to listen for ctrl-c: {e}"),
            }
        }
    });

    let server_task = tokio::spawn(server.run(shutdown.clone()));
    let discovery_task = discovery.map(|responder| tokio::spawn(responder.run(shutdown.clone())));

    let result = server_task.await.context("sync server task failed")?;
    shutdown.cancel();

    if let Some(task) = discovery_task {
        match task.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!("discovery responder stopped: {e}"),
            Err(e) => tracing::warn!("discovery task failed: {e}"),
        }
    }
    if let Err(e) = worker.await {
        tracing::warn!("thumbnail worker failed: {e}");
    }

    result.context("sync server stopped")?;
    tracing::info!("shutdown complete");
    Ok(())
}

/// Binds the discovery responder. Discovery is optional: failures are
/// logged and the daemon keeps serving known clients.
async fn start_discovery(config: &DaemonConfig) -> Option<DiscoveryResponder> {
    let network = match default_network_info() {
        Ok(network) => network,
        Err(e) => {
            tracing::warn!("discovery disabled: {e}");
            return None;
        }
    };
    tracing::info!(ip = %network.ip, local_ips = ?get_local_ips(), "announcing on network");

    let addr = SocketAddr::from(([0, 0, 0, 0], config.udp_port));
    match DiscoveryResponder::bind(addr, config.server_name.clone(), network).await {
        Ok(responder) => Some(responder),
        Err(e) => {
            tracing::warn!(%addr, "discovery disabled: {e}");
            None
        }
    }
}

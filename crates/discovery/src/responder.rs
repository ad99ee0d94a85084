use std::net::{Ipv4Addr, SocketAddr};

use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;

use crate::{DiscoveryError, NetworkInfo};

/// Question phones broadcast to find a server (surrounding whitespace ignored).
pub const DISCOVERY_REQUEST: &str = "who is photo server?";

const MAX_DATAGRAM: usize = 1024;

/// What to send back for a datagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Announce the server to the asker and the subnet.
    Announce(String),
    /// Return the datagram unchanged to its sender.
    Echo,
}

/// `photo_server:<name>,IP:<ip>`.
pub fn announcement(name: &str, ip: Ipv4Addr) -> String {
    format!("photo_server:{name},IP:{ip}")
}

pub fn reply_for(datagram: &[u8], name: &str, ip: Ipv4Addr) -> Reply {
    match std::str::from_utf8(datagram) {
        Ok(text) if text.trim() == DISCOVERY_REQUEST => Reply::Announce(announcement(name, ip)),
        _ => Reply::Echo,
    }
}

/// UDP responder answering discovery requests.
pub struct DiscoveryResponder {
    socket: UdpSocket,
    name: String,
    network: NetworkInfo,
}

impl DiscoveryResponder {
    /// Binds the responder socket with broadcast enabled.
    pub async fn bind(
        addr: SocketAddr,
        name: impl Into<String>,
        network: NetworkInfo,
    ) -> Result<Self, DiscoveryError> {
        let socket = UdpSocket::bind(addr).await?;
        socket.set_broadcast(true)?;
        Ok(Self {
            socket,
            name: name.into(),
            network,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, DiscoveryError> {
        Ok(self.socket.local_addr()?)
    }

    /// Serves datagrams until `cancel` fires. Receive and send errors are
    /// logged and never end the loop.
    pub async fn run(self, cancel: CancellationToken) -> Result<(), DiscoveryError> {
        tracing::info!(
            addr = %self.local_addr()?,
            ip = %self.network.ip,
            broadcast = %self.network.broadcast,
            "discovery responder listening"
        );

        let mut buf = vec![0u8; MAX_DATAGRAM];
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("discovery responder stopped");
                    return Ok(());
                }
                result = self.socket.recv_from(&mut buf) => {
                    match result {
                        Ok((n, peer)) => self.respond(&buf[..n], peer).await,
                        Err(e) => tracing::warn!("discovery receive failed: {e}"),
                    }
                }
            }
        }
    }

    async fn respond(&self, datagram: &[u8], peer: SocketAddr) {
        match reply_for(datagram, &self.name, self.network.ip) {
            Reply::Announce(text) => {
                tracing::info!(%peer, "discovery request");
                if let Err(e) = self.socket.send_to(text.as_bytes(), peer).await {
                    tracing::warn!(%peer, "discovery reply failed: {e}");
                }
                let broadcast = SocketAddr::new(self.network.broadcast.into(), peer.port());
                if let Err(e) = self.socket.send_to(text.as_bytes(), broadcast).await {
                    tracing::warn!(%broadcast, "discovery broadcast failed: {e}");
                }
            }
            Reply::Echo => {
                tracing::debug!(%peer, len = datagram.len(), "echoing datagram");
                if let Err(e) = self.socket.send_to(datagram, peer).await {
                    tracing::warn!(%peer, "echo failed: {e}");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn question_gets_announcement() {
        let ip = Ipv4Addr::new(192, 168, 1, 20);
        assert_eq!(
            reply_for(b"who is photo server?", "den", ip),
            Reply::Announce("photo_server:den,IP:192.168.1.20".into())
        );
        assert_eq!(
            reply_for(b"  who is photo server?\n", "den", ip),
            Reply::Announce("photo_server:den,IP:192.168.1.20".into())
        );
    }

    #[test]
    fn anything_else_is_echoed() {
        let ip = Ipv4Addr::new(10, 0, 0, 1);
        assert_eq!(reply_for(b"hello", "den", ip), Reply::Echo);
        assert_eq!(reply_for(b"WHO IS PHOTO SERVER?", "den", ip), Reply::Echo);
        assert_eq!(reply_for(&[0xFF, 0xFE], "den", ip), Reply::Echo);
    }

    async fn start_responder() -> (SocketAddr, CancellationToken) {
        // Loopback stands in for the subnet broadcast address.
        let network = NetworkInfo {
            ip: Ipv4Addr::new(192, 168, 1, 20),
            broadcast: Ipv4Addr::LOCALHOST,
        };
        let responder = DiscoveryResponder::bind("127.0.0.1:0".parse().unwrap(), "den", network)
            .await
            .unwrap();
        let addr = responder.local_addr().unwrap();
        let cancel = CancellationToken::new();
        tokio::spawn(responder.run(cancel.clone()));
        (addr, cancel)
    }

    async fn recv(client: &UdpSocket) -> String {
        let mut buf = [0u8; 256];
        let (n, _) = tokio::time::timeout(Duration::from_secs(2), client.recv_from(&mut buf))
            .await
            .expect("reply timed out")
            .unwrap();
        String::from_utf8_lossy(&buf[..n]).into_owned()
    }

    #[tokio::test]
    async fn announces_to_requester_and_broadcast() {
        let (addr, cancel) = start_responder().await;
        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        client.send_to(b"who is photo server?", addr).await.unwrap();

        assert_eq!(recv(&client).await, "photo_server:den,IP:192.168.1.20");
        // Second copy arrives via the broadcast address on the asker's port.
        assert_eq!(recv(&client).await, "photo_server:den,IP:192.168.1.20");
        cancel.cancel();
    }

    #[tokio::test]
    async fn echoes_other_datagrams() {
        let (addr, cancel) = start_responder().await;
        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        client.send_to(b"ping 42", addr).await.unwrap();
        assert_eq!(recv(&client).await, "ping 42");
        cancel.cancel();
    }
}

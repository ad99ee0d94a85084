//! LAN discovery for PhotoSync servers.
//!
//! Phones broadcast a fixed question over UDP; the server answers with its
//! name and IPv4 address, both to the asker and to the subnet broadcast
//! address. Anything else is echoed back.

pub mod network;
pub mod responder;

// Re-export primary types.
pub use network::{NetworkInfo, default_network_info, get_hostname, get_local_ips};
pub use responder::{DISCOVERY_REQUEST, DiscoveryResponder, Reply, announcement, reply_for};

/// Errors for discovery operations.
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("network error: {0}")]
    Network(String),
}

use std::net::{IpAddr, Ipv4Addr, UdpSocket};

use if_addrs::IfAddr;

use crate::DiscoveryError;

/// Address the server announces and the broadcast address of its subnet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkInfo {
    pub ip: Ipv4Addr,
    pub broadcast: Ipv4Addr,
}

/// Directed broadcast address for `ip` under `netmask`.
pub fn broadcast_for(ip: Ipv4Addr, netmask: Ipv4Addr) -> Ipv4Addr {
    Ipv4Addr::from(u32::from(ip) | !u32::from(netmask))
}

fn usable(ip: Ipv4Addr) -> bool {
    !ip.is_loopback() && !ip.is_link_local() && !ip.is_unspecified()
}

/// Source address the OS would use for the default route.
///
/// Connecting a UDP socket sends nothing; it only selects a route.
fn default_route_ipv4() -> Option<Ipv4Addr> {
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).ok()?;
    socket.connect((Ipv4Addr::new(8, 8, 8, 8), 80)).ok()?;
    match socket.local_addr().ok()?.ip() {
        IpAddr::V4(ip) if usable(ip) => Some(ip),
        _ => None,
    }
}

/// Picks the candidate matching `preferred`, else the first one.
pub fn pick_network(candidates: &[NetworkInfo], preferred: Option<Ipv4Addr>) -> Option<NetworkInfo> {
    preferred
        .and_then(|ip| candidates.iter().find(|c| c.ip == ip))
        .or_else(|| candidates.first())
        .copied()
}

/// Resolves the interface the server should announce.
///
/// Prefers the interface carrying the default route, then the first
/// non-loopback, non-link-local IPv4 interface.
pub fn default_network_info() -> Result<NetworkInfo, DiscoveryError> {
    let interfaces = if_addrs::get_if_addrs()
        .map_err(|e| DiscoveryError::Network(format!("failed to list interfaces: {e}")))?;

    let candidates: Vec<NetworkInfo> = interfaces
        .iter()
        .filter(|iface| !iface.is_loopback())
        .filter_map(|iface| match &iface.addr {
            IfAddr::V4(v4) if usable(v4.ip) => Some(NetworkInfo {
                ip: v4.ip,
                broadcast: v4
                    .broadcast
                    .unwrap_or_else(|| broadcast_for(v4.ip, v4.netmask)),
            }),
            _ => None,
        })
        .collect();

    pick_network(&candidates, default_route_ipv4())
        .ok_or_else(|| DiscoveryError::Network("no usable IPv4 interface found".into()))
}

/// Returns local non-loopback IPv4 addresses, excluding link-local (169.254.x.x).
pub fn get_local_ips() -> Vec<IpAddr> {
    let Ok(interfaces) = if_addrs::get_if_addrs() else {
        return Vec::new();
    };

    interfaces
        .iter()
        .filter(|iface| !iface.is_loopback())
        .filter_map(|iface| match iface.ip() {
            IpAddr::V4(ip) if usable(ip) => Some(IpAddr::V4(ip)),
            _ => None,
        })
        .collect()
}

/// Returns the local hostname, or `photosync` when it cannot be read.
pub fn get_hostname() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .map(|h| h.trim_end_matches('.').to_string())
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| "photosync".into())
}

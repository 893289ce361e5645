//! SSDP multicast probing.
//!
//! One `M-SEARCH` per usable interface to 239.255.255.250:1900, then a fixed
//! listen window on the same sockets (speakers reply unicast to the sender's
//! port). The window always runs to its deadline: late responders are the
//! common case on busy Wi-Fi.

use std::io::ErrorKind;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use local_ip_address::list_afinet_netifas;
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tokio::time::{timeout, Instant};

use super::types::{is_virtual_interface, normalize_uuid, DiscoveryError, SsdpCandidate};
use crate::protocol_constants::{
    SSDP_MULTICAST_ADDR, SSDP_MULTICAST_TTL, SSDP_PORT, SSDP_RECV_BUFFER_SIZE, SSDP_SEARCH_TARGET,
};
use crate::sonos::utils::host_from_location;

// ─────────────────────────────────────────────────────────────────────────────
// ASCII Case-Insensitive Helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Returns the value of header `name` (ASCII case-insensitive) in an SSDP message.
fn header_value<'a>(message: &'a str, name: &str) -> Option<&'a str> {
    message.lines().skip(1).find_map(|line| {
        let (key, value) = line.split_once(':')?;
        key.trim()
            .eq_ignore_ascii_case(name)
            .then(|| value.trim())
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Messages
// ─────────────────────────────────────────────────────────────────────────────

/// Builds the M-SEARCH request.
pub fn build_msearch_message(mx: u64) -> String {
    format!(
        "M-SEARCH * HTTP/1.1\r\n\
         HOST: {}:{}\r\n\
         MAN: \"ssdp:discover\"\r\n\
         MX: {}\r\n\
         ST: {}\r\n\r\n",
        SSDP_MULTICAST_ADDR, SSDP_PORT, mx, SSDP_SEARCH_TARGET
    )
}

/// Parses an M-SEARCH response into a candidate.
///
/// Returns `None` for anything that is not a `200 OK` with an http(s)
/// `LOCATION` header.
pub fn parse_ssdp_response(response: &str, src_ip: &str) -> Option<SsdpCandidate> {
    let status = response.lines().next()?.trim();
    if !status.starts_with("HTTP/") || !status.contains(" 200") {
        return None;
    }

    let location = header_value(response, "location")?;
    host_from_location(location)?;

    let usn_uuid = header_value(response, "usn")
        .map(normalize_uuid)
        .filter(|id| !id.is_empty());

    Some(SsdpCandidate {
        ip: src_ip.to_string(),
        location: location.to_string(),
        usn_uuid,
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Sockets
// ─────────────────────────────────────────────────────────────────────────────

/// Network interface used for probing.
#[derive(Debug, Clone)]
pub struct InterfaceInfo {
    /// Interface name (e.g., "en0", "eth0").
    pub name: String,
    /// IPv4 address bound to this interface.
    pub ip: Ipv4Addr,
}

/// Lists non-virtual, non-loopback IPv4 interfaces.
pub fn get_interfaces() -> Vec<InterfaceInfo> {
    list_afinet_netifas()
        .unwrap_or_else(|e| {
            log::warn!("[SSDP] Failed to list network interfaces: {}", e);
            Vec::new()
        })
        .into_iter()
        .filter_map(|(name, addr)| match addr {
            IpAddr::V4(ip) if !ip.is_loopback() && !is_virtual_interface(&name) => {
                Some(InterfaceInfo { name, ip })
            }
            _ => None,
        })
        .collect()
}

/// Creates a UDP socket on `iface_ip` with address/port reuse and TTL set.
fn create_socket(iface_ip: Ipv4Addr) -> Result<UdpSocket, DiscoveryError> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))
        .map_err(DiscoveryError::SocketBind)?;

    socket
        .set_reuse_address(true)
        .map_err(DiscoveryError::SocketConfig)?;

    #[cfg(unix)]
    if let Err(e) = socket.set_reuse_port(true) {
        log::warn!("[SSDP] Failed to set SO_REUSEPORT on {}: {}", iface_ip, e);
    }

    if let Err(e) = socket.set_multicast_ttl_v4(SSDP_MULTICAST_TTL) {
        log::warn!("[SSDP] Failed to set multicast TTL on {}: {}", iface_ip, e);
    }

    socket
        .set_nonblocking(true)
        .map_err(DiscoveryError::SocketConfig)?;
    socket
        .bind(&SocketAddr::new(IpAddr::V4(iface_ip), 0).into())
        .map_err(DiscoveryError::SocketBind)?;

    let std_socket: std::net::UdpSocket = socket.into();
    UdpSocket::from_std(std_socket).map_err(DiscoveryError::SocketBind)
}

// ─────────────────────────────────────────────────────────────────────────────
// Probe
// ─────────────────────────────────────────────────────────────────────────────

/// Probe settings.
#[derive(Debug, Clone)]
pub struct SsdpConfig {
    /// Fixed listen window.
    pub listen_window: Duration,
    /// MX header value (max response delay hint, seconds).
    pub mx: u64,
    /// M-SEARCH datagrams sent per interface.
    pub send_count: u32,
}

impl Default for SsdpConfig {
    fn default() -> Self {
        Self {
            listen_window: Duration::from_secs(3),
            mx: 1,
            send_count: 1,
        }
    }
}

/// Multicasts one M-SEARCH per interface and collects responses for the
/// full listen window.
///
/// Candidates come back in arrival order. Repeat responses from the same
/// location are collapsed to the first one seen.
///
/// # Errors
/// Fails only when no interface could be used at all.
pub async fn probe(config: &SsdpConfig) -> Result<Vec<SsdpCandidate>, DiscoveryError> {
    let interfaces = get_interfaces();
    if interfaces.is_empty() {
        return Err(DiscoveryError::NoInterfaces);
    }

    let message = build_msearch_message(config.mx);
    let target = format!("{}:{}", SSDP_MULTICAST_ADDR, SSDP_PORT);

    let mut sockets = Vec::new();
    let mut last_send_error = None;
    for iface in interfaces {
        let socket = match create_socket(iface.ip) {
            Ok(s) => s,
            Err(e) => {
                log::warn!("[SSDP] Skipping {} ({}): {}", iface.name, iface.ip, e);
                continue;
            }
        };
        match send_search(&socket, &message, &target, config.send_count).await {
            Ok(_) => {
                log::debug!("[SSDP] M-SEARCH sent on {} ({})", iface.name, iface.ip);
                sockets.push((iface, Arc::new(socket)));
            }
            Err(e) => {
                log::warn!("[SSDP] M-SEARCH failed on {} ({}): {}", iface.name, iface.ip, e);
                last_send_error = Some(e);
            }
        }
    }

    if sockets.is_empty() {
        return Err(match last_send_error {
            Some(e) => DiscoveryError::SendSearch(e),
            None => DiscoveryError::NoInterfaces,
        });
    }

    let deadline = Instant::now() + config.listen_window;
    let receivers = sockets
        .iter()
        .map(|(iface, socket)| collect_until(Arc::clone(socket), iface.name.clone(), deadline));
    let per_interface = futures::future::join_all(receivers).await;

    let mut arrivals: Vec<(Instant, SsdpCandidate)> = per_interface.into_iter().flatten().collect();
    arrivals.sort_by_key(|(at, _)| *at);

    let candidates = collapse_repeats(arrivals.into_iter().map(|(_, c)| c));
    log::info!(
        "[SSDP] Probe complete: {} candidate(s) in {:?}",
        candidates.len(),
        config.listen_window
    );
    Ok(candidates)
}

/// Sends the search datagram `count` times (at least once).
async fn send_search(
    socket: &UdpSocket,
    message: &str,
    target: &str,
    count: u32,
) -> std::io::Result<()> {
    for _ in 0..count.max(1) {
        socket.send_to(message.as_bytes(), target).await?;
    }
    Ok(())
}

/// Errors after which the socket is still usable.
///
/// `ConnectionReset` is how some platforms surface an ICMP port-unreachable
/// from an earlier send.
fn is_transient_recv_error(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        ErrorKind::Interrupted | ErrorKind::WouldBlock | ErrorKind::ConnectionReset
    )
}

/// Receives on one socket until `deadline` or the first hard error,
/// timestamping each parsed response.
async fn collect_until(
    socket: Arc<UdpSocket>,
    iface_name: String,
    deadline: Instant,
) -> Vec<(Instant, SsdpCandidate)> {
    let mut found = Vec::new();
    let mut buf = [0u8; SSDP_RECV_BUFFER_SIZE];

    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            break;
        }
        match timeout(remaining, socket.recv_from(&mut buf)).await {
            Ok(Ok((len, src))) => {
                let response = String::from_utf8_lossy(&buf[..len]);
                match parse_ssdp_response(&response, &src.ip().to_string()) {
                    Some(candidate) => {
                        log::debug!(
                            "[SSDP] Response from {} via {}: {}",
                            candidate.ip,
                            iface_name,
                            candidate.location
                        );
                        found.push((Instant::now(), candidate));
                    }
                    None => log::trace!("[SSDP] Ignoring unparseable response from {}", src),
                }
            }
            Ok(Err(e)) if is_transient_recv_error(&e) => {
                log::debug!("[SSDP] Transient receive error on {}: {}", iface_name, e);
            }
            Ok(Err(e)) => {
                log::warn!("[SSDP] Receive failed on {}, stopping early: {}", iface_name, e);
                break;
            }
            Err(_) => break,
        }
    }

    found
}

/// Drops repeat responses for an already-seen location, keeping the first.
pub fn collapse_repeats(candidates: impl IntoIterator<Item = SsdpCandidate>) -> Vec<SsdpCandidate> {
    let mut seen = std::collections::HashSet::new();
    candidates
        .into_iter()
        .filter(|c| seen.insert(c.location.clone()))
        .collect()
}

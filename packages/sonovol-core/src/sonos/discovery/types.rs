//! Shared types for speaker discovery.

use serde::Serialize;
use thiserror::Error;

use crate::protocol_constants::UDN_PREFIX;

/// Errors that abort a discovery run.
///
/// Per-response and per-description problems never surface here: they are
/// logged and the affected candidate is dropped or degraded.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// Failed to create or bind the UDP socket.
    #[error("failed to bind UDP socket: {0}")]
    SocketBind(#[source] std::io::Error),

    /// Failed to configure the UDP socket.
    #[error("failed to configure UDP socket: {0}")]
    SocketConfig(#[source] std::io::Error),

    /// The M-SEARCH datagram could not be sent on any interface.
    #[error("failed to send SSDP search: {0}")]
    SendSearch(#[source] std::io::Error),

    /// No usable network interfaces found.
    #[error("no usable network interfaces found")]
    NoInterfaces,
}

/// Convenient Result alias for speaker discovery operations.
pub type DiscoveryResult<T> = Result<T, DiscoveryError>;

/// A raw SSDP response that carried a usable `LOCATION`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SsdpCandidate {
    /// Source address of the response datagram.
    pub ip: String,
    /// Device description URL.
    pub location: String,
    /// Identifier advertised in the `USN` header, if any.
    pub usn_uuid: Option<String>,
}

/// Fields resolved from a device description document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceDescription {
    /// Identifier from `UDN`, with the `uuid:` prefix removed.
    pub id: Option<String>,
    /// `roomName`, falling back to `friendlyName`.
    pub name: Option<String>,
    /// `modelName`, e.g. "Sonos One".
    pub model_name: Option<String>,
}

/// Normalizes a UPnP identifier to its bare `RINCON_…` form.
///
/// Accepts UDN values (`uuid:RINCON_…`), USN values
/// (`uuid:RINCON_…::urn:schemas-upnp-org:device:ZonePlayer:1`) and
/// sub-device forms with `_MR`/`_MS`/`_LR` suffixes.
///
/// # Example
/// ```ignore
/// assert_eq!(normalize_uuid("uuid:RINCON_ABC123_MR"), "RINCON_ABC123");
/// ```
pub fn normalize_uuid(raw: &str) -> String {
    let trimmed = raw.trim();
    let without_prefix = trimmed
        .get(..UDN_PREFIX.len())
        .filter(|p| p.eq_ignore_ascii_case(UDN_PREFIX))
        .map_or(trimmed, |_| &trimmed[UDN_PREFIX.len()..]);
    let mut id = without_prefix
        .split("::")
        .next()
        .unwrap_or_default()
        .to_string();

    while let Some(stripped) = ["_MS", "_MR", "_LR"]
        .iter()
        .find_map(|suffix| id.strip_suffix(suffix))
    {
        id = stripped.to_string();
    }
    id
}

/// Virtual interface prefixes to skip during discovery.
pub const VIRTUAL_INTERFACE_PREFIXES: &[&str] = &[
    "lo", "docker", "veth", "br-", "virbr", "vmnet", "vbox", "tun", "tap", "utun",
];

/// Checks if an interface name belongs to a virtual/container interface.
pub fn is_virtual_interface(name: &str) -> bool {
    let name_lower = name.to_lowercase();
    VIRTUAL_INTERFACE_PREFIXES
        .iter()
        .any(|prefix| name_lower.starts_with(prefix))
}

//! Fixed protocol constants that should NOT be changed.
//!
//! These values are defined by external specifications (SSDP, UPnP, GENA) or by
//! Sonos firmware behaviour. Tunables live in [`CoreConfig`](crate::state::CoreConfig).

// ─────────────────────────────────────────────────────────────────────────────
// SSDP
// ─────────────────────────────────────────────────────────────────────────────

/// SSDP multicast group address.
pub const SSDP_MULTICAST_ADDR: &str = "239.255.255.250";

/// SSDP multicast port.
pub const SSDP_PORT: u16 = 1900;

/// Search target identifying Sonos zone players.
pub const SSDP_SEARCH_TARGET: &str = "urn:schemas-upnp-org:device:ZonePlayer:1";

/// Multicast TTL for the M-SEARCH datagram.
///
/// 4 hops reaches across typical home mesh setups without leaking further.
pub const SSDP_MULTICAST_TTL: u32 = 4;

/// Receive buffer size for a single SSDP response datagram.
pub const SSDP_RECV_BUFFER_SIZE: usize = 2048;

// ─────────────────────────────────────────────────────────────────────────────
// UPnP control
// ─────────────────────────────────────────────────────────────────────────────

/// Default Sonos speaker control port.
pub const SONOS_PORT: u16 = 1400;

/// Identifier prefix carried by `UDN` elements in device descriptions.
pub const UDN_PREFIX: &str = "uuid:";

// ─────────────────────────────────────────────────────────────────────────────
// GENA (UPnP General Event Notification Architecture)
// ─────────────────────────────────────────────────────────────────────────────

/// Notification type header value for initial subscriptions.
pub const GENA_NT: &str = "upnp:event";

/// Notification sub-type header value.
pub const GENA_NTS: &str = "upnp:propchange";

/// Fraction of the granted timeout after which a subscription is renewed.
pub const GENA_RENEWAL_FRACTION: f64 = 0.8;

/// Path the NOTIFY listener serves callbacks on.
pub const GENA_CALLBACK_PATH: &str = "/notify";

/// Maximum size of a NOTIFY body (bytes).
///
/// ZoneGroupState payloads for large households are the biggest bodies seen.
pub const MAX_NOTIFY_BODY_SIZE: usize = 256 * 1024;

// ─────────────────────────────────────────────────────────────────────────────
// Audio source URI prefixes
// ─────────────────────────────────────────────────────────────────────────────

/// Line-in input of a speaker (including line-in of another speaker).
pub const LINE_IN_URI_PREFIX: &str = "x-rincon-stream:";

/// Home-theater input (TV via HDMI ARC/optical).
pub const TV_URI_PREFIX: &str = "x-sonos-htastream:";

/// A member following a group coordinator.
pub const GROUPED_URI_PREFIX: &str = "x-rincon:";

/// Prefixes that identify network streaming and library playback.
pub const STREAMING_URI_PREFIXES: &[&str] = &[
    "x-sonosapi-",
    "x-sonos-spotify:",
    "x-sonos-http:",
    "x-sonosprog-http:",
    "x-rincon-mp3radio:",
    "x-rincon-queue:",
    "x-rincon-playlist:",
    "x-file-cifs:",
    "aac:",
    "http://",
    "https://",
];

// ─────────────────────────────────────────────────────────────────────────────
// Channels
// ─────────────────────────────────────────────────────────────────────────────

/// Capacity of the controller notification broadcast channel.
pub const EVENT_CHANNEL_CAPACITY: usize = 100;

/// Capacity of the subscription manager's command channel.
pub const SUBSCRIPTION_COMMAND_CAPACITY: usize = 64;

/// Volume range accepted by RenderingControl.
pub const MAX_VOLUME: u8 = 100;

//! Event types and delivery.
//!
//! Two families of events flow through the core:
//! - [`ControllerEvent`]: the notifications the collaborator (UI, CLI)
//!   consumes, delivered through an [`EventEmitter`].
//! - [`TopologyEvent`] / [`TransportEvent`]: the ordered streams the
//!   subscription manager produces from NOTIFY callbacks.

mod bridge;
pub(crate) mod emitter;

pub use bridge::BroadcastEventBridge;
pub use emitter::{EventEmitter, LoggingEventEmitter, NoopEventEmitter};

use serde::Serialize;

use crate::sonos::gena_parser::TransportChange;
use crate::sonos::types::Device;

/// Notifications for the collaborator-facing API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ControllerEvent {
    /// A discovery run started.
    DiscoveryStarted {
        /// Unix timestamp in milliseconds.
        timestamp: u64,
    },
    /// A discovery run finished. An empty list is a valid outcome.
    DevicesDiscovered {
        devices: Vec<Device>,
        /// Unix timestamp in milliseconds.
        timestamp: u64,
    },
    /// Volume or mute of a device changed (by command or by NOTIFY).
    VolumeChanged {
        #[serde(rename = "deviceId")]
        device_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        volume: Option<u8>,
        #[serde(skip_serializing_if = "Option::is_none")]
        muted: Option<bool>,
        /// Unix timestamp in milliseconds.
        timestamp: u64,
    },
}

/// Ordered topology stream of the subscription manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TopologyEvent {
    /// Raw ZoneGroupTopology NOTIFY body.
    Changed {
        sid: String,
        device_id: String,
        body: String,
    },
    /// A renewal failed; the subscription will not deliver further events.
    SubscriptionExpired { sid: String },
}

/// Ordered transport stream of the subscription manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportEvent {
    pub sid: String,
    pub device_id: String,
    pub change: TransportChange,
}

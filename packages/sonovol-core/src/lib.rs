//! Sonovol Core - Sonos discovery, topology, eventing and group control.
//!
//! This crate finds Sonos speakers on the local network, keeps a live model
//! of their group topology, listens for UPnP GENA events, and controls
//! volume, mute and grouping. It is designed to be driven by a front end
//! such as the `sonovol` CLI.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`sonos`]: Speaker protocol layer (SSDP, SOAP, GENA, XML parsing)
//! - [`services`]: Topology sync, subscriptions, source detection, grouping
//!   and the collaborator-facing [`SonosController`]
//! - [`api`]: The GENA NOTIFY listener
//! - [`events`]: Event types and delivery
//! - [`context`]: Local address and callback URL
//! - [`state`]: Configuration and the shared device/topology model
//! - [`bootstrap`]: Composition root
//! - [`error`]: Centralized error types
//!
//! # Abstraction Traits
//!
//! Services depend on traits rather than concrete clients:
//!
//! - [`SonosClient`](sonos::SonosClient) and its parts: speaker operations
//! - [`GenaTransport`](sonos::gena_client::GenaTransport): GENA requests
//! - [`EventEmitter`](events::EventEmitter): Emitting controller events
//! - [`IpDetector`](context::IpDetector): Local IP detection

#![warn(clippy::all)]

pub mod api;
pub mod bootstrap;
pub mod context;
pub mod error;
pub mod events;
pub mod protocol_constants;
pub mod services;
pub mod sonos;
pub mod state;
pub mod utils;

// Re-export commonly used types at the crate root
pub use context::{IpDetector, LocalIpDetector, NetworkContext};
pub use error::{CoreError, CoreResult, GroupingError};
pub use events::{
    BroadcastEventBridge, ControllerEvent, EventEmitter, LoggingEventEmitter, NoopEventEmitter,
};
pub use state::{CoreConfig, SonosState};
pub use utils::now_millis;

// Re-export Sonos types
pub use sonos::types::{AudioSource, Device, Group, TransportState};
pub use sonos::{SonosClient, SonosClientImpl};

// Re-export service types
pub use services::{GroupPlan, SelectionReason, SonosController, SubscriptionInfo, Target};

// Re-export bootstrap types
pub use bootstrap::{bootstrap_services, network_context, CoreServices};

//! Sonos speaker protocol layer.
//!
//! Everything that talks to a speaker (or parses what a speaker sent) lives
//! here; state and orchestration live in [`crate::services`].
//!
//! # Module Structure
//!
//! - `types` - Devices, groups, transport state, audio sources, zone groups
//! - `services` - UPnP service definitions (URNs, paths) and subscription kinds
//! - `soap` - SOAP envelopes and the control-call transport
//! - `utils` - XML field extraction and URL helpers
//! - `retry` - Caller-side retry for transient SOAP faults
//! - `discovery` - SSDP probe, description fetch, deduplication
//! - `zone_groups` - Zone group topology parsing and retrieval
//! - `transport` - AVTransport state and position queries
//! - `grouping` - Member add/remove commands
//! - `volume` - Speaker and group volume/mute
//! - `gena_client` - GENA SUBSCRIBE/renew/UNSUBSCRIBE
//! - `gena_parser` - NOTIFY body parsing
//! - `traits` - Trait seams for testability
//! - `client` - `SonosClientImpl`, the concrete trait implementation

pub mod client;
pub mod discovery;
pub mod gena_client;
pub mod gena_parser;
pub mod grouping;
pub(crate) mod retry;
pub mod services;
pub mod soap;
pub mod traits;
pub mod transport;
pub mod types;
pub mod utils;
pub mod volume;
pub mod zone_groups;

#[cfg(test)]
pub(crate) mod test_fixtures;

pub use services::{ServiceKind, SonosService};

pub use traits::{
    SonosClient, SonosDiscovery, SonosGrouping, SonosTopology, SonosTransport, SonosVolumeControl,
};

pub use client::SonosClientImpl;

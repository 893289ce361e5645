//! Trait abstractions for speaker operations.
//!
//! Services depend on these traits rather than on [`SonosClientImpl`]
//! (`crate::sonos::SonosClientImpl`), so the synchronizer, detector,
//! orchestrator and controller run against in-memory fakes in tests.

use async_trait::async_trait;

use crate::error::{DiscoveryResult, SoapResult};
use crate::sonos::transport::PositionInfo;
use crate::sonos::types::{Device, TransportState, ZoneGroup};

/// Speaker discovery.
#[async_trait]
pub trait SonosDiscovery: Send + Sync {
    /// Runs a full discovery pass: deduplicated, sorted by name.
    async fn discover_devices(&self) -> DiscoveryResult<Vec<Device>>;
}

/// Zone group topology queries.
#[async_trait]
pub trait SonosTopology: Send + Sync {
    /// Fetches the current zone groups from any speaker.
    async fn get_zone_groups(&self, ip: &str) -> SoapResult<Vec<ZoneGroup>>;
}

/// Transport queries used to detect what a speaker is playing.
#[async_trait]
pub trait SonosTransport: Send + Sync {
    /// Gets the current transport state.
    async fn get_transport_info(&self, ip: &str) -> SoapResult<TransportState>;

    /// Gets the current track URI and metadata.
    async fn get_position_info(&self, ip: &str) -> SoapResult<PositionInfo>;
}

/// Group membership commands.
#[async_trait]
pub trait SonosGrouping: Send + Sync {
    /// Makes the speaker at `ip` follow `coordinator_uuid`.
    async fn add_member(&self, ip: &str, coordinator_uuid: &str) -> SoapResult<()>;

    /// Makes the speaker at `ip` standalone.
    async fn remove_member(&self, ip: &str) -> SoapResult<()>;
}

/// Volume and mute control, per speaker and per group.
#[async_trait]
pub trait SonosVolumeControl: Send + Sync {
    /// Gets a speaker's volume (0-100).
    async fn get_speaker_volume(&self, ip: &str) -> SoapResult<u8>;

    /// Sets a speaker's volume (clamped to 100).
    async fn set_speaker_volume(&self, ip: &str, volume: u8) -> SoapResult<()>;

    /// Gets a speaker's mute state.
    async fn get_speaker_mute(&self, ip: &str) -> SoapResult<bool>;

    /// Sets a speaker's mute state.
    async fn set_speaker_mute(&self, ip: &str, mute: bool) -> SoapResult<()>;

    /// Gets the group volume from the coordinator (0-100).
    async fn get_group_volume(&self, coordinator_ip: &str) -> SoapResult<u8>;

    /// Sets the group volume on the coordinator (clamped to 100).
    async fn set_group_volume(&self, coordinator_ip: &str, volume: u8) -> SoapResult<()>;

    /// Gets the group mute state from the coordinator.
    async fn get_group_mute(&self, coordinator_ip: &str) -> SoapResult<bool>;

    /// Sets the group mute state on the coordinator.
    async fn set_group_mute(&self, coordinator_ip: &str, mute: bool) -> SoapResult<()>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Combined Traits (for trait objects)
// ─────────────────────────────────────────────────────────────────────────────

/// Combined trait for all speaker operations.
///
/// Used by the controller to hold one client for everything.
pub trait SonosClient:
    SonosDiscovery + SonosTopology + SonosTransport + SonosGrouping + SonosVolumeControl
{
}

/// Blanket implementation for any type implementing all traits.
impl<T> SonosClient for T where
    T: SonosDiscovery + SonosTopology + SonosTransport + SonosGrouping + SonosVolumeControl
{
}

//! Concrete speaker client.
//!
//! Wraps the free functions of the protocol modules behind the traits in
//! [`traits`](super::traits) so services can be handed a trait object.

use async_trait::async_trait;
use reqwest::Client;

use crate::error::{DiscoveryResult, SoapResult};
use crate::sonos::discovery::{self, DiscoveryConfig};
use crate::sonos::grouping;
use crate::sonos::retry::RetryPolicy;
use crate::sonos::traits::{
    SonosDiscovery, SonosGrouping, SonosTopology, SonosTransport, SonosVolumeControl,
};
use crate::sonos::transport::{self, PositionInfo};
use crate::sonos::types::{Device, TransportState, ZoneGroup};
use crate::sonos::volume;
use crate::sonos::zone_groups;

/// reqwest-backed implementation of every speaker trait.
#[derive(Clone)]
pub struct SonosClientImpl {
    client: Client,
    discovery_config: DiscoveryConfig,
    /// Applied to member additions only.
    retry: RetryPolicy,
}

impl std::fmt::Debug for SonosClientImpl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SonosClientImpl")
            .field("client", &"Client")
            .field("discovery_config", &self.discovery_config)
            .field("retry", &self.retry)
            .finish()
    }
}

impl SonosClientImpl {
    /// Creates a client with default discovery settings.
    ///
    /// The HTTP client's own timeout bounds every control call.
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self::with_discovery_config(client, DiscoveryConfig::default())
    }

    /// Creates a client with custom discovery settings.
    #[must_use]
    pub fn with_discovery_config(client: Client, discovery_config: DiscoveryConfig) -> Self {
        Self {
            client,
            discovery_config,
            retry: RetryPolicy::default(),
        }
    }

    /// Returns the underlying HTTP client.
    #[must_use]
    pub fn http(&self) -> &Client {
        &self.client
    }
}

#[async_trait]
impl SonosDiscovery for SonosClientImpl {
    async fn discover_devices(&self) -> DiscoveryResult<Vec<Device>> {
        discovery::discover_devices(&self.client, &self.discovery_config).await
    }
}

#[async_trait]
impl SonosTopology for SonosClientImpl {
    async fn get_zone_groups(&self, ip: &str) -> SoapResult<Vec<ZoneGroup>> {
        zone_groups::get_zone_groups(&self.client, ip).await
    }
}

#[async_trait]
impl SonosTransport for SonosClientImpl {
    async fn get_transport_info(&self, ip: &str) -> SoapResult<TransportState> {
        transport::get_transport_info(&self.client, ip).await
    }

    async fn get_position_info(&self, ip: &str) -> SoapResult<PositionInfo> {
        transport::get_position_info(&self.client, ip).await
    }
}

#[async_trait]
impl SonosGrouping for SonosClientImpl {
    async fn add_member(&self, ip: &str, coordinator_uuid: &str) -> SoapResult<()> {
        grouping::add_member(&self.client, ip, coordinator_uuid, &self.retry).await
    }

    async fn remove_member(&self, ip: &str) -> SoapResult<()> {
        grouping::remove_member(&self.client, ip).await
    }
}

#[async_trait]
impl SonosVolumeControl for SonosClientImpl {
    async fn get_speaker_volume(&self, ip: &str) -> SoapResult<u8> {
        volume::get_speaker_volume(&self.client, ip).await
    }

    async fn set_speaker_volume(&self, ip: &str, level: u8) -> SoapResult<()> {
        volume::set_speaker_volume(&self.client, ip, level).await
    }

    async fn get_speaker_mute(&self, ip: &str) -> SoapResult<bool> {
        volume::get_speaker_mute(&self.client, ip).await
    }

    async fn set_speaker_mute(&self, ip: &str, mute: bool) -> SoapResult<()> {
        volume::set_speaker_mute(&self.client, ip, mute).await
    }

    async fn get_group_volume(&self, coordinator_ip: &str) -> SoapResult<u8> {
        volume::get_group_volume(&self.client, coordinator_ip).await
    }

    async fn set_group_volume(&self, coordinator_ip: &str, level: u8) -> SoapResult<()> {
        volume::set_group_volume(&self.client, coordinator_ip, level).await
    }

    async fn get_group_mute(&self, coordinator_ip: &str) -> SoapResult<bool> {
        volume::get_group_mute(&self.client, coordinator_ip).await
    }

    async fn set_group_mute(&self, coordinator_ip: &str, mute: bool) -> SoapResult<()> {
        volume::set_group_mute(&self.client, coordinator_ip, mute).await
    }
}

//! Core configuration and the live device/group model.
//!
//! [`CoreConfig`] carries every tunable of the core with its default.
//! [`SonosState`] holds the devices, groups and topology cache shared by the
//! synchronizer, the controller and the subscription event pump.

use std::collections::{HashMap, HashSet};
use std::net::IpAddr;
use std::time::Duration;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::protocol_constants::{EVENT_CHANNEL_CAPACITY, GENA_RENEWAL_FRACTION};
use crate::sonos::discovery::{DiscoveryConfig, SsdpConfig};
use crate::sonos::types::{AudioSource, Device, Group, TransportState, ZoneGroup};

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Configuration for the sonovol core.
///
/// All fields have sensible defaults; a partial document deserializes with
/// the rest filled in.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    // Discovery
    /// Fixed SSDP listen window (milliseconds).
    pub discovery_window_ms: u64,
    /// MX header of the M-SEARCH request (seconds).
    pub ssdp_mx: u64,
    /// M-SEARCH datagrams per interface.
    pub ssdp_send_count: u32,
    /// Device description GET timeout (milliseconds).
    pub description_timeout_ms: u64,

    // Control
    /// Timeout for every SOAP control call (milliseconds).
    pub soap_timeout_ms: u64,
    /// Per-device bound for a source-detection pair of calls (milliseconds).
    pub source_detection_timeout_ms: u64,
    /// Wait after grouping commands before refreshing topology (milliseconds).
    pub settle_delay_ms: u64,
    /// Step used by volume up/down.
    pub volume_step: u8,

    // Eventing
    /// Subscription timeout requested from speakers (seconds).
    pub subscription_timeout_secs: u64,
    /// Fraction of the granted timeout after which a renewal fires.
    pub renewal_fraction: f64,
    /// Capacity of the NOTIFY handoff queue.
    pub notify_queue_capacity: usize,
    /// Address the NOTIFY listener binds to (port is always OS-assigned).
    pub notify_bind_addr: IpAddr,
    /// IP advertised in callback URLs; auto-detected when unset.
    pub advertise_ip: Option<IpAddr>,

    // Model
    /// Interval of the background topology refresh (seconds).
    pub topology_refresh_interval_secs: u64,
    /// Capacity of the controller notification channel.
    pub event_channel_capacity: usize,
    /// Device name selected automatically after discovery, if present.
    pub preferred_device: Option<String>,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            discovery_window_ms: 3000,
            ssdp_mx: 1,
            ssdp_send_count: 1,
            description_timeout_ms: 3000,
            soap_timeout_ms: 5000,
            source_detection_timeout_ms: 5000,
            settle_delay_ms: 500,
            volume_step: 5,
            subscription_timeout_secs: 1800,
            renewal_fraction: GENA_RENEWAL_FRACTION,
            notify_queue_capacity: 64,
            notify_bind_addr: IpAddr::from([0, 0, 0, 0]),
            advertise_ip: None,
            topology_refresh_interval_secs: 30,
            event_channel_capacity: EVENT_CHANNEL_CAPACITY,
            preferred_device: None,
        }
    }
}

impl CoreConfig {
    /// Validates the configuration values.
    ///
    /// # Errors
    /// Returns a description of the first value that would break the runtime.
    pub fn validate(&self) -> Result<(), String> {
        if self.discovery_window_ms == 0 {
            return Err("discovery_window_ms must be >= 1".to_string());
        }
        if self.soap_timeout_ms == 0 || self.source_detection_timeout_ms == 0 {
            return Err("timeouts must be >= 1ms".to_string());
        }
        if self.subscription_timeout_secs == 0 {
            return Err("subscription_timeout_secs must be >= 1".to_string());
        }
        if !(self.renewal_fraction > 0.0 && self.renewal_fraction < 1.0) {
            return Err("renewal_fraction must be between 0 and 1 (exclusive)".to_string());
        }
        if self.notify_queue_capacity == 0 || self.event_channel_capacity == 0 {
            return Err("channel capacities must be >= 1 (channels panic on 0)".to_string());
        }
        if self.topology_refresh_interval_secs == 0 {
            return Err("topology_refresh_interval_secs must be >= 1".to_string());
        }
        Ok(())
    }

    /// Discovery settings derived from this configuration.
    #[must_use]
    pub fn discovery_config(&self) -> DiscoveryConfig {
        DiscoveryConfig {
            ssdp: SsdpConfig {
                listen_window: Duration::from_millis(self.discovery_window_ms),
                mx: self.ssdp_mx,
                send_count: self.ssdp_send_count,
            },
            description_timeout: Duration::from_millis(self.description_timeout_ms),
        }
    }

    #[must_use]
    pub fn soap_timeout(&self) -> Duration {
        Duration::from_millis(self.soap_timeout_ms)
    }

    #[must_use]
    pub fn source_detection_timeout(&self) -> Duration {
        Duration::from_millis(self.source_detection_timeout_ms)
    }

    #[must_use]
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    #[must_use]
    pub fn topology_refresh_interval(&self) -> Duration {
        Duration::from_secs(self.topology_refresh_interval_secs)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Live Model
// ─────────────────────────────────────────────────────────────────────────────

/// Member → coordinator mapping plus a loaded flag.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopologyCache {
    pub coordinators: HashMap<String, String>,
    pub loaded: bool,
}

/// A change to the topology cache.
#[derive(Debug, Clone)]
pub(crate) enum TopologyUpdate {
    /// Forced refresh started: the cache no longer counts as loaded, but its
    /// entries stay until a complete replacement arrives.
    Invalidate,
    /// A complete, successfully parsed topology replaces the cache wholesale.
    Replace(Vec<ZoneGroup>),
    /// A pushed topology is merged entry by entry.
    Merge(Vec<ZoneGroup>),
}

/// Runtime state for discovered devices and groups.
///
/// # Lock order
///
/// `cache` → `devices` → `groups` → `selected`. Every method takes the locks
/// it needs in that order and releases them before returning, so no lock is
/// ever held across an `.await`.
#[derive(Debug, Default)]
pub struct SonosState {
    cache: RwLock<TopologyCache>,
    devices: RwLock<Vec<Device>>,
    groups: RwLock<Vec<Group>>,
    selected: RwLock<Option<String>>,
}

impl SonosState {
    /// Snapshot of all devices, sorted by name.
    #[must_use]
    pub fn devices(&self) -> Vec<Device> {
        self.devices.read().clone()
    }

    /// Snapshot of all groups.
    #[must_use]
    pub fn groups(&self) -> Vec<Group> {
        self.groups.read().clone()
    }

    /// Finds a device by identifier, name (case-insensitive) or IP.
    #[must_use]
    pub fn device(&self, id_or_name: &str) -> Option<Device> {
        self.devices
            .read()
            .iter()
            .find(|d| d.matches(id_or_name))
            .cloned()
    }

    /// Finds the group led by `coordinator_id`, or containing it as a member.
    #[must_use]
    pub fn group_of(&self, device_id: &str) -> Option<Group> {
        self.groups
            .read()
            .iter()
            .find(|g| g.coordinator_id == device_id || g.members.iter().any(|m| m == device_id))
            .cloned()
    }

    /// Snapshot of the topology cache.
    #[must_use]
    pub fn topology_cache(&self) -> TopologyCache {
        self.cache.read().clone()
    }

    /// True once a complete topology has been loaded.
    #[must_use]
    pub fn topology_loaded(&self) -> bool {
        self.cache.read().loaded
    }

    /// Replaces the device list after discovery.
    ///
    /// Cached coordinator assignments are re-applied to the new records, and
    /// cached source annotations of devices seen before are carried over.
    pub fn set_devices(&self, mut devices: Vec<Device>) {
        let cache = self.cache.read();
        let mut current = self.devices.write();
        for device in &mut devices {
            if let Some(previous) = current.iter().find(|p| p.key() == device.key()) {
                device.source = previous.source;
                device.transport_state = previous.transport_state;
                device.stereo_pair.clone_from(&previous.stereo_pair);
            }
        }
        apply_coordinators(&mut devices, &cache.coordinators);
        devices.sort_by_cached_key(|d| d.name.to_lowercase());
        *current = devices;
    }

    /// Records the detected source of a device.
    ///
    /// Returns false when the device is unknown.
    pub fn annotate_source(
        &self,
        device_id: &str,
        source: Option<AudioSource>,
        transport_state: Option<TransportState>,
    ) -> bool {
        let mut devices = self.devices.write();
        let Some(device) = devices.iter_mut().find(|d| d.key() == device_id) else {
            return false;
        };
        if source.is_some() {
            device.source = source;
        }
        if transport_state.is_some() {
            device.transport_state = transport_state;
        }
        true
    }

    /// Identifier of the selected device.
    #[must_use]
    pub fn selected(&self) -> Option<String> {
        self.selected.read().clone()
    }

    /// Selects `device_id`, or clears the selection with `None`.
    pub fn select(&self, device_id: Option<String>) {
        *self.selected.write() = device_id;
    }

    /// Applies a topology change. This is the single mutation path for the
    /// cache; only the topology synchronizer calls it.
    pub(crate) fn apply_topology(&self, update: TopologyUpdate) {
        let mut cache = self.cache.write();
        let (groups, replace) = match update {
            TopologyUpdate::Invalidate => {
                cache.loaded = false;
                return;
            }
            TopologyUpdate::Replace(groups) => (groups, true),
            TopologyUpdate::Merge(groups) => (groups, false),
        };

        let incoming = crate::sonos::zone_groups::coordinator_map(&groups);
        if replace {
            cache.coordinators = incoming;
            cache.loaded = true;
        } else {
            cache.coordinators.extend(incoming);
        }

        let mut devices = self.devices.write();
        apply_coordinators(&mut devices, &cache.coordinators);
        apply_stereo_pairs(&mut devices, &groups);

        let mut current = self.groups.write();
        let new_groups: Vec<Group> = groups.iter().map(group_from_zone).collect();
        if replace {
            *current = new_groups;
        } else {
            let touched: HashSet<&str> = new_groups
                .iter()
                .flat_map(|g| g.members.iter().map(String::as_str))
                .collect();
            current.retain(|g| !g.members.iter().any(|m| touched.contains(m.as_str())));
            current.extend(new_groups);
        }
    }
}

/// Sets coordinator fields of every device present in `coordinators`.
///
/// A coordinator that is neither the device itself nor a known device
/// cannot be referenced, so the device is marked as ungrouped/unknown.
/// Devices absent from the mapping keep their prior values.
fn apply_coordinators(devices: &mut [Device], coordinators: &HashMap<String, String>) {
    let known: HashSet<String> = devices.iter().filter_map(|d| d.id.clone()).collect();
    for device in devices.iter_mut() {
        let Some(id) = device.id.as_deref() else {
            continue;
        };
        let Some(coordinator) = coordinators.get(id) else {
            continue;
        };
        if coordinator == id || known.contains(coordinator) {
            device.is_coordinator = coordinator == id;
            device.coordinator_id = Some(coordinator.clone());
        } else {
            log::debug!(
                "[Topology] Coordinator {} of {} is not a known device",
                coordinator,
                device.name
            );
            device.is_coordinator = false;
            device.coordinator_id = None;
        }
    }
}

fn apply_stereo_pairs(devices: &mut [Device], groups: &[ZoneGroup]) {
    for member in groups.iter().flat_map(|g| g.members.iter()) {
        if let Some(device) = devices
            .iter_mut()
            .find(|d| d.id.as_deref() == Some(member.uuid.as_str()))
        {
            device.stereo_pair.clone_from(&member.stereo_pair);
        }
    }
}

/// Hidden members (pair secondaries, satellites) are not separately
/// addressable, so they are left out of the group's member list.
fn group_from_zone(zone: &ZoneGroup) -> Group {
    Group {
        id: zone.id.clone(),
        name: zone.name.clone(),
        coordinator_id: zone.coordinator_uuid.clone(),
        members: zone
            .members
            .iter()
            .filter(|m| !m.invisible)
            .map(|m| m.uuid.clone())
            .collect(),
    }
}

//! Speaker discovery: SSDP probe, description fetch, deduplication.
//!
//! ```text
//! probe (fixed window) ─► candidates ─► fetch descriptions (parallel)
//!                                        ─► dedupe by name (first seen)
//!                                        ─► sort by name
//! ```

pub mod description;
pub mod ssdp;
pub mod types;

use std::collections::HashSet;
use std::time::Duration;

use reqwest::Client;

pub use description::{fetch_description, parse_device_description, resolve_candidate};
pub use ssdp::{probe, SsdpConfig};
pub use types::{
    normalize_uuid, DeviceDescription, DiscoveryError, DiscoveryResult, SsdpCandidate,
};

use crate::sonos::types::Device;

/// Settings for a full discovery run.
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    pub ssdp: SsdpConfig,
    /// Per-description GET timeout.
    pub description_timeout: Duration,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            ssdp: SsdpConfig::default(),
            description_timeout: Duration::from_secs(3),
        }
    }
}

/// Runs the full discovery pipeline.
///
/// An empty result is a normal outcome (no speakers on this network).
///
/// # Errors
/// Only socket-level failures of the probe itself.
pub async fn discover_devices(
    client: &Client,
    config: &DiscoveryConfig,
) -> DiscoveryResult<Vec<Device>> {
    log::info!("[Discovery] Searching for speakers...");
    let candidates = probe(&config.ssdp).await?;
    let devices = resolve_candidates(client, &candidates, config.description_timeout).await;
    log::info!("[Discovery] Found {} speaker(s)", devices.len());
    for device in &devices {
        log::info!(
            "[Discovery]   - {} ({}, {})",
            device.name,
            device.ip,
            device.id.as_deref().unwrap_or("no id")
        );
    }
    Ok(devices)
}

/// Fetches every candidate's description concurrently and builds the device
/// list: deduplicated by display name keeping the first-seen, then sorted.
///
/// Returns only after every fetch has completed or timed out.
pub async fn resolve_candidates(
    client: &Client,
    candidates: &[SsdpCandidate],
    description_timeout: Duration,
) -> Vec<Device> {
    let resolved = futures::future::join_all(
        candidates
            .iter()
            .map(|c| resolve_candidate(client, c, description_timeout)),
    )
    .await;

    let mut devices = dedupe_by_name(resolved);
    devices.sort_by_cached_key(|d| d.name.to_lowercase());
    devices
}

/// Keeps the first device for each display name (and for each identifier).
///
/// Input order is arrival order, so "first" means first-seen.
pub fn dedupe_by_name(devices: Vec<Device>) -> Vec<Device> {
    let mut names = HashSet::new();
    let mut ids = HashSet::new();
    devices
        .into_iter()
        .filter(|d| {
            if !names.insert(d.name.clone()) {
                log::debug!("[Discovery] Dropping duplicate '{}' from {}", d.name, d.ip);
                return false;
            }
            match &d.id {
                Some(id) => ids.insert(id.clone()),
                None => true,
            }
        })
        .collect()
}

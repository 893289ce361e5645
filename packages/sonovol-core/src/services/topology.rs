//! Topology synchronizer.
//!
//! The only component that changes the topology cache. Forced refreshes
//! invalidate the cache before fetching, so stale data cannot hide a real
//! change; normal refreshes reuse a loaded cache. A failed fetch or parse
//! never partially overwrites what is already known.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use crate::error::SoapResult;
use crate::sonos::traits::SonosTopology;
use crate::sonos::types::ZoneGroup;
use crate::sonos::zone_groups::parse_topology_notify;
use crate::state::{SonosState, TopologyUpdate};

/// Outcome of a [`TopologySynchronizer::refresh`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// A complete topology replaced the cache.
    Replaced,
    /// The cache was already loaded; no network call was made.
    Cached,
    /// No device was known to query.
    NoDevices,
    /// Every device failed; the cache was left as it was.
    Failed,
}

/// Keeps the topology cache and the device coordinator fields in sync.
pub struct TopologySynchronizer {
    state: Arc<SonosState>,
    sonos: Arc<dyn SonosTopology>,
    refresh_notify: Notify,
}

impl TopologySynchronizer {
    pub fn new(state: Arc<SonosState>, sonos: Arc<dyn SonosTopology>) -> Self {
        Self {
            state,
            sonos,
            refresh_notify: Notify::new(),
        }
    }

    /// Refreshes the cache from the network.
    ///
    /// With `force` the cache is invalidated first; otherwise a loaded cache
    /// short-circuits the call. Devices are tried in order until one answers.
    pub async fn refresh(&self, force: bool) -> RefreshOutcome {
        if force {
            self.state.apply_topology(TopologyUpdate::Invalidate);
        } else if self.state.topology_loaded() {
            log::trace!("[Topology] Cache loaded, skipping fetch");
            return RefreshOutcome::Cached;
        }

        let devices = self.state.devices();
        if devices.is_empty() {
            log::debug!("[Topology] No known devices to query");
            return RefreshOutcome::NoDevices;
        }

        for device in &devices {
            match self.fetch(&device.ip).await {
                Ok(groups) => {
                    log::info!(
                        "[Topology] Loaded {} group(s) from {} ({})",
                        groups.len(),
                        device.name,
                        device.ip
                    );
                    self.state.apply_topology(TopologyUpdate::Replace(groups));
                    return RefreshOutcome::Replaced;
                }
                Err(e) => {
                    log::warn!(
                        "[Topology] Zone group query to {} ({}) failed: {}",
                        device.name,
                        device.ip,
                        e
                    );
                }
            }
        }

        log::warn!("[Topology] All devices failed, keeping existing cache");
        RefreshOutcome::Failed
    }

    async fn fetch(&self, ip: &str) -> SoapResult<Vec<ZoneGroup>> {
        self.sonos.get_zone_groups(ip).await
    }

    /// Merges a pushed ZoneGroupTopology NOTIFY body into the cache.
    ///
    /// Returns false if the body did not parse; the cache is then unchanged.
    pub fn apply_topology_notify(&self, body: &str) -> bool {
        match parse_topology_notify(body) {
            Ok(groups) => {
                log::debug!("[Topology] Merging {} pushed group(s)", groups.len());
                self.state.apply_topology(TopologyUpdate::Merge(groups));
                true
            }
            Err(e) => {
                log::warn!("[Topology] Ignoring unparseable topology event: {}", e);
                false
            }
        }
    }

    /// Wakes the monitor loop for an immediate refresh.
    pub fn trigger_refresh(&self) {
        self.refresh_notify.notify_one();
    }

    /// Periodic monitor: refreshes (normal mode) on every tick and on
    /// [`trigger_refresh`](Self::trigger_refresh), until cancelled.
    ///
    /// The normal mode only hits the network while the cache is not loaded,
    /// so pushed events keep it current between forced refreshes.
    pub async fn run_monitor(self: Arc<Self>, interval: Duration, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(interval);
        loop {
            let manual = tokio::select! {
                _ = cancel.cancelled() => {
                    log::info!("[Topology] Shutting down monitor");
                    break;
                }
                _ = ticker.tick() => false,
                _ = self.refresh_notify.notified() => true,
            };

            if manual {
                log::info!("[Topology] Manual refresh triggered");
                ticker.reset();
                self.refresh(true).await;
            } else {
                self.refresh(false).await;
            }
        }
    }
}

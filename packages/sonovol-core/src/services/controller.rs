//! Collaborator-facing controller.
//!
//! [`SonosController`] is the one object a front end talks to: it lists
//! devices and groups, reads and writes volume and mute, selects the active
//! device, forms and dissolves groups, and (once [`started`](SonosController::start))
//! keeps the model current from GENA events.

use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::api::{start_notify_listener, NotifyListener};
use crate::context::NetworkContext;
use crate::error::{CoreError, CoreResult, SoapResult};
use crate::events::{ControllerEvent, EventEmitter, TopologyEvent};
use crate::services::orchestrator::{GroupOrchestrator, GroupPlan};
use crate::services::source_detector::SourceDetector;
use crate::services::subscriptions::{
    spawn_subscription_manager, SubscriptionConfig, SubscriptionHandle, SubscriptionInfo,
    SubscriptionStreams,
};
use crate::services::topology::TopologySynchronizer;
use crate::sonos::gena_client::GenaTransport;
use crate::sonos::services::ServiceKind;
use crate::sonos::traits::{SonosClient, SonosDiscovery, SonosVolumeControl};
use crate::sonos::types::{Device, Group};
use crate::sonos::volume::{apply_delta, clamp_volume};
use crate::state::{CoreConfig, SonosState};
use crate::utils::now_millis;

/// What a volume or mute command addresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// One speaker, by id, name or IP.
    Device(String),
    /// The group containing this speaker; commands go to its coordinator.
    Group(String),
}

impl Target {
    fn name(&self) -> &str {
        match self {
            Self::Device(name) | Self::Group(name) => name,
        }
    }
}

/// Background services that exist only while the live model runs.
struct LiveServices {
    cancel: CancellationToken,
    subscriptions: SubscriptionHandle,
    listener: NotifyListener,
    tasks: Vec<JoinHandle<()>>,
}

/// Facade over discovery, topology, volume and grouping.
pub struct SonosController {
    config: CoreConfig,
    state: Arc<SonosState>,
    discovery: Arc<dyn SonosDiscovery>,
    volume: Arc<dyn SonosVolumeControl>,
    gena: Arc<dyn GenaTransport>,
    emitter: Arc<dyn EventEmitter>,
    topology: Arc<TopologySynchronizer>,
    orchestrator: GroupOrchestrator,
    /// Held across the whole of `start` so concurrent starts cannot both spawn.
    live: Mutex<Option<LiveServices>>,
}

impl SonosController {
    pub fn new<C>(
        sonos: Arc<C>,
        gena: Arc<dyn GenaTransport>,
        state: Arc<SonosState>,
        emitter: Arc<dyn EventEmitter>,
        config: CoreConfig,
    ) -> Self
    where
        C: SonosClient + 'static,
    {
        let topology = Arc::new(TopologySynchronizer::new(state.clone(), sonos.clone()));
        let detector = SourceDetector::new(sonos.clone(), config.source_detection_timeout());
        let orchestrator = GroupOrchestrator::new(
            state.clone(),
            sonos.clone(),
            detector,
            topology.clone(),
            config.settle_delay(),
        );
        Self {
            discovery: sonos.clone(),
            volume: sonos,
            gena,
            state,
            emitter,
            topology,
            orchestrator,
            config,
            live: Mutex::new(None),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Devices
    // ─────────────────────────────────────────────────────────────────────────

    /// Runs discovery and replaces the device list.
    ///
    /// Emits `DiscoveryStarted`, then `DevicesDiscovered` with the sorted,
    /// deduplicated list (possibly empty). Topology is refreshed in normal
    /// mode, the preferred device is auto-selected when nothing valid is
    /// selected, and new devices are subscribed while the live model runs.
    ///
    /// # Errors
    /// Socket-level discovery failures. `DevicesDiscovered` is not emitted then.
    pub async fn discover(&self) -> CoreResult<Vec<Device>> {
        self.emitter.emit(ControllerEvent::DiscoveryStarted {
            timestamp: now_millis(),
        });

        let found = self.discovery.discover_devices().await?;
        log::info!("[Controller] Discovered {} device(s)", found.len());
        self.state.set_devices(found);
        self.topology.refresh(false).await;
        self.auto_select_preferred();

        let subscriptions = self.live.lock().await.as_ref().map(|l| l.subscriptions.clone());
        if let Some(handle) = subscriptions {
            subscribe_all(&handle, &self.state.devices()).await;
        }

        let devices = self.state.devices();
        self.emitter.emit(ControllerEvent::DevicesDiscovered {
            devices: devices.clone(),
            timestamp: now_millis(),
        });
        Ok(devices)
    }

    fn auto_select_preferred(&self) {
        let Some(preferred) = self.config.preferred_device.as_deref() else {
            return;
        };
        let current_valid = self
            .state
            .selected()
            .is_some_and(|id| self.state.device(&id).is_some());
        if current_valid {
            return;
        }
        if let Some(device) = self.state.device(preferred) {
            log::info!("[Controller] Auto-selecting preferred device {}", device.name);
            self.state.select(Some(device.key().to_string()));
        }
    }

    /// Current devices, sorted by name.
    #[must_use]
    pub fn devices(&self) -> Vec<Device> {
        self.state.devices()
    }

    /// Current groups.
    #[must_use]
    pub fn groups(&self) -> Vec<Group> {
        self.state.groups()
    }

    /// Configuration the controller was built with.
    #[must_use]
    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    /// Shared model, for front ends that render it directly.
    #[must_use]
    pub fn state(&self) -> &Arc<SonosState> {
        &self.state
    }

    fn find(&self, id_or_name: &str) -> CoreResult<Device> {
        self.state
            .device(id_or_name)
            .ok_or_else(|| CoreError::SpeakerNotFound(id_or_name.to_string()))
    }

    /// The coordinator of `device`'s group, or `device` itself.
    fn coordinator_of(&self, device: Device) -> Device {
        device
            .coordinator_id
            .as_deref()
            .filter(|c| Some(*c) != device.id.as_deref())
            .and_then(|c| self.state.device(c))
            .unwrap_or(device)
    }

    /// Resolves a target to the device that receives the command.
    fn resolve(&self, target: &Target) -> CoreResult<Device> {
        let device = self.find(target.name())?;
        Ok(match target {
            Target::Device(_) => device,
            Target::Group(_) => self.coordinator_of(device),
        })
    }

    /// Selects the active device and returns its volume.
    ///
    /// # Errors
    /// [`CoreError::SpeakerNotFound`]. A failed volume read yields `Ok(None)`.
    pub async fn select_device(&self, id_or_name: &str) -> CoreResult<Option<u8>> {
        let device = self.find(id_or_name)?;
        log::info!("[Controller] Selected {}", device.name);
        self.state.select(Some(device.key().to_string()));
        self.get_volume(&Target::Device(device.key().to_string())).await
    }

    /// The active device, if one is selected and still known.
    #[must_use]
    pub fn selected_device(&self) -> Option<Device> {
        self.state.selected().and_then(|id| self.state.device(&id))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Volume & Mute
    // ─────────────────────────────────────────────────────────────────────────

    /// Reads the volume of a device or group.
    ///
    /// # Errors
    /// Only [`CoreError::SpeakerNotFound`]; query failures yield `Ok(None)`.
    pub async fn get_volume(&self, target: &Target) -> CoreResult<Option<u8>> {
        let device = self.resolve(target)?;
        let result = match target {
            Target::Device(_) => self.volume.get_speaker_volume(&device.ip).await,
            Target::Group(_) => self.volume.get_group_volume(&device.ip).await,
        };
        Ok(absorb(result, "volume", &device))
    }

    /// Sets the volume of a device or group, clamped to 0..=100.
    ///
    /// Returns the level that was sent and emits `VolumeChanged`.
    ///
    /// # Errors
    /// Unknown target or a failed control call.
    pub async fn set_volume(&self, target: &Target, level: i32) -> CoreResult<u8> {
        let device = self.resolve(target)?;
        let level = clamp_volume(level);
        match target {
            Target::Device(_) => self.volume.set_speaker_volume(&device.ip, level).await?,
            Target::Group(_) => self.volume.set_group_volume(&device.ip, level).await?,
        }
        log::info!("[Controller] Volume of {} set to {}", device.name, level);
        self.emit_volume(&device, Some(level), None);
        Ok(level)
    }

    /// Reads the mute state of a device or group.
    ///
    /// # Errors
    /// Only [`CoreError::SpeakerNotFound`]; query failures yield `Ok(None)`.
    pub async fn get_mute(&self, target: &Target) -> CoreResult<Option<bool>> {
        let device = self.resolve(target)?;
        let result = match target {
            Target::Device(_) => self.volume.get_speaker_mute(&device.ip).await,
            Target::Group(_) => self.volume.get_group_mute(&device.ip).await,
        };
        Ok(absorb(result, "mute", &device))
    }

    /// Sets the mute state of a device or group and emits `VolumeChanged`.
    ///
    /// # Errors
    /// Unknown target or a failed control call.
    pub async fn set_mute(&self, target: &Target, mute: bool) -> CoreResult<()> {
        let device = self.resolve(target)?;
        match target {
            Target::Device(_) => self.volume.set_speaker_mute(&device.ip, mute).await?,
            Target::Group(_) => self.volume.set_group_mute(&device.ip, mute).await?,
        }
        log::info!("[Controller] Mute of {} set to {}", device.name, mute);
        self.emit_volume(&device, None, Some(mute));
        Ok(())
    }

    /// Inverts the mute state and returns the new value.
    ///
    /// # Errors
    /// Unknown target, or the current state could not be read or written.
    pub async fn toggle_mute(&self, target: &Target) -> CoreResult<bool> {
        let device = self.resolve(target)?;
        let current = match target {
            Target::Device(_) => self.volume.get_speaker_mute(&device.ip).await?,
            Target::Group(_) => self.volume.get_group_mute(&device.ip).await?,
        };
        self.set_mute(target, !current).await?;
        Ok(!current)
    }

    /// Reads the volume, applies `delta` clamped to 0..=100 and writes it.
    ///
    /// # Errors
    /// Unknown target, or the volume could not be read or written.
    pub async fn change_volume(&self, target: &Target, delta: i32) -> CoreResult<u8> {
        let device = self.resolve(target)?;
        let current = match target {
            Target::Device(_) => self.volume.get_speaker_volume(&device.ip).await?,
            Target::Group(_) => self.volume.get_group_volume(&device.ip).await?,
        };
        let next = apply_delta(current, delta);
        self.set_volume(target, i32::from(next)).await
    }

    /// Raises the volume by the configured step.
    ///
    /// # Errors
    /// See [`change_volume`](Self::change_volume).
    pub async fn volume_up(&self, target: &Target) -> CoreResult<u8> {
        self.change_volume(target, i32::from(self.config.volume_step))
            .await
    }

    /// Lowers the volume by the configured step.
    ///
    /// # Errors
    /// See [`change_volume`](Self::change_volume).
    pub async fn volume_down(&self, target: &Target) -> CoreResult<u8> {
        self.change_volume(target, -i32::from(self.config.volume_step))
            .await
    }

    fn emit_volume(&self, device: &Device, volume: Option<u8>, muted: Option<bool>) {
        self.emitter.emit(ControllerEvent::VolumeChanged {
            device_id: device.key().to_string(),
            volume,
            muted,
            timestamp: now_millis(),
        });
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Grouping
    // ─────────────────────────────────────────────────────────────────────────

    /// Groups the named devices, optionally around an explicit coordinator.
    ///
    /// # Errors
    /// [`CoreError::SpeakerNotFound`] for an unknown name, otherwise the
    /// orchestrator's [`GroupingError`](crate::error::GroupingError).
    pub async fn create_group(
        &self,
        names: &[String],
        coordinator: Option<&str>,
    ) -> CoreResult<GroupPlan> {
        let devices = names
            .iter()
            .map(|n| self.find(n))
            .collect::<CoreResult<Vec<_>>>()?;
        Ok(self
            .orchestrator
            .create_group(&devices, coordinator)
            .await?)
    }

    /// Dissolves the group containing the named device.
    ///
    /// # Errors
    /// Unknown device, a device that is not grouped, or a failed command.
    pub async fn dissolve_group(&self, id_or_name: &str) -> CoreResult<()> {
        let device = self.find(id_or_name)?;
        let group = self
            .state
            .group_of(device.key())
            .filter(|g| g.members.len() > 1)
            .ok_or_else(|| CoreError::InvalidRequest(format!("{} is not grouped", device.name)))?;
        Ok(self.orchestrator.dissolve_group(&group).await?)
    }

    /// Takes the named device out of its group.
    ///
    /// # Errors
    /// Unknown device or a failed command.
    pub async fn remove_from_group(&self, id_or_name: &str) -> CoreResult<()> {
        let device = self.find(id_or_name)?;
        Ok(self.orchestrator.remove_member(&device).await?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Live model
    // ─────────────────────────────────────────────────────────────────────────

    /// Starts the NOTIFY listener, the subscription manager, the event pump
    /// and the topology monitor, then subscribes every known device.
    ///
    /// A second call while running, or while another call is still starting,
    /// is a no-op.
    ///
    /// # Errors
    /// [`CoreError::Configuration`] if the listener cannot bind.
    pub async fn start(&self, network: NetworkContext) -> CoreResult<()> {
        let mut live = self.live.lock().await;
        if live.is_some() {
            return Ok(());
        }

        let cancel = CancellationToken::new();
        let (handle, notify_tx, streams) = spawn_subscription_manager(
            self.gena.clone(),
            network.clone(),
            self.emitter.clone(),
            SubscriptionConfig {
                timeout_secs: self.config.subscription_timeout_secs,
                renewal_fraction: self.config.renewal_fraction,
                notify_capacity: self.config.notify_queue_capacity,
            },
        );

        let listener = match start_notify_listener(
            self.config.notify_bind_addr,
            network,
            notify_tx,
            cancel.clone(),
        )
        .await
        {
            Ok(listener) => listener,
            Err(e) => {
                handle.shutdown().await;
                return Err(CoreError::Configuration(e.to_string()));
            }
        };

        let pump = tokio::spawn(run_event_pump(
            streams,
            handle.clone(),
            self.topology.clone(),
            self.state.clone(),
            cancel.clone(),
        ));
        let monitor = tokio::spawn(
            self.topology
                .clone()
                .run_monitor(self.config.topology_refresh_interval(), cancel.clone()),
        );

        subscribe_all(&handle, &self.state.devices()).await;

        *live = Some(LiveServices {
            cancel,
            subscriptions: handle,
            listener,
            tasks: vec![pump, monitor],
        });
        log::info!("[Controller] Live model started");
        Ok(())
    }

    /// Current subscriptions; empty when the live model is not running.
    pub async fn subscriptions(&self) -> Vec<SubscriptionInfo> {
        let handle = self.live.lock().await.as_ref().map(|l| l.subscriptions.clone());
        match handle {
            Some(handle) => handle.list().await.unwrap_or_default(),
            None => Vec::new(),
        }
    }

    /// Requests an immediate forced topology refresh from the monitor.
    pub fn trigger_refresh(&self) {
        self.topology.trigger_refresh();
    }

    /// Stops the live model: background loops end, renewals are cancelled,
    /// every subscription is dropped and the listener closes.
    pub async fn shutdown(&self) {
        let Some(live) = self.live.lock().await.take() else {
            return;
        };
        log::info!("[Controller] Shutting down live model...");
        live.cancel.cancel();
        live.subscriptions.shutdown().await;
        live.listener.join().await;
        for task in live.tasks {
            if let Err(e) = task.await {
                log::warn!("[Controller] Background task ended abnormally: {}", e);
            }
        }
        log::info!("[Controller] Shutdown complete");
    }
}

fn absorb<T>(result: SoapResult<T>, what: &str, device: &Device) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            log::warn!("[Controller] Could not read {} of {}: {}", what, device.name, e);
            None
        }
    }
}

/// Subscribes every identified device to every event kind. Failures are
/// logged; the device keeps working without live updates.
async fn subscribe_all(handle: &SubscriptionHandle, devices: &[Device]) {
    for device in devices {
        let Some(id) = device.id.as_deref() else {
            log::debug!("[Controller] {} has no identifier, not subscribing", device.name);
            continue;
        };
        for kind in ServiceKind::ALL {
            if let Err(e) = handle.subscribe(id, device.ip.as_str(), kind).await {
                log::warn!(
                    "[Controller] Subscribing {} to {} failed: {}",
                    device.name,
                    kind,
                    e
                );
            }
        }
    }
}

/// Drops an expired subscription and subscribes the same device and kind
/// once more.
async fn resubscribe_expired(handle: &SubscriptionHandle, sid: &str) {
    let record = handle
        .list()
        .await
        .ok()
        .and_then(|list| list.into_iter().find(|s| s.sid == sid));
    if let Err(e) = handle.unsubscribe(sid).await {
        log::debug!("[Controller] Dropping expired {}: {}", sid, e);
    }
    let Some(record) = record else {
        return;
    };
    match handle
        .subscribe(record.device_id.as_str(), record.ip.as_str(), record.kind)
        .await
    {
        Ok(new_sid) => log::info!(
            "[Controller] Resubscribed {} on {} as {}",
            record.kind,
            record.device_id,
            new_sid
        ),
        Err(e) => log::warn!(
            "[Controller] Resubscribing {} on {} failed: {}",
            record.kind,
            record.device_id,
            e
        ),
    }
}

/// Applies subscription events to the model until cancelled.
async fn run_event_pump(
    mut streams: SubscriptionStreams,
    handle: SubscriptionHandle,
    topology: Arc<TopologySynchronizer>,
    state: Arc<SonosState>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            Some(event) = streams.topology.recv() => match event {
                TopologyEvent::Changed { device_id, body, .. } => {
                    log::debug!("[Controller] Topology change reported by {}", device_id);
                    topology.apply_topology_notify(&body);
                }
                TopologyEvent::SubscriptionExpired { sid } => {
                    resubscribe_expired(&handle, &sid).await;
                }
            },
            Some(event) = streams.transport.recv() => {
                state.annotate_source(
                    &event.device_id,
                    event.change.source(),
                    event.change.transport_state,
                );
            }
            else => break,
        }
    }
    log::debug!("[Controller] Event pump stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{DiscoveryResult, SoapError};
    use crate::events::emitter::tests::RecordingEmitter;
    use crate::services::topology::tests::{known_devices, TWO_GROUPS_XML};
    use crate::sonos::gena_client::{GenaResult, SubscribeResponse};
    use crate::sonos::services::SonosService;
    use crate::sonos::test_fixtures::TOPOLOGY_NOTIFY_TWO_GROUPS;
    use crate::sonos::traits::{SonosGrouping, SonosTopology, SonosTransport};
    use crate::sonos::transport::PositionInfo;
    use crate::sonos::types::{TransportState, ZoneGroup};
    use crate::sonos::zone_groups::parse_zone_group_xml;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::{HashMap, HashSet};
    use std::net::IpAddr;
    use std::time::Duration;

    const STANDALONE_XML: &str = r#"<ZoneGroupState><ZoneGroups>
<ZoneGroup Coordinator="RINCON_KITCHEN01400" ID="K:1"><ZoneGroupMember UUID="RINCON_KITCHEN01400" ZoneName="Kitchen"/></ZoneGroup>
<ZoneGroup Coordinator="RINCON_LIVING01400" ID="L:1"><ZoneGroupMember UUID="RINCON_LIVING01400" ZoneName="Living Room"/></ZoneGroup>
<ZoneGroup Coordinator="RINCON_DEN01400" ID="D:1"><ZoneGroupMember UUID="RINCON_DEN01400" ZoneName="Den"/></ZoneGroup>
<ZoneGroup Coordinator="RINCON_OFFICE01400" ID="O:1"><ZoneGroupMember UUID="RINCON_OFFICE01400" ZoneName="Office"/></ZoneGroup>
</ZoneGroups></ZoneGroupState>"#;

    const STEREO_PAIR_XML: &str = r#"<ZoneGroupState><ZoneGroups>
<ZoneGroup Coordinator="RINCON_KITCHEN01400" ID="K:1"><ZoneGroupMember UUID="RINCON_KITCHEN01400" ZoneName="Kitchen"/></ZoneGroup>
<ZoneGroup Coordinator="RINCON_LIVING01400" ID="L:1"><ZoneGroupMember UUID="RINCON_LIVING01400" ZoneName="Living Room" ChannelMapSet="RINCON_LIVING01400:LF,LF;RINCON_LIVINGR01400:RF,RF"/><ZoneGroupMember UUID="RINCON_LIVINGR01400" Location="http://10.0.0.9:1400/xml/device_description.xml" ZoneName="Living Room" ChannelMapSet="RINCON_LIVING01400:LF,LF;RINCON_LIVINGR01400:RF,RF" Invisible="1"/></ZoneGroup>
<ZoneGroup Coordinator="RINCON_DEN01400" ID="D:1"><ZoneGroupMember UUID="RINCON_DEN01400" ZoneName="Den"/></ZoneGroup>
<ZoneGroup Coordinator="RINCON_OFFICE01400" ID="O:1"><ZoneGroupMember UUID="RINCON_OFFICE01400" ZoneName="Office"/></ZoneGroup>
</ZoneGroups></ZoneGroupState>"#;

    struct FakeSonos {
        topology_xml: &'static str,
        speaker_volume: Mutex<HashMap<String, u8>>,
        group_volume: Mutex<HashMap<String, u8>>,
        mute: Mutex<HashMap<String, bool>>,
        failing: Mutex<HashSet<String>>,
    }

    impl FakeSonos {
        fn new(topology_xml: &'static str) -> Self {
            Self {
                topology_xml,
                speaker_volume: Mutex::new(HashMap::new()),
                group_volume: Mutex::new(HashMap::new()),
                mute: Mutex::new(HashMap::new()),
                failing: Mutex::new(HashSet::new()),
            }
        }

        fn check(&self, ip: &str) -> SoapResult<()> {
            if self.failing.lock().contains(ip) {
                Err(SoapError::Timeout)
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl SonosDiscovery for FakeSonos {
        async fn discover_devices(&self) -> DiscoveryResult<Vec<Device>> {
            Ok(known_devices())
        }
    }

    #[async_trait]
    impl SonosTopology for FakeSonos {
        async fn get_zone_groups(&self, _ip: &str) -> SoapResult<Vec<ZoneGroup>> {
            parse_zone_group_xml(self.topology_xml)
        }
    }

    #[async_trait]
    impl SonosTransport for FakeSonos {
        async fn get_transport_info(&self, _ip: &str) -> SoapResult<TransportState> {
            Ok(TransportState::Stopped)
        }

        async fn get_position_info(&self, _ip: &str) -> SoapResult<PositionInfo> {
            Ok(PositionInfo::default())
        }
    }

    #[async_trait]
    impl SonosGrouping for FakeSonos {
        async fn add_member(&self, ip: &str, _coordinator_uuid: &str) -> SoapResult<()> {
            self.check(ip)
        }

        async fn remove_member(&self, ip: &str) -> SoapResult<()> {
            self.check(ip)
        }
    }

    #[async_trait]
    impl SonosVolumeControl for FakeSonos {
        async fn get_speaker_volume(&self, ip: &str) -> SoapResult<u8> {
            self.check(ip)?;
            Ok(*self.speaker_volume.lock().get(ip).unwrap_or(&20))
        }

        async fn set_speaker_volume(&self, ip: &str, volume: u8) -> SoapResult<()> {
            self.check(ip)?;
            self.speaker_volume.lock().insert(ip.into(), volume);
            Ok(())
        }

        async fn get_speaker_mute(&self, ip: &str) -> SoapResult<bool> {
            self.check(ip)?;
            Ok(*self.mute.lock().get(ip).unwrap_or(&false))
        }

        async fn set_speaker_mute(&self, ip: &str, mute: bool) -> SoapResult<()> {
            self.check(ip)?;
            self.mute.lock().insert(ip.into(), mute);
            Ok(())
        }

        async fn get_group_volume(&self, ip: &str) -> SoapResult<u8> {
            self.check(ip)?;
            Ok(*self.group_volume.lock().get(ip).unwrap_or(&20))
        }

        async fn set_group_volume(&self, ip: &str, volume: u8) -> SoapResult<()> {
            self.check(ip)?;
            self.group_volume.lock().insert(ip.into(), volume);
            Ok(())
        }

        async fn get_group_mute(&self, ip: &str) -> SoapResult<bool> {
            self.get_speaker_mute(ip).await
        }

        async fn set_group_mute(&self, ip: &str, mute: bool) -> SoapResult<()> {
            self.set_speaker_mute(ip, mute).await
        }
    }

    #[derive(Default)]
    struct FakeGena {
        subscribed: Mutex<Vec<String>>,
        unsubscribed: Mutex<Vec<String>>,
        subscribe_delay: Duration,
    }

    #[async_trait]
    impl GenaTransport for FakeGena {
        async fn subscribe(
            &self,
            ip: &str,
            service: SonosService,
            _callback_url: &str,
            timeout_secs: u64,
        ) -> GenaResult<SubscribeResponse> {
            if !self.subscribe_delay.is_zero() {
                tokio::time::sleep(self.subscribe_delay).await;
            }
            let mut subscribed = self.subscribed.lock();
            let sid = format!("uuid:{}-{}-{}", ip, service.name(), subscribed.len());
            subscribed.push(sid.clone());
            Ok(SubscribeResponse { sid, timeout_secs })
        }

        async fn renew(
            &self,
            _ip: &str,
            _service: SonosService,
            _sid: &str,
            timeout_secs: u64,
        ) -> GenaResult<u64> {
            Ok(timeout_secs)
        }

        async fn unsubscribe(&self, _ip: &str, _service: SonosService, sid: &str) -> bool {
            self.unsubscribed.lock().push(sid.to_string());
            true
        }
    }

    struct Harness {
        sonos: Arc<FakeSonos>,
        gena: Arc<FakeGena>,
        emitter: Arc<RecordingEmitter>,
        controller: SonosController,
    }

    fn harness(topology_xml: &'static str, config: CoreConfig) -> Harness {
        harness_with_gena(topology_xml, config, FakeGena::default())
    }

    fn harness_with_gena(topology_xml: &'static str, config: CoreConfig, gena: FakeGena) -> Harness {
        let sonos = Arc::new(FakeSonos::new(topology_xml));
        let gena = Arc::new(gena);
        let emitter = Arc::new(RecordingEmitter::default());
        let controller = SonosController::new(
            sonos.clone(),
            gena.clone(),
            Arc::new(SonosState::default()),
            emitter.clone(),
            config,
        );
        Harness {
            sonos,
            gena,
            emitter,
            controller,
        }
    }

    fn device(name: &str) -> Target {
        Target::Device(name.into())
    }

    #[tokio::test]
    async fn discover_emits_events_and_selects_preferred() {
        let h = harness(
            TWO_GROUPS_XML,
            CoreConfig {
                preferred_device: Some("office".into()),
                ..CoreConfig::default()
            },
        );

        let devices = h.controller.discover().await.unwrap();

        let names: Vec<&str> = devices.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["Den", "Kitchen", "Living Room", "Office"]);
        let events = h.emitter.events.lock().clone();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], ControllerEvent::DiscoveryStarted { .. }));
        match &events[1] {
            ControllerEvent::DevicesDiscovered { devices, .. } => assert_eq!(devices.len(), 4),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(
            h.controller.selected_device().unwrap().id.as_deref(),
            Some("RINCON_OFFICE01400")
        );
        assert_eq!(h.controller.groups().len(), 2);
        assert_eq!(
            h.controller.state().device("Office").unwrap().coordinator_id.as_deref(),
            Some("RINCON_LIVING01400")
        );
    }

    #[tokio::test]
    async fn volume_steps_clamp_and_emit() {
        let h = harness(TWO_GROUPS_XML, CoreConfig::default());
        h.controller.discover().await.unwrap();
        h.sonos.speaker_volume.lock().insert("10.0.0.2".into(), 98);

        assert_eq!(h.controller.volume_up(&device("Kitchen")).await.unwrap(), 100);
        assert_eq!(h.controller.change_volume(&device("Kitchen"), -250).await.unwrap(), 0);
        assert_eq!(h.controller.set_volume(&device("Kitchen"), 140).await.unwrap(), 100);
        assert_eq!(h.sonos.speaker_volume.lock()["10.0.0.2"], 100);

        let events = h.emitter.events.lock().clone();
        assert!(matches!(
            events.last(),
            Some(ControllerEvent::VolumeChanged { device_id, volume: Some(100), muted: None, .. })
                if device_id == "RINCON_KITCHEN01400"
        ));
    }

    #[tokio::test]
    async fn group_commands_go_to_the_coordinator() {
        let h = harness(TWO_GROUPS_XML, CoreConfig::default());
        h.controller.discover().await.unwrap();

        h.controller
            .set_volume(&Target::Group("Den".into()), 30)
            .await
            .unwrap();
        assert_eq!(h.sonos.group_volume.lock().get("10.0.0.3"), Some(&30));
        assert_eq!(
            h.controller.get_volume(&Target::Group("Office".into())).await.unwrap(),
            Some(30)
        );
    }

    #[tokio::test]
    async fn failed_reads_are_absorbed_and_unknown_names_are_errors() {
        let h = harness(TWO_GROUPS_XML, CoreConfig::default());
        h.controller.discover().await.unwrap();
        h.sonos.failing.lock().insert("10.0.0.4".into());

        assert_eq!(h.controller.select_device("Den").await.unwrap(), None);
        assert_eq!(h.controller.selected_device().unwrap().name, "Den");
        assert_eq!(h.controller.get_mute(&device("Den")).await.unwrap(), None);
        assert!(matches!(
            h.controller.get_volume(&device("Attic")).await,
            Err(CoreError::SpeakerNotFound(_))
        ));
        assert!(matches!(
            h.controller.change_volume(&device("Den"), 5).await,
            Err(CoreError::Network(_))
        ));
    }

    #[tokio::test]
    async fn toggle_mute_inverts() {
        let h = harness(TWO_GROUPS_XML, CoreConfig::default());
        h.controller.discover().await.unwrap();

        assert!(h.controller.toggle_mute(&device("Kitchen")).await.unwrap());
        assert!(!h.controller.toggle_mute(&device("Kitchen")).await.unwrap());
        assert_eq!(h.sonos.mute.lock().get("10.0.0.2"), Some(&false));
    }

    #[tokio::test(start_paused = true)]
    async fn dissolving_a_standalone_device_is_rejected() {
        let h = harness(STANDALONE_XML, CoreConfig::default());
        h.controller.discover().await.unwrap();

        assert!(matches!(
            h.controller.dissolve_group("Kitchen").await,
            Err(CoreError::InvalidRequest(_))
        ));
        let plan = h
            .controller
            .create_group(&["Kitchen".to_string(), "Den".to_string()], Some("Den"))
            .await
            .unwrap();
        assert_eq!(plan.coordinator.name, "Den");
    }

    #[tokio::test(start_paused = true)]
    async fn standalone_stereo_pair_is_not_a_group() {
        let h = harness(STEREO_PAIR_XML, CoreConfig::default());
        h.controller.discover().await.unwrap();

        let living = h.controller.state().group_of("RINCON_LIVING01400").unwrap();
        assert_eq!(living.members, vec!["RINCON_LIVING01400".to_string()]);
        assert!(h.controller.groups().iter().all(|g| g.members.len() == 1));
        assert!(matches!(
            h.controller.dissolve_group("Living Room").await,
            Err(CoreError::InvalidRequest(_))
        ));
        assert_eq!(
            h.controller.state().device("Living Room").unwrap().stereo_pair.as_deref(),
            Some("RINCON_LIVING01400")
        );
    }

    #[tokio::test]
    async fn expired_subscription_is_replaced_once() {
        let gena = Arc::new(FakeGena::default());
        let network = NetworkContext::explicit(IpAddr::from([127, 0, 0, 1]));
        network.set_port(1400);
        let (handle, _notify_tx, _streams) = spawn_subscription_manager(
            gena.clone(),
            network,
            Arc::new(RecordingEmitter::default()),
            SubscriptionConfig::default(),
        );
        let sid = handle
            .subscribe("RINCON_A", "10.0.0.2", ServiceKind::Transport)
            .await
            .unwrap();

        resubscribe_expired(&handle, &sid).await;

        assert_eq!(*gena.unsubscribed.lock(), vec![sid.clone()]);
        let list = handle.list().await.unwrap();
        assert_eq!(list.len(), 1);
        assert_ne!(list[0].sid, sid);
        assert_eq!(list[0].kind, ServiceKind::Transport);
        assert_eq!(list[0].device_id, "RINCON_A");
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn live_model_follows_topology_notifies() {
        let h = harness(
            STANDALONE_XML,
            CoreConfig {
                notify_bind_addr: IpAddr::from([127, 0, 0, 1]),
                ..CoreConfig::default()
            },
        );
        h.controller.discover().await.unwrap();
        assert_eq!(h.controller.groups().len(), 4);

        let network = NetworkContext::explicit(IpAddr::from([127, 0, 0, 1]));
        h.controller.start(network.clone()).await.unwrap();
        assert_eq!(h.gena.subscribed.lock().len(), 12);
        assert_eq!(h.controller.subscriptions().await.len(), 12);

        let topology_sid = h
            .gena
            .subscribed
            .lock()
            .iter()
            .find(|sid| sid.contains("ZoneGroupTopology"))
            .cloned()
            .unwrap();
        let response = reqwest::Client::new()
            .request(
                reqwest::Method::from_bytes(b"NOTIFY").unwrap(),
                network.callback_url().unwrap(),
            )
            .header("SID", topology_sid)
            .body(TOPOLOGY_NOTIFY_TWO_GROUPS)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);

        let state = h.controller.state().clone();
        let merged = tokio::time::timeout(Duration::from_secs(5), async move {
            loop {
                let office = state.device("Office").unwrap();
                if office.coordinator_id.as_deref() == Some("RINCON_LIVING01400") {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await;
        assert!(merged.is_ok());
        assert_eq!(h.controller.groups().len(), 2);

        h.controller.shutdown().await;
        assert_eq!(h.gena.unsubscribed.lock().len(), 12);
        assert_eq!(network.callback_url(), None);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_starts_run_one_live_model() {
        let h = harness_with_gena(
            STANDALONE_XML,
            CoreConfig {
                notify_bind_addr: IpAddr::from([127, 0, 0, 1]),
                ..CoreConfig::default()
            },
            FakeGena {
                subscribe_delay: Duration::from_millis(5),
                ..FakeGena::default()
            },
        );
        h.controller.discover().await.unwrap();

        let network = NetworkContext::explicit(IpAddr::from([127, 0, 0, 1]));
        let (first, second) = tokio::join!(
            h.controller.start(network.clone()),
            h.controller.start(network.clone())
        );
        first.unwrap();
        second.unwrap();
        assert_eq!(h.gena.subscribed.lock().len(), 12);
        assert_eq!(h.controller.subscriptions().await.len(), 12);

        h.controller.shutdown().await;
        assert_eq!(h.gena.unsubscribed.lock().len(), 12);
        assert_eq!(network.callback_url(), None);

        // The model can be started again after a shutdown.
        h.controller.start(network.clone()).await.unwrap();
        assert_eq!(h.controller.subscriptions().await.len(), 12);
        h.controller.shutdown().await;
    }
}

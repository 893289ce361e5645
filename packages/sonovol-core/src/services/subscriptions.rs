//! GENA subscription manager.
//!
//! A single actor task owns the subscription table. It drains two queues:
//! commands from [`SubscriptionHandle`]s (subscribe, unsubscribe, renewal
//! timers) and [`NotifyMessage`]s pushed by the NOTIFY listener. Nothing else
//! touches the table, so a renewal firing can never race an explicit
//! subscribe or unsubscribe.
//!
//! State of one record:
//!
//! ```text
//! Subscribing ─> Active ─> Renewing ─> Active
//!                               └────> Expired (SubscriptionExpired emitted)
//! any ─> (unsubscribe) ─> removed
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::context::NetworkContext;
use crate::events::{ControllerEvent, EventEmitter, TopologyEvent, TransportEvent};
use crate::protocol_constants::SUBSCRIPTION_COMMAND_CAPACITY;
use crate::sonos::gena_client::{GenaError, GenaResult, GenaTransport};
use crate::sonos::gena_parser::{parse_rendering_notify, parse_transport_notify};
use crate::sonos::services::ServiceKind;
use crate::utils::now_millis;

/// A NOTIFY request handed from the listener to the subscription owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotifyMessage {
    pub sid: String,
    pub body: String,
}

/// Tunables of the subscription manager.
#[derive(Debug, Clone, Copy)]
pub struct SubscriptionConfig {
    /// Timeout requested from speakers (seconds).
    pub timeout_secs: u64,
    /// Fraction of the granted timeout after which a renewal fires.
    pub renewal_fraction: f64,
    /// Capacity of the NOTIFY queue.
    pub notify_capacity: usize,
}

impl Default for SubscriptionConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 1800,
            renewal_fraction: crate::protocol_constants::GENA_RENEWAL_FRACTION,
            notify_capacity: 64,
        }
    }
}

impl SubscriptionConfig {
    /// Delay until the renewal of a subscription granted `granted_secs`.
    #[must_use]
    pub fn renewal_delay(&self, granted_secs: u64) -> Duration {
        let millis = (granted_secs.saturating_mul(1000) as f64 * self.renewal_fraction).round();
        Duration::from_millis(millis as u64)
    }
}

/// Lifecycle state of a subscription record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SubscriptionState {
    Active,
    Renewing,
    Expired,
}

/// Read-only view of a subscription record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionInfo {
    pub sid: String,
    pub device_id: String,
    pub ip: String,
    pub kind: ServiceKind,
    pub state: SubscriptionState,
    /// Time left until the speaker drops the subscription.
    #[serde(skip)]
    pub expires_in: Duration,
}

struct Subscription {
    device_id: String,
    ip: String,
    kind: ServiceKind,
    expires_at: Instant,
    state: SubscriptionState,
    renewal: Option<JoinHandle<()>>,
}

impl Subscription {
    fn cancel_renewal(&mut self) {
        if let Some(handle) = self.renewal.take() {
            handle.abort();
        }
    }

    fn info(&self, sid: &str) -> SubscriptionInfo {
        SubscriptionInfo {
            sid: sid.to_string(),
            device_id: self.device_id.clone(),
            ip: self.ip.clone(),
            kind: self.kind,
            state: self.state,
            expires_in: self.expires_at.saturating_duration_since(Instant::now()),
        }
    }
}

enum Command {
    Subscribe {
        device_id: String,
        ip: String,
        kind: ServiceKind,
        reply: oneshot::Sender<GenaResult<String>>,
    },
    Unsubscribe {
        sid: String,
        reply: oneshot::Sender<GenaResult<()>>,
    },
    RenewDue {
        sid: String,
    },
    List {
        reply: oneshot::Sender<Vec<SubscriptionInfo>>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Ordered event streams produced from NOTIFY callbacks.
pub struct SubscriptionStreams {
    pub topology: mpsc::UnboundedReceiver<TopologyEvent>,
    pub transport: mpsc::UnboundedReceiver<TransportEvent>,
}

/// Cloneable front end of the subscription actor.
#[derive(Clone)]
pub struct SubscriptionHandle {
    commands: mpsc::Sender<Command>,
}

impl SubscriptionHandle {
    /// Subscribes `device_id` at `ip` to `kind` events and returns the SID.
    ///
    /// An existing live subscription for the same device and kind is reused.
    ///
    /// # Errors
    /// [`GenaError::ListenerNotRunning`] before the listener has bound, or
    /// the speaker's rejection.
    pub async fn subscribe(
        &self,
        device_id: impl Into<String>,
        ip: impl Into<String>,
        kind: ServiceKind,
    ) -> GenaResult<String> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Subscribe {
            device_id: device_id.into(),
            ip: ip.into(),
            kind,
            reply,
        })
        .await?;
        rx.await.map_err(|_| GenaError::ManagerClosed)?
    }

    /// Cancels the renewal of `sid`, sends UNSUBSCRIBE and drops the record.
    ///
    /// UNSUBSCRIBE failures are logged, not returned.
    ///
    /// # Errors
    /// [`GenaError::UnknownSubscription`] if `sid` is not in the table.
    pub async fn unsubscribe(&self, sid: impl Into<String>) -> GenaResult<()> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Unsubscribe {
            sid: sid.into(),
            reply,
        })
        .await?;
        rx.await.map_err(|_| GenaError::ManagerClosed)?
    }

    /// Snapshot of the subscription table.
    pub async fn list(&self) -> GenaResult<Vec<SubscriptionInfo>> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::List { reply }).await?;
        rx.await.map_err(|_| GenaError::ManagerClosed)
    }

    /// Cancels every renewal, unsubscribes everything and stops the actor.
    pub async fn shutdown(&self) {
        let (reply, rx) = oneshot::channel();
        if self.send(Command::Shutdown { reply }).await.is_ok() {
            let _ = rx.await;
        }
    }

    async fn send(&self, command: Command) -> GenaResult<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| GenaError::ManagerClosed)
    }
}

/// Spawns the subscription actor.
///
/// Returns the command handle, the sender the NOTIFY listener pushes into,
/// and the two ordered event streams. Rendering events are turned into
/// [`ControllerEvent::VolumeChanged`] and delivered through `emitter`.
pub fn spawn_subscription_manager(
    transport: Arc<dyn GenaTransport>,
    network: NetworkContext,
    emitter: Arc<dyn EventEmitter>,
    config: SubscriptionConfig,
) -> (
    SubscriptionHandle,
    mpsc::Sender<NotifyMessage>,
    SubscriptionStreams,
) {
    let (command_tx, command_rx) = mpsc::channel(SUBSCRIPTION_COMMAND_CAPACITY);
    let (notify_tx, notify_rx) = mpsc::channel(config.notify_capacity.max(1));
    let (topology_tx, topology_rx) = mpsc::unbounded_channel();
    let (transport_tx, transport_rx) = mpsc::unbounded_channel();

    let actor = SubscriptionActor {
        table: HashMap::new(),
        transport,
        network,
        emitter,
        config,
        timer_tx: command_tx.downgrade(),
        topology_tx,
        transport_tx,
    };
    tokio::spawn(actor.run(command_rx, notify_rx));

    (
        SubscriptionHandle {
            commands: command_tx,
        },
        notify_tx,
        SubscriptionStreams {
            topology: topology_rx,
            transport: transport_rx,
        },
    )
}

struct SubscriptionActor {
    table: HashMap<String, Subscription>,
    transport: Arc<dyn GenaTransport>,
    network: NetworkContext,
    emitter: Arc<dyn EventEmitter>,
    config: SubscriptionConfig,
    /// Renewal timers hold a weak sender so they never keep the actor alive.
    timer_tx: mpsc::WeakSender<Command>,
    topology_tx: mpsc::UnboundedSender<TopologyEvent>,
    transport_tx: mpsc::UnboundedSender<TransportEvent>,
}

impl SubscriptionActor {
    async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        mut notifies: mpsc::Receiver<NotifyMessage>,
    ) {
        log::debug!("[GENA] Subscription manager started");
        loop {
            // Queued NOTIFYs are drained before the next command.
            tokio::select! {
                biased;
                Some(message) = notifies.recv() => self.handle_notify(message),
                command = commands.recv() => match command {
                    Some(Command::Shutdown { reply }) => {
                        self.shutdown().await;
                        let _ = reply.send(());
                        break;
                    }
                    Some(command) => self.handle_command(command).await,
                    None => {
                        self.shutdown().await;
                        break;
                    }
                },
            }
        }
        log::debug!("[GENA] Subscription manager stopped");
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Subscribe {
                device_id,
                ip,
                kind,
                reply,
            } => {
                let result = self.subscribe(device_id, ip, kind).await;
                let _ = reply.send(result);
            }
            Command::Unsubscribe { sid, reply } => {
                let result = self.unsubscribe(&sid).await;
                let _ = reply.send(result);
            }
            Command::RenewDue { sid } => self.renew(sid).await,
            Command::List { reply } => {
                let mut list: Vec<SubscriptionInfo> =
                    self.table.iter().map(|(sid, s)| s.info(sid)).collect();
                list.sort_by(|a, b| a.sid.cmp(&b.sid));
                let _ = reply.send(list);
            }
            Command::Shutdown { .. } => {}
        }
    }

    async fn subscribe(
        &mut self,
        device_id: String,
        ip: String,
        kind: ServiceKind,
    ) -> GenaResult<String> {
        if let Some((sid, _)) = self.table.iter().find(|(_, s)| {
            s.device_id == device_id && s.kind == kind && s.state != SubscriptionState::Expired
        }) {
            log::debug!("[GENA] Reusing {} subscription {} for {}", kind, sid, device_id);
            return Ok(sid.clone());
        }

        let callback_url = self
            .network
            .callback_url()
            .ok_or(GenaError::ListenerNotRunning)?;

        let response = self
            .transport
            .subscribe(&ip, kind.service(), &callback_url, self.config.timeout_secs)
            .await?;

        log::info!(
            "[GENA] Subscribed to {} on {} ({}), SID {}, {}s",
            kind,
            device_id,
            ip,
            response.sid,
            response.timeout_secs
        );

        let renewal = self.schedule_renewal(&response.sid, response.timeout_secs);
        self.table.insert(
            response.sid.clone(),
            Subscription {
                device_id,
                ip,
                kind,
                expires_at: Instant::now() + Duration::from_secs(response.timeout_secs),
                state: SubscriptionState::Active,
                renewal: Some(renewal),
            },
        );
        Ok(response.sid)
    }

    async fn unsubscribe(&mut self, sid: &str) -> GenaResult<()> {
        let Some(mut record) = self.table.remove(sid) else {
            return Err(GenaError::UnknownSubscription(sid.to_string()));
        };
        record.cancel_renewal();

        if !self
            .transport
            .unsubscribe(&record.ip, record.kind.service(), sid)
            .await
        {
            log::warn!("[GENA] UNSUBSCRIBE {} on {} not confirmed", sid, record.ip);
        } else {
            log::info!("[GENA] Unsubscribed {} ({} on {})", sid, record.kind, record.device_id);
        }
        Ok(())
    }

    async fn renew(&mut self, sid: String) {
        let Some(record) = self.table.get_mut(&sid) else {
            log::debug!("[GENA] Renewal for removed subscription {} ignored", sid);
            return;
        };
        record.state = SubscriptionState::Renewing;
        record.renewal = None;
        let (ip, kind) = (record.ip.clone(), record.kind);

        let result = self
            .transport
            .renew(&ip, kind.service(), &sid, self.config.timeout_secs)
            .await;

        match result {
            Ok(granted) => {
                let renewal = self.schedule_renewal(&sid, granted);
                if let Some(record) = self.table.get_mut(&sid) {
                    record.state = SubscriptionState::Active;
                    record.expires_at = Instant::now() + Duration::from_secs(granted);
                    record.renewal = Some(renewal);
                    log::debug!("[GENA] Renewed {} for {}s", sid, granted);
                } else {
                    renewal.abort();
                }
            }
            Err(e) => {
                log::warn!("[GENA] Renewal of {} ({} on {}) failed: {}", sid, kind, ip, e);
                if let Some(record) = self.table.get_mut(&sid) {
                    record.state = SubscriptionState::Expired;
                }
                let _ = self
                    .topology_tx
                    .send(TopologyEvent::SubscriptionExpired { sid });
            }
        }
    }

    fn schedule_renewal(&self, sid: &str, granted_secs: u64) -> JoinHandle<()> {
        let delay = self.config.renewal_delay(granted_secs);
        let timer_tx = self.timer_tx.clone();
        let sid = sid.to_string();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(tx) = timer_tx.upgrade() {
                let _ = tx.send(Command::RenewDue { sid }).await;
            }
        })
    }

    fn handle_notify(&self, message: NotifyMessage) {
        let Some(record) = self.table.get(&message.sid) else {
            log::debug!("[GENA] Dropping NOTIFY for unknown SID {}", message.sid);
            return;
        };
        let device_id = record.device_id.clone();

        match record.kind {
            ServiceKind::Topology => {
                let _ = self.topology_tx.send(TopologyEvent::Changed {
                    sid: message.sid,
                    device_id,
                    body: message.body,
                });
            }
            ServiceKind::Transport => match parse_transport_notify(&message.body) {
                Some(change) => {
                    let _ = self.transport_tx.send(TransportEvent {
                        sid: message.sid,
                        device_id,
                        change,
                    });
                }
                None => log::debug!("[GENA] Transport NOTIFY from {} without LastChange", device_id),
            },
            ServiceKind::Rendering => match parse_rendering_notify(&message.body) {
                Some(change) if change.volume.is_some() || change.muted.is_some() => {
                    self.emitter.emit(ControllerEvent::VolumeChanged {
                        device_id,
                        volume: change.volume,
                        muted: change.muted,
                        timestamp: now_millis(),
                    });
                }
                _ => log::trace!("[GENA] Rendering NOTIFY from {} without volume", device_id),
            },
        }
    }

    async fn shutdown(&mut self) {
        for record in self.table.values_mut() {
            record.cancel_renewal();
        }
        let records: Vec<(String, Subscription)> = self.table.drain().collect();
        for (sid, record) in records {
            if !self
                .transport
                .unsubscribe(&record.ip, record.kind.service(), &sid)
                .await
            {
                log::debug!("[GENA] UNSUBSCRIBE {} on shutdown not confirmed", sid);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::emitter::tests::RecordingEmitter;
    use crate::sonos::gena_client::SubscribeResponse;
    use crate::sonos::services::SonosService;
    use crate::sonos::test_fixtures::{
        RENDERING_NOTIFY_STEREO, TOPOLOGY_NOTIFY_TWO_GROUPS, TRANSPORT_NOTIFY_LINE_IN,
    };
    use crate::sonos::types::{AudioSource, TransportState};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::net::IpAddr;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Default)]
    struct FakeGena {
        next_sid: AtomicUsize,
        fail_renewal: AtomicBool,
        renewals: Mutex<Vec<(String, Instant)>>,
        unsubscribed: Mutex<Vec<String>>,
        callbacks: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl GenaTransport for FakeGena {
        async fn subscribe(
            &self,
            _ip: &str,
            _service: SonosService,
            callback_url: &str,
            _timeout_secs: u64,
        ) -> GenaResult<SubscribeResponse> {
            self.callbacks.lock().push(callback_url.to_string());
            let n = self.next_sid.fetch_add(1, Ordering::SeqCst);
            Ok(SubscribeResponse {
                sid: format!("uuid:sub-{}", n),
                timeout_secs: 1800,
            })
        }

        async fn renew(
            &self,
            _ip: &str,
            _service: SonosService,
            sid: &str,
            _timeout_secs: u64,
        ) -> GenaResult<u64> {
            self.renewals.lock().push((sid.to_string(), Instant::now()));
            if self.fail_renewal.load(Ordering::SeqCst) {
                Err(GenaError::RenewalFailed(412))
            } else {
                Ok(1800)
            }
        }

        async fn unsubscribe(&self, _ip: &str, _service: SonosService, sid: &str) -> bool {
            self.unsubscribed.lock().push(sid.to_string());
            true
        }
    }

    struct Harness {
        gena: Arc<FakeGena>,
        emitter: Arc<RecordingEmitter>,
        handle: SubscriptionHandle,
        notify_tx: mpsc::Sender<NotifyMessage>,
        streams: SubscriptionStreams,
    }

    fn harness(listening: bool) -> Harness {
        let gena = Arc::new(FakeGena::default());
        let emitter = Arc::new(RecordingEmitter::default());
        let network = NetworkContext::explicit(IpAddr::from([10, 0, 0, 9]));
        if listening {
            network.set_port(4321);
        }
        let (handle, notify_tx, streams) = spawn_subscription_manager(
            gena.clone(),
            network,
            emitter.clone(),
            SubscriptionConfig::default(),
        );
        Harness {
            gena,
            emitter,
            handle,
            notify_tx,
            streams,
        }
    }

    #[test]
    fn renewal_delay_is_eighty_percent() {
        let config = SubscriptionConfig::default();
        assert_eq!(config.renewal_delay(1800), Duration::from_secs(1440));
        assert_eq!(config.renewal_delay(300), Duration::from_secs(240));
    }

    #[tokio::test(start_paused = true)]
    async fn renewal_fires_at_eighty_percent_of_granted_timeout() {
        let h = harness(true);
        let start = Instant::now();
        let sid = h
            .handle
            .subscribe("RINCON_A", "10.0.0.2", ServiceKind::Topology)
            .await
            .unwrap();
        assert_eq!(h.gena.callbacks.lock()[0], "http://10.0.0.9:4321/notify");

        tokio::time::sleep(Duration::from_secs(1439)).await;
        assert!(h.gena.renewals.lock().is_empty());

        tokio::time::sleep(Duration::from_secs(2)).await;
        let renewals = h.gena.renewals.lock().clone();
        assert_eq!(renewals.len(), 1);
        assert_eq!(renewals[0].0, sid);
        let at = renewals[0].1 - start;
        assert!(at >= Duration::from_secs(1440) && at < Duration::from_secs(1441), "{:?}", at);

        // rescheduled from the new grant
        tokio::time::sleep(Duration::from_secs(1440)).await;
        assert_eq!(h.gena.renewals.lock().len(), 2);
        let list = h.handle.list().await.unwrap();
        assert_eq!(list[0].state, SubscriptionState::Active);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_renewal_emits_one_expiry() {
        let mut h = harness(true);
        h.gena.fail_renewal.store(true, Ordering::SeqCst);
        let sid = h
            .handle
            .subscribe("RINCON_A", "10.0.0.2", ServiceKind::Transport)
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_secs(3 * 1800)).await;

        assert_eq!(
            h.streams.topology.try_recv().unwrap(),
            TopologyEvent::SubscriptionExpired { sid: sid.clone() }
        );
        assert!(h.streams.topology.try_recv().is_err());
        assert_eq!(h.gena.renewals.lock().len(), 1);

        let list = h.handle.list().await.unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].state, SubscriptionState::Expired);

        // the caller cleans up
        h.handle.unsubscribe(&sid).await.unwrap();
        assert!(h.handle.list().await.unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn unsubscribe_cancels_renewal() {
        let h = harness(true);
        let sid = h
            .handle
            .subscribe("RINCON_A", "10.0.0.2", ServiceKind::Rendering)
            .await
            .unwrap();
        h.handle.unsubscribe(&sid).await.unwrap();

        tokio::time::sleep(Duration::from_secs(3600)).await;
        assert!(h.gena.renewals.lock().is_empty());
        assert_eq!(*h.gena.unsubscribed.lock(), vec![sid.clone()]);
        assert!(matches!(
            h.handle.unsubscribe(&sid).await,
            Err(GenaError::UnknownSubscription(_))
        ));
    }

    #[tokio::test]
    async fn subscribe_requires_listener() {
        let h = harness(false);
        let result = h
            .handle
            .subscribe("RINCON_A", "10.0.0.2", ServiceKind::Topology)
            .await;
        assert!(matches!(result, Err(GenaError::ListenerNotRunning)));
    }

    #[tokio::test]
    async fn same_device_and_kind_reuses_subscription() {
        let h = harness(true);
        let first = h
            .handle
            .subscribe("RINCON_A", "10.0.0.2", ServiceKind::Topology)
            .await
            .unwrap();
        let second = h
            .handle
            .subscribe("RINCON_A", "10.0.0.2", ServiceKind::Topology)
            .await
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(h.gena.callbacks.lock().len(), 1);
    }

    #[tokio::test]
    async fn notify_with_unknown_sid_emits_nothing() {
        let mut h = harness(true);
        h.handle
            .subscribe("RINCON_A", "10.0.0.2", ServiceKind::Topology)
            .await
            .unwrap();

        h.notify_tx
            .send(NotifyMessage {
                sid: "uuid:nobody".into(),
                body: TOPOLOGY_NOTIFY_TWO_GROUPS.into(),
            })
            .await
            .unwrap();
        // list round-trips through the actor, so the NOTIFY has been drained
        let _ = h.handle.list().await.unwrap();

        assert!(h.streams.topology.try_recv().is_err());
        assert!(h.streams.transport.try_recv().is_err());
        assert!(h.emitter.events.lock().is_empty());
    }

    #[tokio::test]
    async fn notifies_are_routed_by_service_kind() {
        let mut h = harness(true);
        let topo = h
            .handle
            .subscribe("RINCON_A", "10.0.0.2", ServiceKind::Topology)
            .await
            .unwrap();
        let avt = h
            .handle
            .subscribe("RINCON_A", "10.0.0.2", ServiceKind::Transport)
            .await
            .unwrap();
        let rcs = h
            .handle
            .subscribe("RINCON_A", "10.0.0.2", ServiceKind::Rendering)
            .await
            .unwrap();

        for (sid, body) in [
            (&topo, TOPOLOGY_NOTIFY_TWO_GROUPS),
            (&avt, TRANSPORT_NOTIFY_LINE_IN),
            (&rcs, RENDERING_NOTIFY_STEREO),
        ] {
            h.notify_tx
                .send(NotifyMessage {
                    sid: sid.clone(),
                    body: body.to_string(),
                })
                .await
                .unwrap();
        }

        match h.streams.topology.recv().await.unwrap() {
            TopologyEvent::Changed { sid, device_id, body } => {
                assert_eq!(sid, topo);
                assert_eq!(device_id, "RINCON_A");
                assert_eq!(body, TOPOLOGY_NOTIFY_TWO_GROUPS);
            }
            other => panic!("unexpected {:?}", other),
        }

        let transport = h.streams.transport.recv().await.unwrap();
        assert_eq!(transport.sid, avt);
        assert_eq!(transport.change.transport_state, Some(TransportState::Playing));
        assert_eq!(transport.change.source(), Some(AudioSource::LineIn));

        // the rendering NOTIFY was sent last; one more round-trip drains it
        let _ = h.handle.list().await.unwrap();
        let events = h.emitter.events.lock().clone();
        assert_eq!(events.len(), 1);
        match &events[0] {
            ControllerEvent::VolumeChanged {
                device_id,
                volume,
                muted,
                ..
            } => {
                assert_eq!(device_id, "RINCON_A");
                assert_eq!(*volume, Some(42));
                assert_eq!(*muted, Some(true));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn shutdown_unsubscribes_everything() {
        let h = harness(true);
        h.handle
            .subscribe("RINCON_A", "10.0.0.2", ServiceKind::Topology)
            .await
            .unwrap();
        h.handle
            .subscribe("RINCON_B", "10.0.0.3", ServiceKind::Topology)
            .await
            .unwrap();

        h.handle.shutdown().await;

        assert_eq!(h.gena.unsubscribed.lock().len(), 2);
        assert!(matches!(h.handle.list().await, Err(GenaError::ManagerClosed)));
    }
}

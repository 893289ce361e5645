//! Event emitter abstraction for decoupling services from delivery.
//!
//! Services depend on the [`EventEmitter`] trait rather than a concrete
//! channel, so tests can count events and the binary can choose how they
//! are shown.

use super::ControllerEvent;

/// Trait for emitting collaborator notifications without knowledge of
/// transport.
///
/// # Example
///
/// ```ignore
/// struct MyService {
///     emitter: Arc<dyn EventEmitter>,
/// }
///
/// impl MyService {
///     fn finish(&self) {
///         self.emitter.emit(ControllerEvent::DiscoveryStarted { timestamp: now_millis() });
///     }
/// }
/// ```
pub trait EventEmitter: Send + Sync {
    /// Emits a notification.
    fn emit(&self, event: ControllerEvent);
}

/// No-op emitter for one-shot commands and tests.
pub struct NoopEventEmitter;

impl EventEmitter for NoopEventEmitter {
    fn emit(&self, _event: ControllerEvent) {}
}

/// Logging emitter.
///
/// Logs every notification as a structured `tracing` event.
pub struct LoggingEventEmitter;

impl EventEmitter for LoggingEventEmitter {
    fn emit(&self, event: ControllerEvent) {
        match &event {
            ControllerEvent::DiscoveryStarted { .. } => {
                tracing::info!("discovery_started");
            }
            ControllerEvent::DevicesDiscovered { devices, .. } => {
                tracing::info!(count = devices.len(), "devices_discovered");
            }
            ControllerEvent::VolumeChanged {
                device_id,
                volume,
                muted,
                ..
            } => {
                tracing::info!(%device_id, ?volume, ?muted, "volume_changed");
            }
        }
        tracing::debug!(?event, "controller_event");
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use parking_lot::Mutex;

    /// Test emitter that records every event.
    #[derive(Default)]
    pub(crate) struct RecordingEmitter {
        pub events: Mutex<Vec<ControllerEvent>>,
    }

    impl EventEmitter for RecordingEmitter {
        fn emit(&self, event: ControllerEvent) {
            self.events.lock().push(event);
        }
    }

    #[test]
    fn recording_emitter_keeps_order() {
        let emitter = RecordingEmitter::default();
        emitter.emit(ControllerEvent::DiscoveryStarted { timestamp: 1 });
        emitter.emit(ControllerEvent::DevicesDiscovered {
            devices: vec![],
            timestamp: 2,
        });

        let events = emitter.events.lock();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], ControllerEvent::DiscoveryStarted { .. }));
    }

    #[test]
    fn volume_event_serializes_camel_case() {
        let json = serde_json::to_value(ControllerEvent::VolumeChanged {
            device_id: "RINCON_A".into(),
            volume: Some(30),
            muted: None,
            timestamp: 5,
        })
        .unwrap();
        assert_eq!(json["type"], "volumeChanged");
        assert_eq!(json["deviceId"], "RINCON_A");
        assert!(json.get("muted").is_none());
    }
}

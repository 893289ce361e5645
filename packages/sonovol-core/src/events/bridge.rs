//! Bridge that fans collaborator notifications out to a broadcast channel.

use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

use super::emitter::EventEmitter;
use super::ControllerEvent;

/// Forwards events to a `tokio::sync::broadcast` channel that any number of
/// consumers subscribe to.
///
/// An optional external emitter (for example [`LoggingEventEmitter`](super::LoggingEventEmitter))
/// also receives every event and can be set after construction.
#[derive(Clone)]
pub struct BroadcastEventBridge {
    tx: broadcast::Sender<ControllerEvent>,
    external_emitter: Arc<RwLock<Option<Arc<dyn EventEmitter>>>>,
}

impl BroadcastEventBridge {
    /// Creates a new bridge with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            tx,
            external_emitter: Arc::new(RwLock::new(None)),
        }
    }

    /// Sets an external emitter that sees every event before broadcast.
    pub fn set_external_emitter(&self, emitter: Arc<dyn EventEmitter>) {
        *self.external_emitter.write() = Some(emitter);
    }

    /// Returns a new receiver.
    pub fn subscribe(&self) -> broadcast::Receiver<ControllerEvent> {
        self.tx.subscribe()
    }

    /// Returns a new receiver as a `Stream`. Lagged receivers yield an error
    /// item and continue.
    pub fn stream(&self) -> BroadcastStream<ControllerEvent> {
        BroadcastStream::new(self.tx.subscribe())
    }
}

impl EventEmitter for BroadcastEventBridge {
    fn emit(&self, event: ControllerEvent) {
        if let Some(ref emitter) = *self.external_emitter.read() {
            emitter.emit(event.clone());
        }
        if let Err(e) = self.tx.send(event) {
            log::trace!("[EventBridge] No broadcast receivers: {}", e);
        }
    }
}

//! GENA NOTIFY listener.
//!
//! A one-route axum server on an OS-assigned port. The handler only reads the
//! SID header and the body, pushes them onto the subscription manager's queue
//! without waiting, and answers `200 OK` with an empty body.

use std::net::{IpAddr, SocketAddr};

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request, StatusCode},
    routing::any,
    Router,
};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use super::ServerError;
use crate::context::NetworkContext;
use crate::error::{CoreError, CoreResult};
use crate::protocol_constants::{GENA_CALLBACK_PATH, GENA_NT, GENA_NTS, MAX_NOTIFY_BODY_SIZE};
use crate::services::subscriptions::NotifyMessage;

#[derive(Clone)]
struct NotifyState {
    notify_tx: mpsc::Sender<NotifyMessage>,
}

/// A running NOTIFY listener.
pub struct NotifyListener {
    addr: SocketAddr,
    task: JoinHandle<()>,
}

impl NotifyListener {
    /// Address the listener is bound to.
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Waits for the server to stop after its cancellation token fired.
    pub async fn join(self) {
        if let Err(e) = self.task.await {
            log::warn!("[Notify] Listener task ended abnormally: {}", e);
        }
    }
}

fn router(notify_tx: mpsc::Sender<NotifyMessage>) -> Router {
    Router::new()
        .route(GENA_CALLBACK_PATH, any(handle_notify))
        .layer(TraceLayer::new_for_http())
        .with_state(NotifyState { notify_tx })
}

/// Binds the listener on `bind_addr` with an ephemeral port, records the
/// port in `network` and serves until `cancel` fires.
///
/// # Errors
/// Returns [`ServerError::Bind`] if the socket cannot be bound.
pub async fn start_notify_listener(
    bind_addr: IpAddr,
    network: NetworkContext,
    notify_tx: mpsc::Sender<NotifyMessage>,
    cancel: CancellationToken,
) -> Result<NotifyListener, ServerError> {
    let listener = tokio::net::TcpListener::bind(SocketAddr::new(bind_addr, 0)).await?;
    let addr = listener.local_addr()?;
    network.set_port(addr.port());
    log::info!(
        "[Notify] Listening on {} (callback {})",
        addr,
        network.callback_url().unwrap_or_default()
    );

    let app = router(notify_tx);
    let task = tokio::spawn(async move {
        let shutdown = cancel.clone();
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await
        {
            log::error!("[Notify] Server error: {}", e);
        }
        network.set_port(0);
        log::info!("[Notify] Listener stopped");
    });

    Ok(NotifyListener { addr, task })
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

async fn handle_notify(
    State(state): State<NotifyState>,
    req: Request<Body>,
) -> CoreResult<StatusCode> {
    let (parts, body) = req.into_parts();

    if parts.method.as_str() != "NOTIFY" {
        return Err(CoreError::InvalidRequest(format!(
            "Expected NOTIFY method, got {}",
            parts.method
        )));
    }

    let sid = match header(&parts.headers, "SID") {
        Some(s) if !s.trim().is_empty() => s.trim().to_string(),
        _ => {
            log::warn!("[Notify] NOTIFY missing SID header");
            return Err(CoreError::InvalidRequest("Missing SID header".into()));
        }
    };

    // Sonos always sends these; others may not, so a mismatch is only noted.
    let nt = header(&parts.headers, "NT");
    let nts = header(&parts.headers, "NTS");
    if nt.is_some_and(|v| v != GENA_NT) || nts.is_some_and(|v| v != GENA_NTS) {
        log::debug!("[Notify] Unexpected NT/NTS {:?}/{:?} for {}", nt, nts, sid);
    }

    let body = axum::body::to_bytes(body, MAX_NOTIFY_BODY_SIZE)
        .await
        .map_err(|e| {
            log::warn!("[Notify] Failed to read NOTIFY body: {}", e);
            CoreError::InvalidRequest("Failed to read body".into())
        })?;

    let seq = header(&parts.headers, "SEQ").unwrap_or("?");
    log::trace!("[Notify] {} (SEQ {}) {} bytes", sid, seq, body.len());

    let message = NotifyMessage {
        sid,
        body: String::from_utf8_lossy(&body).into_owned(),
    };
    match state.notify_tx.try_send(message) {
        Ok(()) => {}
        Err(TrySendError::Full(message)) => {
            log::warn!("[Notify] Queue full, dropping NOTIFY for {}", message.sid);
        }
        Err(TrySendError::Closed(_)) => {
            return Err(CoreError::Configuration(
                "Subscription manager is not running".into(),
            ));
        }
    }

    Ok(StatusCode::OK)
}

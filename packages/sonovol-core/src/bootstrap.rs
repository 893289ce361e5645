//! Application bootstrap and dependency wiring.
//!
//! This module is the composition root: the single place where the HTTP
//! client, the speaker client, the GENA transport, the shared state and the
//! event bridge are created and handed to the [`SonosController`].

use std::sync::Arc;

use reqwest::Client;

use crate::context::{LocalIpDetector, NetworkContext};
use crate::error::{CoreError, CoreResult};
use crate::events::BroadcastEventBridge;
use crate::services::SonosController;
use crate::sonos::gena_client::GenaClient;
use crate::sonos::SonosClientImpl;
use crate::state::{CoreConfig, SonosState};

/// Container for all bootstrapped services.
#[derive(Clone)]
pub struct CoreServices {
    /// Collaborator-facing controller.
    pub controller: Arc<SonosController>,
    /// Every [`ControllerEvent`](crate::events::ControllerEvent) is broadcast here.
    pub events: BroadcastEventBridge,
    /// Shared device and topology model.
    pub state: Arc<SonosState>,
}

/// Creates the shared HTTP client for all speaker communication.
///
/// One client is shared so connections to the same speaker are pooled.
fn create_http_client(config: &CoreConfig) -> CoreResult<Client> {
    Client::builder()
        .timeout(config.soap_timeout())
        .build()
        .map_err(|e| CoreError::Configuration(format!("Failed to create HTTP client: {}", e)))
}

/// Bootstraps the core services.
///
/// # Errors
///
/// [`CoreError::Configuration`] if the configuration is invalid or the HTTP
/// client cannot be created.
pub fn bootstrap_services(config: CoreConfig) -> CoreResult<CoreServices> {
    config.validate().map_err(CoreError::Configuration)?;

    let http = create_http_client(&config)?;
    let sonos = Arc::new(SonosClientImpl::with_discovery_config(
        http.clone(),
        config.discovery_config(),
    ));
    let gena = Arc::new(GenaClient::new(http));
    let state = Arc::new(SonosState::default());
    let events = BroadcastEventBridge::new(config.event_channel_capacity);

    let controller = Arc::new(SonosController::new(
        sonos,
        gena,
        state.clone(),
        Arc::new(events.clone()),
        config,
    ));

    log::info!("[Bootstrap] Core services ready");
    Ok(CoreServices {
        controller,
        events,
        state,
    })
}

/// Builds the network context the NOTIFY callback URL is advertised from.
///
/// An explicit address wins; otherwise the local IP is auto-detected.
///
/// # Errors
///
/// [`CoreError::Configuration`] when no usable local address is found.
pub fn network_context(config: &CoreConfig) -> CoreResult<NetworkContext> {
    match config.advertise_ip {
        Some(ip) => Ok(NetworkContext::explicit(ip)),
        None => Ok(NetworkContext::auto_detect(LocalIpDetector::arc())?),
    }
}

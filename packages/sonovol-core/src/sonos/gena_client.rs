//! GENA HTTP client for subscription operations.
//!
//! Handles only the wire side of UPnP eventing (SUBSCRIBE, renewal,
//! UNSUBSCRIBE). Subscription state lives in the subscription manager.

use async_trait::async_trait;
use reqwest::{Client, Method};
use thiserror::Error;

use super::services::SonosService;
use crate::protocol_constants::{GENA_NT, GENA_NTS, SONOS_PORT};

/// Errors raised by the event-subscription layer.
#[derive(Debug, Error)]
pub enum GenaError {
    /// HTTP request to the speaker failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The speaker rejected the SUBSCRIBE request.
    #[error("Subscription failed with status {0}")]
    SubscriptionFailed(u16),

    /// The speaker rejected a renewal.
    #[error("Renewal failed with status {0}")]
    RenewalFailed(u16),

    /// A successful response carried no `SID` header.
    #[error("Response missing SID header")]
    MissingSid,

    /// No NOTIFY listener is bound, so there is no callback URL to offer.
    #[error("NOTIFY listener is not running")]
    ListenerNotRunning,

    /// The subscription identifier is not in the table.
    #[error("Unknown subscription: {0}")]
    UnknownSubscription(String),

    /// The subscription manager has shut down.
    #[error("Subscription manager is closed")]
    ManagerClosed,
}

/// Convenient Result alias for GENA operations.
pub type GenaResult<T> = Result<T, GenaError>;

/// Response from a successful SUBSCRIBE.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscribeResponse {
    /// Subscription identifier issued by the speaker.
    pub sid: String,
    /// Granted timeout in seconds.
    pub timeout_secs: u64,
}

/// Wire operations the subscription manager depends on.
#[async_trait]
pub trait GenaTransport: Send + Sync {
    /// Creates a subscription delivering events to `callback_url`.
    async fn subscribe(
        &self,
        ip: &str,
        service: SonosService,
        callback_url: &str,
        timeout_secs: u64,
    ) -> GenaResult<SubscribeResponse>;

    /// Renews `sid`, returning the newly granted timeout in seconds.
    async fn renew(
        &self,
        ip: &str,
        service: SonosService,
        sid: &str,
        timeout_secs: u64,
    ) -> GenaResult<u64>;

    /// Cancels `sid`. Returns false if the speaker did not confirm.
    async fn unsubscribe(&self, ip: &str, service: SonosService, sid: &str) -> bool;
}

/// Parses a GENA `TIMEOUT` header value.
///
/// `Second-N` yields N. `infinite`, a missing header or anything malformed
/// yields `requested`, so renewals keep a finite schedule.
#[must_use]
pub fn parse_timeout_header(value: Option<&str>, requested: u64) -> u64 {
    const PREFIX: &str = "Second-";
    value
        .map(str::trim)
        .filter(|v| {
            v.get(..PREFIX.len())
                .is_some_and(|p| p.eq_ignore_ascii_case(PREFIX))
        })
        .and_then(|v| v[PREFIX.len()..].parse::<u64>().ok())
        .filter(|secs| *secs > 0)
        .unwrap_or(requested)
}

/// reqwest-backed [`GenaTransport`].
pub struct GenaClient {
    client: Client,
    port: u16,
}

impl GenaClient {
    /// Creates a GENA client targeting the standard speaker port.
    pub fn new(client: Client) -> Self {
        Self {
            client,
            port: SONOS_PORT,
        }
    }

    /// Targets a non-standard port (local test servers).
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    fn event_url(&self, ip: &str, service: SonosService) -> String {
        format!("http://{}:{}{}", ip, self.port, service.event_path())
    }

    fn subscribe_method() -> Method {
        Method::from_bytes(b"SUBSCRIBE").unwrap_or(Method::POST)
    }

    fn unsubscribe_method() -> Method {
        Method::from_bytes(b"UNSUBSCRIBE").unwrap_or(Method::POST)
    }

    fn timeout_of(response: &reqwest::Response, requested: u64) -> u64 {
        parse_timeout_header(
            response
                .headers()
                .get("TIMEOUT")
                .and_then(|v| v.to_str().ok()),
            requested,
        )
    }
}

#[async_trait]
impl GenaTransport for GenaClient {
    async fn subscribe(
        &self,
        ip: &str,
        service: SonosService,
        callback_url: &str,
        timeout_secs: u64,
    ) -> GenaResult<SubscribeResponse> {
        let response = self
            .client
            .request(Self::subscribe_method(), self.event_url(ip, service))
            .header("CALLBACK", format!("<{}>", callback_url))
            .header("NT", GENA_NT)
            .header("NTS", GENA_NTS)
            .header("TIMEOUT", format!("Second-{}", timeout_secs))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(GenaError::SubscriptionFailed(response.status().as_u16()));
        }

        let sid = response
            .headers()
            .get("SID")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or(GenaError::MissingSid)?;

        Ok(SubscribeResponse {
            sid,
            timeout_secs: Self::timeout_of(&response, timeout_secs),
        })
    }

    async fn renew(
        &self,
        ip: &str,
        service: SonosService,
        sid: &str,
        timeout_secs: u64,
    ) -> GenaResult<u64> {
        let response = self
            .client
            .request(Self::subscribe_method(), self.event_url(ip, service))
            .header("SID", sid)
            .header("TIMEOUT", format!("Second-{}", timeout_secs))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(GenaError::RenewalFailed(response.status().as_u16()));
        }

        Ok(Self::timeout_of(&response, timeout_secs))
    }

    async fn unsubscribe(&self, ip: &str, service: SonosService, sid: &str) -> bool {
        match self
            .client
            .request(Self::unsubscribe_method(), self.event_url(ip, service))
            .header("SID", sid)
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                log::debug!("[GENA] UNSUBSCRIBE {} on {} failed: {}", sid, ip, e);
                false
            }
        }
    }
}

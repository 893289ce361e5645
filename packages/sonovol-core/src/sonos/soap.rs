//! Low-level SOAP transport for UPnP control calls.
//!
//! Builds envelopes, POSTs them to a speaker's control endpoint and turns the
//! outcome into a [`SoapResult`]. Nothing here retries: retry policy belongs
//! to callers (see [`retry`](super::retry)).

use reqwest::Client;
use thiserror::Error;

use super::services::SonosService;
use super::utils::{build_sonos_url, escape_xml, extract_xml_text};

// ─────────────────────────────────────────────────────────────────────────────
// Error Types
// ─────────────────────────────────────────────────────────────────────────────

/// Errors that can occur during SOAP operations with Sonos speakers.
#[derive(Debug, Error)]
pub enum SoapError {
    /// HTTP request to the speaker failed (connect, reset, decode).
    #[error("HTTP request failed: {0}")]
    Http(#[source] reqwest::Error),

    /// Speaker returned a non-success HTTP status without a SOAP fault.
    #[error("HTTP error {0}: {1}")]
    HttpStatus(u16, String),

    /// The request did not complete within the client timeout.
    #[error("Request timed out")]
    Timeout,

    /// Speaker returned a SOAP fault response.
    #[error("SOAP fault: {0}")]
    Fault(String),

    /// Response XML could not be parsed.
    #[error("Failed to parse response: {0}")]
    Parse(String),

    /// Response parsed but lacked an expected field.
    #[error("Response is missing <{0}>")]
    MissingField(&'static str),
}

/// Convenient Result alias for SOAP operations.
pub type SoapResult<T> = Result<T, SoapError>;

impl From<reqwest::Error> for SoapError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Http(err)
        }
    }
}

impl SoapError {
    /// Returns true for transport-level failures (timeout, unreachable, non-2xx).
    #[must_use]
    pub fn is_network(&self) -> bool {
        matches!(self, Self::Http(_) | Self::HttpStatus(_, _) | Self::Timeout)
    }

    /// Returns true if the operation is worth retrying.
    ///
    /// Transient Sonos SOAP fault codes:
    /// - 701: Transition not available (device changing states)
    /// - 714: Illegal seek target (previous source still loading)
    /// - 716: Resource not found (device busy initializing)
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Fault(msg) => {
                ["701", "714", "716"].iter().any(|code| msg.contains(code))
                    || msg.to_lowercase().contains("transition")
            }
            Self::Timeout => true,
            _ => false,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Envelope
// ─────────────────────────────────────────────────────────────────────────────

/// Builds a SOAP envelope for `action` on `service` with ordered arguments.
///
/// The envelope is a single line: Sonos rejects documents with whitespace
/// before the root element.
pub fn build_envelope(service: SonosService, action: &str, args: &[(&str, &str)]) -> String {
    let mut body = format!(
        r#"<?xml version="1.0" encoding="utf-8"?><s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/" s:encodingStyle="http://schemas.xmlsoap.org/soap/encoding/"><s:Body><u:{action} xmlns:u="{}">"#,
        service.urn()
    );
    for (k, v) in args {
        body.push_str(&format!("<{k}>{}</{k}>", escape_xml(v)));
    }
    body.push_str(&format!("</u:{action}></s:Body></s:Envelope>"));
    body
}

/// Returns the `SOAPACTION` header value for `action` on `service`.
#[must_use]
pub fn soap_action_header(service: SonosService, action: &str) -> String {
    format!("\"{}#{}\"", service.urn(), action)
}

// ─────────────────────────────────────────────────────────────────────────────
// Transport
// ─────────────────────────────────────────────────────────────────────────────

/// POSTs a control call to a speaker and returns the raw response XML.
///
/// # Errors
/// - [`SoapError::Fault`] when the body carries a SOAP fault (checked before the
///   status, since faults arrive with HTTP 500)
/// - [`SoapError::HttpStatus`] for any other non-2xx response
/// - [`SoapError::Timeout`] / [`SoapError::Http`] for transport failures
pub async fn post(
    client: &Client,
    ip: &str,
    service: SonosService,
    action: &str,
    args: &[(&str, &str)],
) -> SoapResult<String> {
    let url = build_sonos_url(ip, service.control_path());
    let body = build_envelope(service, action, args);

    log::debug!("[SOAP] {} -> {} ({} bytes)", action, url, body.len());

    let start = std::time::Instant::now();
    let res = client
        .post(&url)
        .header("Content-Type", "text/xml; charset=\"utf-8\"")
        .header("SOAPACTION", soap_action_header(service, action))
        .body(body)
        .send()
        .await;

    log::debug!(
        "[SOAP] {} on {} completed in {:?}: {:?}",
        action,
        ip,
        start.elapsed(),
        res.as_ref().map(|r| r.status())
    );

    let res = res?;
    let status = res.status();
    let response_text = res.text().await?;

    if response_text.contains(":Fault>") {
        let fault = extract_fault(&response_text);
        log::warn!("[SOAP] {} on {} returned fault: {}", action, ip, fault);
        return Err(SoapError::Fault(fault));
    }

    if !status.is_success() {
        return Err(SoapError::HttpStatus(status.as_u16(), response_text));
    }

    Ok(response_text)
}

/// Describes a SOAP fault as "faultstring (UPnP errorCode)".
fn extract_fault(xml: &str) -> String {
    let fault = extract_xml_text(xml, "faultstring").unwrap_or_else(|| "Unknown fault".into());
    match extract_xml_text(xml, "errorCode") {
        Some(code) => format!("{} ({})", fault, code),
        None => fault,
    }
}

/// Extracts a required response field.
///
/// # Errors
/// Returns [`SoapError::MissingField`] when the element is absent.
pub fn require_field(xml: &str, field: &'static str) -> SoapResult<String> {
    extract_xml_text(xml, field).ok_or(SoapError::MissingField(field))
}

// ─────────────────────────────────────────────────────────────────────────────
// SOAP Request Builder
// ─────────────────────────────────────────────────────────────────────────────

/// Fluent builder for control calls.
///
/// # Example
/// ```ignore
/// let response = SoapRequestBuilder::new(&client, "192.168.1.100")
///     .service(SonosService::RenderingControl)
///     .action("GetVolume")
///     .instance_id()
///     .arg("Channel", "Master")
///     .send()
///     .await?;
/// ```
pub struct SoapRequestBuilder<'a> {
    client: &'a Client,
    ip: &'a str,
    service: Option<SonosService>,
    action: Option<&'a str>,
    args: Vec<(&'a str, String)>,
}

impl<'a> SoapRequestBuilder<'a> {
    /// Creates a new builder targeting the speaker at `ip`.
    #[must_use]
    pub fn new(client: &'a Client, ip: &'a str) -> Self {
        Self {
            client,
            ip,
            service: None,
            action: None,
            args: Vec::new(),
        }
    }

    /// Sets the service for this request.
    #[must_use]
    pub fn service(mut self, service: SonosService) -> Self {
        self.service = Some(service);
        self
    }

    /// Sets the SOAP action name.
    #[must_use]
    pub fn action(mut self, action: &'a str) -> Self {
        self.action = Some(action);
        self
    }

    /// Adds an argument. Arguments keep insertion order.
    #[must_use]
    pub fn arg(mut self, key: &'a str, value: impl Into<String>) -> Self {
        self.args.push((key, value.into()));
        self
    }

    /// Adds the `InstanceID=0` argument most actions require.
    #[must_use]
    pub fn instance_id(self) -> Self {
        self.arg("InstanceID", "0")
    }

    /// Adds the `Channel=Master` argument used by RenderingControl.
    #[must_use]
    pub fn master_channel(self) -> Self {
        self.arg("Channel", "Master")
    }

    /// Sends the request and returns the response body.
    ///
    /// # Errors
    /// Returns [`SoapError::Parse`] if service or action is unset, otherwise
    /// whatever [`post`] returns.
    pub async fn send(self) -> SoapResult<String> {
        let service = self
            .service
            .ok_or_else(|| SoapError::Parse("request has no service".into()))?;
        let action = self
            .action
            .ok_or_else(|| SoapError::Parse("request has no action".into()))?;

        let args: Vec<(&str, &str)> = self.args.iter().map(|(k, v)| (*k, v.as_str())).collect();
        post(self.client, self.ip, service, action, &args).await
    }

    /// Returns the request parts without sending.
    #[cfg(test)]
    pub fn into_parts(self) -> Option<(SonosService, &'a str, Vec<(&'a str, String)>)> {
        Some((self.service?, self.action?, self.args))
    }
}

//! Network addressing for inbound GENA callbacks.
//!
//! Speakers deliver NOTIFY requests to a URL we hand them at subscribe time.
//! [`NetworkContext`] holds the two halves of that URL: the local IP speakers
//! can reach us at, and the port the NOTIFY listener was assigned by the OS.

use std::net::IpAddr;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::protocol_constants::GENA_CALLBACK_PATH;

/// Network configuration shared by the listener and the subscription manager.
///
/// # Modes
///
/// - **Explicit**: the advertise IP comes from configuration. Use
///   [`NetworkContext::explicit`].
/// - **Auto-detect**: the local IP is detected from the system's interfaces.
///   Use [`NetworkContext::auto_detect`].
#[derive(Clone)]
pub struct NetworkContext {
    /// Listener port (0 until the NOTIFY listener has bound).
    port: Arc<RwLock<u16>>,
    /// IP address that Sonos speakers can reach us at.
    local_ip: String,
}

impl NetworkContext {
    /// Creates a `NetworkContext` with a fixed advertise IP.
    #[must_use]
    pub fn explicit(advertise_ip: IpAddr) -> Self {
        Self {
            port: Arc::new(RwLock::new(0)),
            local_ip: advertise_ip.to_string(),
        }
    }

    /// Creates a `NetworkContext` whose IP is detected once from local
    /// interfaces.
    ///
    /// # Errors
    ///
    /// Returns an error if IP detection fails.
    pub fn auto_detect(ip_detector: Arc<dyn IpDetector>) -> Result<Self, IpDetectionError> {
        let local_ip = ip_detector.detect()?;
        log::info!("[Network] Advertising {} to speakers", local_ip);
        Ok(Self {
            port: Arc::new(RwLock::new(0)),
            local_ip,
        })
    }

    /// Returns the listener port, or 0 if the listener has not bound yet.
    #[must_use]
    pub fn port(&self) -> u16 {
        *self.port.read()
    }

    /// Returns the advertised local IP.
    #[must_use]
    pub fn local_ip(&self) -> String {
        self.local_ip.clone()
    }

    /// Records the port the NOTIFY listener was bound to.
    pub fn set_port(&self, port: u16) {
        *self.port.write() = port;
    }

    /// Returns the GENA callback URL, or `None` if the listener is not running.
    #[must_use]
    pub fn callback_url(&self) -> Option<String> {
        match self.port() {
            0 => None,
            port => Some(callback_url_for(&self.local_ip(), port)),
        }
    }
}

/// Formats the NOTIFY callback URL for an address and port.
#[must_use]
pub fn callback_url_for(ip: &str, port: u16) -> String {
    format!("http://{}:{}{}", ip, port, GENA_CALLBACK_PATH)
}

/// Trait for detecting the local IP address.
pub trait IpDetector: Send + Sync {
    /// Detects the local IP address.
    fn detect(&self) -> Result<String, IpDetectionError>;
}

/// Default IP detector using the system's network interfaces.
#[derive(Debug, Clone, Default)]
pub struct LocalIpDetector;

impl LocalIpDetector {
    /// Creates a new `LocalIpDetector` wrapped in an Arc.
    #[must_use]
    pub fn arc() -> Arc<dyn IpDetector> {
        Arc::new(Self)
    }
}

impl IpDetector for LocalIpDetector {
    fn detect(&self) -> Result<String, IpDetectionError> {
        local_ip_address::local_ip()
            .map(|ip| ip.to_string())
            .map_err(|e| IpDetectionError(e.to_string()))
    }
}

/// Local IP address could not be determined.
#[derive(Debug, thiserror::Error)]
#[error("Failed to detect local IP: {0}")]
pub struct IpDetectionError(pub String);

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    struct FixedDetector(Result<&'static str, &'static str>);

    impl IpDetector for FixedDetector {
        fn detect(&self) -> Result<String, IpDetectionError> {
            self.0
                .map(str::to_string)
                .map_err(|e| IpDetectionError(e.to_string()))
        }
    }

    #[test]
    fn callback_url_requires_bound_listener() {
        let ctx = NetworkContext::explicit(IpAddr::V4(Ipv4Addr::new(192, 168, 1, 20)));
        assert_eq!(ctx.callback_url(), None);

        ctx.set_port(40123);
        assert_eq!(
            ctx.callback_url().as_deref(),
            Some("http://192.168.1.20:40123/notify")
        );
    }

    #[test]
    fn auto_detect_uses_the_detected_address() {
        let ctx = NetworkContext::auto_detect(Arc::new(FixedDetector(Ok("10.0.0.5")))).unwrap();
        assert_eq!(ctx.local_ip(), "10.0.0.5");
        ctx.set_port(1400);
        assert_eq!(ctx.callback_url().as_deref(), Some("http://10.0.0.5:1400/notify"));
    }

    #[test]
    fn auto_detect_failure_is_an_error() {
        let err = NetworkContext::auto_detect(Arc::new(FixedDetector(Err("no route")))).err();
        assert!(err.unwrap().to_string().contains("no route"));
    }
}

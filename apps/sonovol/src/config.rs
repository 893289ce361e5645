//! Application configuration.
//!
//! Supports loading from YAML files with environment variable overrides.
//! CLI flags are applied on top by `main`.

use std::net::IpAddr;
use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use serde::Deserialize;
use sonovol_core::CoreConfig;

/// Application configuration loaded from YAML with environment overrides.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// IP address advertised to speakers in GENA callback URLs.
    /// If not specified, auto-detection will be attempted.
    /// Override: `SONOVOL_ADVERTISE_IP`
    pub advertise_ip: Option<IpAddr>,

    /// Address the NOTIFY listener binds to. The port is always OS-assigned.
    /// Override: `SONOVOL_NOTIFY_BIND_ADDR`
    pub notify_bind_addr: IpAddr,

    /// SSDP listen window in milliseconds.
    /// Override: `SONOVOL_DISCOVERY_WINDOW_MS`
    pub discovery_window_ms: u64,

    /// Timeout for every control call in milliseconds.
    pub soap_timeout_ms: u64,

    /// Subscription timeout requested from speakers, in seconds.
    pub subscription_timeout_secs: u64,

    /// Interval in seconds between background topology refreshes.
    /// Override: `SONOVOL_TOPOLOGY_REFRESH_INTERVAL`
    pub topology_refresh_interval: u64,

    /// Step used by `volume <name> +` / `-`.
    /// Override: `SONOVOL_VOLUME_STEP`
    pub volume_step: u8,

    /// Device selected automatically after discovery.
    /// Override: `SONOVOL_PREFERRED_DEVICE`
    pub preferred_device: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        let core = CoreConfig::default();
        Self {
            advertise_ip: core.advertise_ip,
            notify_bind_addr: core.notify_bind_addr,
            discovery_window_ms: core.discovery_window_ms,
            soap_timeout_ms: core.soap_timeout_ms,
            subscription_timeout_secs: core.subscription_timeout_secs,
            topology_refresh_interval: core.topology_refresh_interval_secs,
            volume_step: core.volume_step,
            preferred_device: core.preferred_device,
        }
    }
}

impl AppConfig {
    /// Loads configuration from a YAML file, then applies environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = if let Some(path) = path {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?
        } else {
            Self::default()
        };

        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Applies `SONOVOL_*` overrides. Unparseable values are ignored.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(ip) = parse_env(&lookup, "SONOVOL_ADVERTISE_IP") {
            self.advertise_ip = Some(ip);
        }
        if let Some(addr) = parse_env(&lookup, "SONOVOL_NOTIFY_BIND_ADDR") {
            self.notify_bind_addr = addr;
        }
        if let Some(ms) = parse_env(&lookup, "SONOVOL_DISCOVERY_WINDOW_MS") {
            self.discovery_window_ms = ms;
        }
        if let Some(interval) = parse_env(&lookup, "SONOVOL_TOPOLOGY_REFRESH_INTERVAL") {
            self.topology_refresh_interval = interval;
        }
        if let Some(step) = parse_env(&lookup, "SONOVOL_VOLUME_STEP") {
            self.volume_step = step;
        }
        if let Some(name) = lookup("SONOVOL_PREFERRED_DEVICE").filter(|n| !n.trim().is_empty()) {
            self.preferred_device = Some(name);
        }
    }

    /// Converts to sonovol-core's `CoreConfig`.
    pub fn to_core_config(&self) -> CoreConfig {
        CoreConfig {
            advertise_ip: self.advertise_ip,
            notify_bind_addr: self.notify_bind_addr,
            discovery_window_ms: self.discovery_window_ms,
            soap_timeout_ms: self.soap_timeout_ms,
            subscription_timeout_secs: self.subscription_timeout_secs,
            topology_refresh_interval_secs: self.topology_refresh_interval,
            volume_step: self.volume_step,
            preferred_device: self.preferred_device.clone(),
            ..CoreConfig::default()
        }
    }
}

/// Looks up `key` and parses it, ignoring values that do not parse.
fn parse_env<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let value = lookup(key)?;
    match value.trim().parse() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            log::warn!("Ignoring unparseable {}={}", key, value);
            None
        }
    }
}

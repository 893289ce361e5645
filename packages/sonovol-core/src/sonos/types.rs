//! Sonos domain types: devices, groups, transport state and audio sources.
//!
//! These types are the live model shared by the topology synchronizer, the
//! source detector, the coordinator selection engine and the collaborator API.

use serde::Serialize;
use thiserror::Error;

use crate::protocol_constants::{
    GROUPED_URI_PREFIX, LINE_IN_URI_PREFIX, STREAMING_URI_PREFIXES, TV_URI_PREFIX,
};

// ─────────────────────────────────────────────────────────────────────────────
// Transport State
// ─────────────────────────────────────────────────────────────────────────────

/// Playback transport state as reported by AVTransport.
///
/// Serializes to the UPnP wire strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransportState {
    Playing,
    #[serde(rename = "PAUSED_PLAYBACK")]
    Paused,
    Stopped,
    Transitioning,
    NoMediaPresent,
}

impl TransportState {
    /// Returns the UPnP wire string.
    #[must_use]
    pub fn as_upnp(&self) -> &'static str {
        match self {
            Self::Playing => "PLAYING",
            Self::Paused => "PAUSED_PLAYBACK",
            Self::Stopped => "STOPPED",
            Self::Transitioning => "TRANSITIONING",
            Self::NoMediaPresent => "NO_MEDIA_PRESENT",
        }
    }
}

impl std::fmt::Display for TransportState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_upnp())
    }
}

/// Error returned when parsing an unknown transport state string.
#[derive(Debug, Clone, Error)]
#[error("unknown transport state: {0}")]
pub struct ParseTransportStateError(pub String);

impl std::str::FromStr for TransportState {
    type Err = ParseTransportStateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "PLAYING" => Ok(Self::Playing),
            "PAUSED_PLAYBACK" | "PAUSED" => Ok(Self::Paused),
            "STOPPED" => Ok(Self::Stopped),
            "TRANSITIONING" => Ok(Self::Transitioning),
            "NO_MEDIA_PRESENT" => Ok(Self::NoMediaPresent),
            other => Err(ParseTransportStateError(other.to_string())),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Audio Source
// ─────────────────────────────────────────────────────────────────────────────

/// What a speaker is currently playing from, derived from its track URI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum AudioSource {
    /// Analog or digital line-in (`x-rincon-stream:`).
    LineIn,
    /// Home-theater input (`x-sonos-htastream:`).
    Tv,
    /// Network streaming or library playback.
    Streaming,
    /// Nothing recognisable is loaded.
    Idle,
    /// Following another speaker's coordinator (`x-rincon:`).
    Grouped,
}

impl AudioSource {
    /// Classifies a track URI by its scheme/prefix.
    ///
    /// # Example
    /// ```ignore
    /// assert_eq!(AudioSource::from_track_uri("x-rincon-stream:RINCON_1"), AudioSource::LineIn);
    /// assert_eq!(AudioSource::from_track_uri(""), AudioSource::Idle);
    /// ```
    #[must_use]
    pub fn from_track_uri(uri: &str) -> Self {
        let uri = uri.trim();
        let lower = uri.to_ascii_lowercase();
        if lower.starts_with(LINE_IN_URI_PREFIX) {
            Self::LineIn
        } else if lower.starts_with(TV_URI_PREFIX) {
            Self::Tv
        } else if lower.starts_with(GROUPED_URI_PREFIX) {
            Self::Grouped
        } else if STREAMING_URI_PREFIXES.iter().any(|p| lower.starts_with(p)) {
            Self::Streaming
        } else {
            Self::Idle
        }
    }
}

impl std::fmt::Display for AudioSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::LineIn => "line-in",
            Self::Tv => "tv",
            Self::Streaming => "streaming",
            Self::Idle => "idle",
            Self::Grouped => "grouped",
        })
    }
}

/// Detected source plus transport state for one speaker.
///
/// Produced per operation by the source detector; only cached as an
/// annotation on [`Device`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioSourceInfo {
    pub source: AudioSource,
    pub transport_state: TransportState,
    pub track_uri: Option<String>,
}

impl AudioSourceInfo {
    /// The fallback used when a speaker could not be queried.
    #[must_use]
    pub fn idle() -> Self {
        Self {
            source: AudioSource::Idle,
            transport_state: TransportState::Stopped,
            track_uri: None,
        }
    }

    /// Returns true when streaming and actively playing.
    #[must_use]
    pub fn is_streaming_and_playing(&self) -> bool {
        self.source == AudioSource::Streaming && self.transport_state == TransportState::Playing
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Devices and Groups
// ─────────────────────────────────────────────────────────────────────────────

/// A discovered speaker in the live model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    /// Stable identifier (`RINCON_…`), `None` if the description was unavailable.
    pub id: Option<String>,
    /// Room or friendly name, or the host address as fallback.
    pub name: String,
    /// IP address the speaker answered from.
    pub ip: String,
    /// Device description URL from the SSDP `LOCATION` header.
    pub location: String,
    /// Model name from the device description.
    pub model: Option<String>,
    /// True when this device leads its group.
    pub is_coordinator: bool,
    /// Coordinator of this device's group, `None` when unknown.
    pub coordinator_id: Option<String>,
    /// Pair identifier when bonded as a stereo pair.
    pub stereo_pair: Option<String>,
    /// Last detected audio source.
    pub source: Option<AudioSource>,
    /// Last detected transport state.
    pub transport_state: Option<TransportState>,
}

impl Device {
    /// Creates an un-annotated device record.
    #[must_use]
    pub fn new(id: Option<String>, name: impl Into<String>, ip: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            ip: ip.into(),
            location: String::new(),
            model: None,
            is_coordinator: false,
            coordinator_id: None,
            stereo_pair: None,
            source: None,
            transport_state: None,
        }
    }

    /// Key for per-device maps: the identifier, or the IP when it is unknown.
    #[must_use]
    pub fn key(&self) -> &str {
        self.id.as_deref().unwrap_or(&self.ip)
    }

    /// Returns true if this device matches `id_or_name` (identifier, name or IP).
    #[must_use]
    pub fn matches(&self, id_or_name: &str) -> bool {
        self.id.as_deref() == Some(id_or_name)
            || self.ip == id_or_name
            || self.name.eq_ignore_ascii_case(id_or_name)
    }
}

/// A set of speakers playing in sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub id: String,
    /// Name built from member rooms, coordinator first.
    pub name: String,
    pub coordinator_id: String,
    /// Member device identifiers in topology order, coordinator included.
    pub members: Vec<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Zone Group Topology (wire model)
// ─────────────────────────────────────────────────────────────────────────────

/// A member entry from a `ZoneGroupState` document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneGroupMember {
    /// Unique identifier in RINCON_xxxxx format.
    pub uuid: String,
    /// IP address taken from the member's `Location`, if present.
    pub ip: Option<String>,
    /// User-configured room name.
    pub zone_name: String,
    /// Pair identifier from `ChannelMapSet` when part of a stereo pair.
    pub stereo_pair: Option<String>,
    /// Hidden members (the secondary of a pair, satellites).
    pub invisible: bool,
}

/// A group entry from a `ZoneGroupState` document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneGroup {
    pub id: String,
    pub name: String,
    pub coordinator_uuid: String,
    /// All members including the coordinator. Zone bridges are excluded.
    pub members: Vec<ZoneGroupMember>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_track_uris() {
        assert_eq!(
            AudioSource::from_track_uri("x-rincon-stream:RINCON_000E58A0123401400"),
            AudioSource::LineIn
        );
        assert_eq!(
            AudioSource::from_track_uri("x-sonos-htastream:RINCON_000E58A0123401400:spdif"),
            AudioSource::Tv
        );
        assert_eq!(
            AudioSource::from_track_uri("x-rincon:RINCON_000E58A0123401400"),
            AudioSource::Grouped
        );
        assert_eq!(
            AudioSource::from_track_uri("x-sonos-spotify:spotify%3atrack%3a123?sid=9"),
            AudioSource::Streaming
        );
        assert_eq!(
            AudioSource::from_track_uri("x-sonosapi-stream:s1234?sid=254"),
            AudioSource::Streaming
        );
        assert_eq!(
            AudioSource::from_track_uri("https://example.com/track.mp3"),
            AudioSource::Streaming
        );
        assert_eq!(AudioSource::from_track_uri(""), AudioSource::Idle);
        assert_eq!(AudioSource::from_track_uri("mystery:thing"), AudioSource::Idle);
    }

    #[test]
    fn transport_state_parses_wire_strings() {
        assert_eq!("PLAYING".parse::<TransportState>().unwrap(), TransportState::Playing);
        assert_eq!(
            "PAUSED_PLAYBACK".parse::<TransportState>().unwrap(),
            TransportState::Paused
        );
        assert!("DANCING".parse::<TransportState>().is_err());
        assert_eq!(TransportState::Stopped.to_string(), "STOPPED");
    }

    #[test]
    fn device_key_falls_back_to_ip() {
        let with_id = Device::new(Some("RINCON_A".into()), "Kitchen", "10.0.0.2");
        let without_id = Device::new(None, "10.0.0.3", "10.0.0.3");
        assert_eq!(with_id.key(), "RINCON_A");
        assert_eq!(without_id.key(), "10.0.0.3");
        assert!(with_id.matches("kitchen"));
        assert!(with_id.matches("10.0.0.2"));
    }
}

//! GENA event XML parsing.
//!
//! Pure functions over NOTIFY bodies. AVTransport and RenderingControl wrap
//! their state in an entity-encoded `LastChange` document, which is decoded
//! before its `val` attributes are read. ZoneGroupTopology bodies are parsed
//! by [`zone_groups::parse_topology_notify`](super::zone_groups::parse_topology_notify).

use serde::Serialize;

use crate::protocol_constants::MAX_VOLUME;
use crate::sonos::types::{AudioSource, TransportState};
use crate::sonos::utils::{extract_empty_val_attrs, extract_xml_text};

/// State carried by an AVTransport NOTIFY.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransportChange {
    pub transport_state: Option<TransportState>,
    pub track_uri: Option<String>,
    /// Decoded DIDL-Lite metadata of the current track.
    pub track_metadata: Option<String>,
}

impl TransportChange {
    /// Source classification of the reported track, if a URI was reported.
    #[must_use]
    pub fn source(&self) -> Option<AudioSource> {
        self.track_uri.as_deref().map(AudioSource::from_track_uri)
    }
}

/// State carried by a RenderingControl NOTIFY (Master channel only).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderingChange {
    pub volume: Option<u8>,
    pub muted: Option<bool>,
}

/// Returns the decoded `LastChange` document of a NOTIFY body.
fn last_change(body: &str) -> Option<String> {
    extract_xml_text(body, "LastChange")
}

/// Parses an AVTransport NOTIFY body.
///
/// Returns `None` when the body has no `LastChange` property. An empty
/// `CurrentTrackURI` or `CurrentTrackMetaData` is reported as `None`.
#[must_use]
pub fn parse_transport_notify(body: &str) -> Option<TransportChange> {
    let decoded = last_change(body)?;
    let attrs = extract_empty_val_attrs(
        &decoded,
        &["TransportState", "CurrentTrackURI", "CurrentTrackMetaData"],
        None,
    );

    let non_empty = |key: &str| attrs.get(key).filter(|v| !v.is_empty()).cloned();

    Some(TransportChange {
        transport_state: attrs.get("TransportState").and_then(|v| match v.parse() {
            Ok(state) => Some(state),
            Err(e) => {
                log::debug!("[GENA] {}", e);
                None
            }
        }),
        track_uri: non_empty("CurrentTrackURI"),
        track_metadata: non_empty("CurrentTrackMetaData"),
    })
}

/// Parses a RenderingControl NOTIFY body.
///
/// Stereo pairs report `LF`/`RF` channels alongside `Master`; only `Master`
/// counts. Volumes are clamped to 0..=100.
#[must_use]
pub fn parse_rendering_notify(body: &str) -> Option<RenderingChange> {
    let decoded = last_change(body)?;
    let attrs = extract_empty_val_attrs(&decoded, &["Volume", "Mute"], Some("Master"));

    Some(RenderingChange {
        volume: attrs
            .get("Volume")
            .and_then(|v| v.parse::<u16>().ok())
            .map(|v| v.min(u16::from(MAX_VOLUME)) as u8),
        muted: attrs.get("Mute").map(|v| v == "1"),
    })
}

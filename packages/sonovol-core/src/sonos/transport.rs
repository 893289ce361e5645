//! AVTransport queries used by source detection.

use reqwest::Client;

use crate::error::SoapResult;
use crate::sonos::services::SonosService;
use crate::sonos::soap::{require_field, SoapError, SoapRequestBuilder};
use crate::sonos::types::TransportState;
use crate::sonos::utils::extract_xml_text;

/// Current track as reported by `GetPositionInfo`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PositionInfo {
    /// Empty when nothing is loaded.
    pub track_uri: String,
    pub track_metadata: Option<String>,
    /// "H:MM:SS", or "NOT_IMPLEMENTED" for live sources.
    pub rel_time: String,
}

/// Queries `GetTransportInfo` for the current transport state.
///
/// # Errors
/// Network failures, a missing `CurrentTransportState`, or an unknown state.
pub async fn get_transport_info(client: &Client, ip: &str) -> SoapResult<TransportState> {
    let response = SoapRequestBuilder::new(client, ip)
        .service(SonosService::AVTransport)
        .action("GetTransportInfo")
        .instance_id()
        .send()
        .await?;
    parse_transport_info(&response)
}

fn parse_transport_info(xml: &str) -> SoapResult<TransportState> {
    require_field(xml, "CurrentTransportState")?
        .parse::<TransportState>()
        .map_err(|e| SoapError::Parse(e.to_string()))
}

/// Queries `GetPositionInfo` for the current track.
///
/// # Errors
/// Network failures or a response without `TrackURI`.
pub async fn get_position_info(client: &Client, ip: &str) -> SoapResult<PositionInfo> {
    let response = SoapRequestBuilder::new(client, ip)
        .service(SonosService::AVTransport)
        .action("GetPositionInfo")
        .instance_id()
        .send()
        .await?;
    parse_position_info(&response)
}

fn parse_position_info(xml: &str) -> SoapResult<PositionInfo> {
    Ok(PositionInfo {
        track_uri: require_field(xml, "TrackURI")?,
        track_metadata: extract_xml_text(xml, "TrackMetaData").filter(|m| !m.is_empty()),
        rel_time: extract_xml_text(xml, "RelTime").unwrap_or_else(|| "0:00:00".to_string()),
    })
}

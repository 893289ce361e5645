//! Volume and mute control.
//!
//! Per-speaker calls go to RenderingControl (`Channel=Master`); group calls
//! go to GroupRenderingControl on the coordinator, which scales every member
//! proportionally.

use reqwest::Client;

use crate::error::SoapResult;
use crate::protocol_constants::MAX_VOLUME;
use crate::sonos::services::SonosService;
use crate::sonos::soap::{require_field, SoapError, SoapRequestBuilder};

/// Clamps a requested level into the accepted range.
#[must_use]
pub fn clamp_volume(level: i32) -> u8 {
    level.clamp(0, i32::from(MAX_VOLUME)) as u8
}

/// Applies `delta` to `current`, clamped to 0..=100.
#[must_use]
pub fn apply_delta(current: u8, delta: i32) -> u8 {
    clamp_volume(i32::from(current).saturating_add(delta))
}

fn parse_volume(xml: &str) -> SoapResult<u8> {
    let raw = require_field(xml, "CurrentVolume")?;
    raw.trim()
        .parse::<u16>()
        .map(|v| v.min(u16::from(MAX_VOLUME)) as u8)
        .map_err(|_| SoapError::Parse(format!("CurrentVolume '{}'", raw)))
}

fn parse_mute(xml: &str) -> SoapResult<bool> {
    Ok(require_field(xml, "CurrentMute")?.trim() == "1")
}

fn mute_arg(mute: bool) -> &'static str {
    if mute {
        "1"
    } else {
        "0"
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Per-Speaker
// ─────────────────────────────────────────────────────────────────────────────

/// Gets a speaker's Master volume (0-100).
pub async fn get_speaker_volume(client: &Client, ip: &str) -> SoapResult<u8> {
    let response = SoapRequestBuilder::new(client, ip)
        .service(SonosService::RenderingControl)
        .action("GetVolume")
        .instance_id()
        .master_channel()
        .send()
        .await?;
    parse_volume(&response)
}

/// Sets a speaker's Master volume. Values above 100 are clamped.
pub async fn set_speaker_volume(client: &Client, ip: &str, volume: u8) -> SoapResult<()> {
    SoapRequestBuilder::new(client, ip)
        .service(SonosService::RenderingControl)
        .action("SetVolume")
        .instance_id()
        .master_channel()
        .arg("DesiredVolume", volume.min(MAX_VOLUME).to_string())
        .send()
        .await?;
    Ok(())
}

/// Gets a speaker's Master mute state.
pub async fn get_speaker_mute(client: &Client, ip: &str) -> SoapResult<bool> {
    let response = SoapRequestBuilder::new(client, ip)
        .service(SonosService::RenderingControl)
        .action("GetMute")
        .instance_id()
        .master_channel()
        .send()
        .await?;
    parse_mute(&response)
}

/// Sets a speaker's Master mute state.
pub async fn set_speaker_mute(client: &Client, ip: &str, mute: bool) -> SoapResult<()> {
    SoapRequestBuilder::new(client, ip)
        .service(SonosService::RenderingControl)
        .action("SetMute")
        .instance_id()
        .master_channel()
        .arg("DesiredMute", mute_arg(mute))
        .send()
        .await?;
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Group (coordinator only)
// ─────────────────────────────────────────────────────────────────────────────

/// Gets the combined group volume from the coordinator (0-100).
pub async fn get_group_volume(client: &Client, coordinator_ip: &str) -> SoapResult<u8> {
    let response = SoapRequestBuilder::new(client, coordinator_ip)
        .service(SonosService::GroupRenderingControl)
        .action("GetGroupVolume")
        .instance_id()
        .send()
        .await?;
    parse_volume(&response)
}

/// Sets the group volume on the coordinator. Values above 100 are clamped.
pub async fn set_group_volume(client: &Client, coordinator_ip: &str, volume: u8) -> SoapResult<()> {
    SoapRequestBuilder::new(client, coordinator_ip)
        .service(SonosService::GroupRenderingControl)
        .action("SetGroupVolume")
        .instance_id()
        .arg("DesiredVolume", volume.min(MAX_VOLUME).to_string())
        .send()
        .await?;
    Ok(())
}

/// Gets the group mute state from the coordinator.
pub async fn get_group_mute(client: &Client, coordinator_ip: &str) -> SoapResult<bool> {
    let response = SoapRequestBuilder::new(client, coordinator_ip)
        .service(SonosService::GroupRenderingControl)
        .action("GetGroupMute")
        .instance_id()
        .send()
        .await?;
    parse_mute(&response)
}

/// Sets the group mute state on the coordinator.
pub async fn set_group_mute(client: &Client, coordinator_ip: &str, mute: bool) -> SoapResult<()> {
    SoapRequestBuilder::new(client, coordinator_ip)
        .service(SonosService::GroupRenderingControl)
        .action("SetGroupMute")
        .instance_id()
        .arg("DesiredMute", mute_arg(mute))
        .send()
        .await?;
    Ok(())
}

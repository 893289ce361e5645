//! Device description fetching.
//!
//! Each SSDP candidate's `LOCATION` document yields the display name and the
//! stable identifier. A failed fetch degrades the device instead of dropping
//! it: the host address becomes the name and the identifier stays unknown.

use std::time::Duration;

use quick_xml::events::Event;
use quick_xml::reader::Reader;
use reqwest::Client;

use super::types::{normalize_uuid, DeviceDescription, SsdpCandidate};
use crate::sonos::types::Device;

/// Parses a UPnP device description.
///
/// The first `UDN` in document order belongs to the root device; embedded
/// MediaRenderer/MediaServer devices repeat it with a suffix. `roomName` is
/// preferred over `friendlyName`, which Sonos formats as "IP - Model".
pub fn parse_device_description(xml: &str) -> DeviceDescription {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();

    let mut udn = None;
    let mut room_name = None;
    let mut friendly_name = None;
    let mut model_name = None;

    loop {
        buf.clear();
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let slot = match e.local_name().as_ref() {
                    b"UDN" => Some(&mut udn),
                    b"roomName" => Some(&mut room_name),
                    b"friendlyName" => Some(&mut friendly_name),
                    b"modelName" => Some(&mut model_name),
                    _ => None,
                };
                if let Some(slot) = slot.filter(|s| s.is_none()) {
                    *slot = reader
                        .read_text(e.name())
                        .ok()
                        .map(|t| html_escape::decode_html_entities(&t).trim().to_string())
                        .filter(|t| !t.is_empty());
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                log::debug!("[Discovery] Device description parse error: {}", e);
                break;
            }
            _ => {}
        }
    }

    DeviceDescription {
        id: udn.map(|u| normalize_uuid(&u)).filter(|id| !id.is_empty()),
        name: room_name.or(friendly_name),
        model_name,
    }
}

/// Fetches and parses a description document with a bounded timeout.
///
/// Returns `None` (after logging) on any transport or status failure.
pub async fn fetch_description(
    client: &Client,
    url: &str,
    timeout: Duration,
) -> Option<DeviceDescription> {
    let response = match client.get(url).timeout(timeout).send().await {
        Ok(r) => r,
        Err(e) => {
            log::warn!("[Discovery] Description fetch failed for {}: {}", url, e);
            return None;
        }
    };
    if !response.status().is_success() {
        log::warn!(
            "[Discovery] Description fetch for {} returned {}",
            url,
            response.status()
        );
        return None;
    }
    match response.text().await {
        Ok(body) => Some(parse_device_description(&body)),
        Err(e) => {
            log::warn!("[Discovery] Description body unreadable for {}: {}", url, e);
            None
        }
    }
}

/// Resolves a candidate into a [`Device`], falling back to the host address
/// as the name when the description is unavailable or nameless.
pub async fn resolve_candidate(
    client: &Client,
    candidate: &SsdpCandidate,
    timeout: Duration,
) -> Device {
    let description = fetch_description(client, &candidate.location, timeout)
        .await
        .unwrap_or_default();

    let name = description.name.unwrap_or_else(|| {
        log::info!(
            "[Discovery] No name for {}, using host address",
            candidate.location
        );
        candidate.ip.clone()
    });

    let mut device = Device::new(
        description.id.or_else(|| candidate.usn_uuid.clone()),
        name,
        candidate.ip.clone(),
    );
    device.location = candidate.location.clone();
    device.model = description.model_name;
    device
}

#[cfg(test)]
mod tests {
    use super::*;

    const DESCRIPTION: &str = r#"<?xml version="1.0" encoding="utf-8" ?>
<root xmlns="urn:schemas-upnp-org:device-1-0">
  <specVersion><major>1</major><minor>0</minor></specVersion>
  <device>
    <deviceType>urn:schemas-upnp-org:device:ZonePlayer:1</deviceType>
    <friendlyName>192.168.1.10 - Sonos One - RINCON_ABC123</friendlyName>
    <manufacturer>Sonos, Inc.</manufacturer>
    <modelName>Sonos One</modelName>
    <UDN>uuid:RINCON_ABC123</UDN>
    <roomName>Kitchen &amp; Dining</roomName>
    <deviceList>
      <device>
        <deviceType>urn:schemas-upnp-org:device:MediaRenderer:1</deviceType>
        <friendlyName>Kitchen - Sonos One Media Renderer</friendlyName>
        <UDN>uuid:RINCON_ABC123_MR</UDN>
      </device>
    </deviceList>
  </device>
</root>"#;

    #[test]
    fn room_name_and_root_udn_win() {
        let desc = parse_device_description(DESCRIPTION);
        assert_eq!(desc.id.as_deref(), Some("RINCON_ABC123"));
        assert_eq!(desc.name.as_deref(), Some("Kitchen & Dining"));
        assert_eq!(desc.model_name.as_deref(), Some("Sonos One"));
    }

    #[test]
    fn friendly_name_is_used_without_room_name() {
        let xml = r#"<root><device><friendlyName>Living Room TV</friendlyName><UDN>uuid:abc-123</UDN></device></root>"#;
        let desc = parse_device_description(xml);
        assert_eq!(desc.name.as_deref(), Some("Living Room TV"));
        assert_eq!(desc.id.as_deref(), Some("abc-123"));
    }

    #[test]
    fn garbage_yields_empty_description() {
        let desc = parse_device_description("<<<not xml");
        assert_eq!(desc, DeviceDescription::default());
    }

    #[tokio::test]
    async fn unreachable_location_falls_back_to_host() {
        let client = Client::new();
        let candidate = SsdpCandidate {
            ip: "127.0.0.1".into(),
            // Port 9 (discard) is closed on test hosts, so the fetch fails fast.
            location: "http://127.0.0.1:9/xml/device_description.xml".into(),
            usn_uuid: Some("RINCON_FROM_USN".into()),
        };
        let device = resolve_candidate(&client, &candidate, Duration::from_millis(500)).await;
        assert_eq!(device.name, "127.0.0.1");
        assert_eq!(device.id.as_deref(), Some("RINCON_FROM_USN"));
        assert_eq!(device.location, candidate.location);
    }
}

//! Discovery pipeline against real HTTP description endpoints.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::Path;
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use sonovol_core::sonos::discovery::ssdp::{collapse_repeats, parse_ssdp_response};
use sonovol_core::error::SoapResult;
use sonovol_core::services::{RefreshOutcome, TopologySynchronizer};
use sonovol_core::sonos::discovery::{resolve_candidates, SsdpCandidate};
use sonovol_core::sonos::traits::SonosTopology;
use sonovol_core::sonos::types::ZoneGroup;
use sonovol_core::sonos::zone_groups::parse_zone_group_xml;
use sonovol_core::SonosState;
use tokio::net::TcpListener;

fn description(room: &str, udn: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="utf-8" ?>
<root xmlns="urn:schemas-upnp-org:device-1-0">
  <device>
    <deviceType>urn:schemas-upnp-org:device:ZonePlayer:1</deviceType>
    <friendlyName>10.0.0.9 - Sonos One - {udn}</friendlyName>
    <modelName>Sonos One</modelName>
    <UDN>uuid:{udn}</UDN>
    <roomName>{room}</roomName>
  </device>
</root>"#
    )
}

async fn serve_descriptions() -> String {
    async fn handler(Path(file): Path<String>) -> Result<String, StatusCode> {
        match file.as_str() {
            "kitchen.xml" => Ok(description("Kitchen", "RINCON_KITCHEN01400")),
            "den.xml" => Ok(description("Den", "RINCON_DEN01400")),
            "office.xml" => Ok(description("Office", "RINCON_OFFICE01400")),
            "kitchen-again.xml" => Ok(description("Kitchen", "RINCON_SECOND01400")),
            _ => Err(StatusCode::NOT_FOUND),
        }
    }

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = Router::new().route("/xml/{file}", get(handler));
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}/xml", addr)
}

fn candidate(ip: &str, location: String) -> SsdpCandidate {
    SsdpCandidate {
        ip: ip.to_string(),
        location,
        usn_uuid: None,
    }
}

#[tokio::test]
async fn resolves_dedupes_and_sorts_candidates() {
    let base = serve_descriptions().await;
    let client = reqwest::Client::new();
    let candidates = vec![
        candidate("10.0.0.2", format!("{}/kitchen.xml", base)),
        candidate("10.0.0.4", format!("{}/office.xml", base)),
        candidate("10.0.0.3", format!("{}/den.xml", base)),
        candidate("10.0.0.7", format!("{}/kitchen-again.xml", base)),
    ];

    let devices = resolve_candidates(&client, &candidates, Duration::from_secs(3)).await;

    let names: Vec<&str> = devices.iter().map(|d| d.name.as_str()).collect();
    assert_eq!(names, vec!["Den", "Kitchen", "Office"]);
    let kitchen = devices.iter().find(|d| d.name == "Kitchen").unwrap();
    assert_eq!(kitchen.id.as_deref(), Some("RINCON_KITCHEN01400"));
    assert_eq!(kitchen.ip, "10.0.0.2");
    assert_eq!(kitchen.model.as_deref(), Some("Sonos One"));
}

#[tokio::test]
async fn missing_description_falls_back_to_address() {
    let base = serve_descriptions().await;
    let client = reqwest::Client::new();
    let candidates = vec![
        candidate("10.0.0.2", format!("{}/kitchen.xml", base)),
        SsdpCandidate {
            usn_uuid: Some("RINCON_GONE01400".into()),
            ..candidate("10.0.0.8", format!("{}/gone.xml", base))
        },
    ];

    let devices = resolve_candidates(&client, &candidates, Duration::from_secs(3)).await;

    assert_eq!(devices.len(), 2);
    let fallback = devices.iter().find(|d| d.ip == "10.0.0.8").unwrap();
    assert_eq!(fallback.name, "10.0.0.8");
    assert_eq!(fallback.id.as_deref(), Some("RINCON_GONE01400"));
}

const KITCHEN_AND_DEN_XML: &str = r#"<ZoneGroupState><ZoneGroups>
<ZoneGroup Coordinator="RINCON_KITCHEN01400" ID="K:1"><ZoneGroupMember UUID="RINCON_KITCHEN01400" ZoneName="Kitchen"/><ZoneGroupMember UUID="RINCON_DEN01400" ZoneName="Den"/></ZoneGroup>
<ZoneGroup Coordinator="RINCON_OFFICE01400" ID="O:1"><ZoneGroupMember UUID="RINCON_OFFICE01400" ZoneName="Office"/></ZoneGroup>
</ZoneGroups></ZoneGroupState>"#;

/// Answers every topology query with a fixed document.
struct FixedTopology;

#[async_trait]
impl SonosTopology for FixedTopology {
    async fn get_zone_groups(&self, _ip: &str) -> SoapResult<Vec<ZoneGroup>> {
        parse_zone_group_xml(KITCHEN_AND_DEN_XML)
    }
}

fn ssdp_response(location: &str, usn: &str) -> String {
    format!(
        "HTTP/1.1 200 OK\r\n\
         CACHE-CONTROL: max-age = 1800\r\n\
         EXT:\r\n\
         LOCATION: {location}\r\n\
         SERVER: Linux UPnP/1.0 Sonos/63.2-88230 (ZPS9)\r\n\
         ST: urn:schemas-upnp-org:device:ZonePlayer:1\r\n\
         USN: uuid:{usn}::urn:schemas-upnp-org:device:ZonePlayer:1\r\n\r\n"
    )
}

#[tokio::test]
async fn raw_responses_become_grouped_devices() {
    let base = serve_descriptions().await;
    let client = reqwest::Client::new();
    let kitchen = format!("{}/kitchen.xml", base);
    let den = format!("{}/den.xml", base);
    let office = format!("{}/office.xml", base);

    // Datagrams in arrival order, as received on the probe sockets.
    let datagrams = vec![
        (ssdp_response(&kitchen, "RINCON_KITCHEN01400"), "10.0.0.2"),
        (
            format!("HTTP/1.1 200 OK\nlocation: {}\nusn: UUID:RINCON_DEN01400::urn:x\n\n", den),
            "10.0.0.3",
        ),
        (ssdp_response(&kitchen, "RINCON_KITCHEN01400"), "10.0.0.2"),
        (format!("NOTIFY * HTTP/1.1\r\nLOCATION: {}\r\n\r\n", office), "10.0.0.4"),
        ("\u{0}\u{1}garbage".to_string(), "10.0.0.5"),
        ("HTTP/1.1 200 OK\r\nUSN: uuid:RINCON_NOWHERE\r\n\r\n".to_string(), "10.0.0.6"),
        (ssdp_response(&office, "RINCON_OFFICE01400"), "10.0.0.4"),
    ];

    let parsed = datagrams
        .iter()
        .filter_map(|(body, src)| parse_ssdp_response(body, src));
    let candidates = collapse_repeats(parsed);
    assert_eq!(candidates.len(), 3);
    assert_eq!(candidates[1].usn_uuid.as_deref(), Some("RINCON_DEN01400"));

    let devices = resolve_candidates(&client, &candidates, Duration::from_secs(3)).await;

    let summary: Vec<(&str, &str, Option<&str>)> = devices
        .iter()
        .map(|d| (d.name.as_str(), d.ip.as_str(), d.id.as_deref()))
        .collect();
    assert_eq!(
        summary,
        vec![
            ("Den", "10.0.0.3", Some("RINCON_DEN01400")),
            ("Kitchen", "10.0.0.2", Some("RINCON_KITCHEN01400")),
            ("Office", "10.0.0.4", Some("RINCON_OFFICE01400")),
        ]
    );

    let state = Arc::new(SonosState::default());
    state.set_devices(devices);
    let topology = TopologySynchronizer::new(state.clone(), Arc::new(FixedTopology));
    assert_eq!(topology.refresh(false).await, RefreshOutcome::Replaced);

    let den = state.device("Den").unwrap();
    assert_eq!(den.coordinator_id.as_deref(), Some("RINCON_KITCHEN01400"));
    assert!(!den.is_coordinator);
    assert!(state.device("Kitchen").unwrap().is_coordinator);
    assert!(state.device("Office").unwrap().is_coordinator);
    assert_eq!(state.groups().len(), 2);
}

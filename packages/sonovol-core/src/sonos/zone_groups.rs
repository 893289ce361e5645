//! Zone group topology parsing and retrieval.
//!
//! Parses `ZoneGroupState` XML into [`ZoneGroup`]s and fetches it from any
//! speaker via `GetZoneGroupState`. The same parser serves SOAP responses and
//! ZoneGroupTopology NOTIFY bodies.

use std::collections::HashMap;

use quick_xml::events::Event;
use quick_xml::reader::Reader;
use reqwest::Client;

use crate::error::SoapResult;
use crate::sonos::services::SonosService;
use crate::sonos::soap::{require_field, SoapError, SoapRequestBuilder};
use crate::sonos::types::{ZoneGroup, ZoneGroupMember};
use crate::sonos::utils::{get_xml_attr, host_from_location};

/// Parses `ZoneGroupState` XML (already unescaped) into zone groups.
///
/// # Filtering
/// - Zone bridges (`IsZoneBridge="1"`) are skipped: they cannot play audio.
/// - Groups with no coordinator or no playable members are dropped.
///
/// # Errors
/// Returns [`SoapError::Parse`] on malformed XML. A partial parse is never
/// returned, so callers can keep their previous topology intact.
pub fn parse_zone_group_xml(xml: &str) -> SoapResult<Vec<ZoneGroup>> {
    let mut groups = Vec::new();
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();

    let mut current: Option<ZoneGroup> = None;

    loop {
        buf.clear();
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => match e.name().as_ref() {
                b"ZoneGroup" => {
                    current = Some(ZoneGroup {
                        id: get_xml_attr(e, b"ID").unwrap_or_default(),
                        coordinator_uuid: get_xml_attr(e, b"Coordinator").unwrap_or_default(),
                        ..ZoneGroup::default()
                    });
                }
                b"ZoneGroupMember" | b"Satellite" => {
                    let Some(group) = current.as_mut() else {
                        continue;
                    };
                    if get_xml_attr(e, b"IsZoneBridge").as_deref() == Some("1") {
                        continue;
                    }
                    let Some(uuid) = get_xml_attr(e, b"UUID") else {
                        continue;
                    };
                    let satellite = e.name().as_ref() == b"Satellite";
                    group.members.push(ZoneGroupMember {
                        ip: get_xml_attr(e, b"Location").and_then(|l| host_from_location(&l)),
                        zone_name: get_xml_attr(e, b"ZoneName").unwrap_or_default(),
                        stereo_pair: get_xml_attr(e, b"ChannelMapSet")
                            .and_then(|map| pair_id_from_channel_map(&map)),
                        invisible: satellite
                            || get_xml_attr(e, b"Invisible").as_deref() == Some("1"),
                        uuid,
                    });
                }
                _ => {}
            },
            Ok(Event::End(ref e)) if e.name().as_ref() == b"ZoneGroup" => {
                if let Some(mut group) = current.take() {
                    let has_coordinator = group
                        .members
                        .iter()
                        .any(|m| m.uuid == group.coordinator_uuid);
                    if has_coordinator {
                        group.name = group_name(&group);
                        groups.push(group);
                    } else {
                        log::debug!(
                            "[Topology] Skipping group {} without a playable coordinator",
                            group.id
                        );
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(SoapError::Parse(format!("ZoneGroupState: {}", e))),
            _ => {}
        }
    }

    Ok(groups)
}

/// Derives a stable pair identifier from a `ChannelMapSet` attribute.
///
/// Format: `"RINCON_L:LF,LF;RINCON_R:RF,RF"`. The identifier is the smallest
/// UUID in the set, so both halves of a pair report the same value.
fn pair_id_from_channel_map(map: &str) -> Option<String> {
    map.split(';')
        .filter_map(|entry| entry.split_once(':').map(|(uuid, _)| uuid.trim()))
        .filter(|uuid| !uuid.is_empty())
        .min()
        .map(str::to_string)
}

/// Builds a group name: coordinator room first, then other distinct rooms.
fn group_name(group: &ZoneGroup) -> String {
    let mut names: Vec<&str> = Vec::new();
    if let Some(coordinator) = group
        .members
        .iter()
        .find(|m| m.uuid == group.coordinator_uuid)
    {
        names.push(&coordinator.zone_name);
    }
    for member in &group.members {
        let name = member.zone_name.as_str();
        if !name.is_empty() && !names.contains(&name) {
            names.push(name);
        }
    }
    names.join(", ")
}

/// Flattens groups into a member-identifier → coordinator-identifier map.
#[must_use]
pub fn coordinator_map(groups: &[ZoneGroup]) -> HashMap<String, String> {
    groups
        .iter()
        .flat_map(|g| {
            g.members
                .iter()
                .map(move |m| (m.uuid.clone(), g.coordinator_uuid.clone()))
        })
        .collect()
}

/// Extracts and parses the topology carried by a ZoneGroupTopology NOTIFY body.
///
/// # Errors
/// [`SoapError::MissingField`] if the body has no `ZoneGroupState` property
/// (Sonos also sends NOTIFYs for other topology variables).
pub fn parse_topology_notify(body: &str) -> SoapResult<Vec<ZoneGroup>> {
    let decoded = require_field(body, "ZoneGroupState")?;
    parse_zone_group_xml(&decoded)
}

/// Fetches and parses the current zone groups from any speaker.
///
/// # Errors
/// Network failures, a missing `ZoneGroupState` field, or malformed XML.
pub async fn get_zone_groups(client: &Client, ip: &str) -> SoapResult<Vec<ZoneGroup>> {
    let response = SoapRequestBuilder::new(client, ip)
        .service(SonosService::ZoneGroupTopology)
        .action("GetZoneGroupState")
        .send()
        .await?;

    let decoded = require_field(&response, "ZoneGroupState")?;
    parse_zone_group_xml(&decoded)
}

//! XML field extraction and URL helpers shared by the SOAP, discovery and
//! GENA layers.
//!
//! Extraction works on a fixed field contract: callers name the element (by
//! local name, ignoring namespace prefixes) and optionally an attribute. A
//! streaming parser does the matching, so attribute order and whitespace do
//! not matter.

use std::collections::HashMap;

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use crate::protocol_constants::SONOS_PORT;

// ─────────────────────────────────────────────────────────────────────────────
// XML Parsing Utilities
// ─────────────────────────────────────────────────────────────────────────────

/// Extracts the decoded text content of the first element named `element_name`.
///
/// HTML entities are decoded, so an element holding escaped XML (such as
/// `LastChange` or `ZoneGroupState`) comes back as re-parseable XML.
///
/// # Example
/// ```ignore
/// let xml = r#"<u:CurrentVolume>42</u:CurrentVolume>"#;
/// assert_eq!(extract_xml_text(xml, "CurrentVolume"), Some("42".to_string()));
/// ```
pub fn extract_xml_text(xml: &str, element_name: &str) -> Option<String> {
    extract_section(xml, element_name)
        .map(|raw| html_escape::decode_html_entities(&raw).into_owned())
}

/// Returns the raw inner content of the first element named `element_name`.
///
/// Unlike [`extract_xml_text`] nothing is decoded: nested markup is returned
/// verbatim.
pub fn extract_section(xml: &str, element_name: &str) -> Option<String> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();
    let target = element_name.as_bytes();

    loop {
        buf.clear();
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) if e.local_name().as_ref() == target => {
                return reader.read_text(e.name()).ok().map(|t| t.to_string());
            }
            Ok(Event::Empty(ref e)) if e.local_name().as_ref() == target => {
                return Some(String::new());
            }
            Ok(Event::Eof) | Err(_) => return None,
            _ => {}
        }
    }
}

/// Returns attribute `attr_name` of the first element named `element_name`.
///
/// Both start tags and self-closing tags are considered. Entities in the value
/// are decoded.
pub fn extract_attribute(xml: &str, element_name: &str, attr_name: &str) -> Option<String> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();
    let target = element_name.as_bytes();

    loop {
        buf.clear();
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e))
                if e.local_name().as_ref() == target =>
            {
                return get_xml_attr(e, attr_name.as_bytes());
            }
            Ok(Event::Eof) | Err(_) => return None,
            _ => {}
        }
    }
}

/// Extracts `val` attributes from empty elements.
///
/// UPnP `LastChange` documents carry state as `<TransportState val="PLAYING"/>`.
/// Only elements that exist and have a `val` attribute are included.
///
/// When an element appears more than once (RenderingControl reports one
/// `Volume` per channel) the first occurrence wins unless `channel` is given,
/// in which case only elements with a matching `channel` attribute count.
pub fn extract_empty_val_attrs(
    xml: &str,
    element_names: &[&str],
    channel: Option<&str>,
) -> HashMap<String, String> {
    let mut result = HashMap::new();
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();

    loop {
        buf.clear();
        match reader.read_event_into(&mut buf) {
            Ok(Event::Empty(ref e)) => {
                let local = e.local_name();
                let Some(name) = element_names
                    .iter()
                    .find(|n| n.as_bytes() == local.as_ref())
                else {
                    continue;
                };
                if let Some(wanted) = channel {
                    if let Some(found) = get_xml_attr(e, b"channel") {
                        if found != wanted {
                            continue;
                        }
                    }
                }
                if let Some(val) = get_xml_attr(e, b"val") {
                    result.entry((*name).to_string()).or_insert(val);
                }
            }
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
    }

    result
}

/// Gets an attribute value from an XML element, decoding entities.
pub fn get_xml_attr(elem: &BytesStart, attr_name: &[u8]) -> Option<String> {
    elem.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == attr_name)
        .map(|a| {
            let raw = String::from_utf8_lossy(&a.value);
            html_escape::decode_html_entities(&raw).into_owned()
        })
}

// ─────────────────────────────────────────────────────────────────────────────
// URLs
// ─────────────────────────────────────────────────────────────────────────────

/// Extracts the host from a UPnP `LOCATION` URL.
///
/// # Example
/// ```ignore
/// let ip = host_from_location("http://192.168.1.100:1400/xml/device_description.xml");
/// assert_eq!(ip, Some("192.168.1.100".to_string()));
/// ```
pub fn host_from_location(location: &str) -> Option<String> {
    let url = reqwest::Url::parse(location.trim()).ok()?;
    match url.scheme() {
        "http" | "https" => url.host_str().map(str::to_string),
        _ => None,
    }
}

/// Builds a speaker URL for the given IP and endpoint.
pub fn build_sonos_url(ip: &str, endpoint: &str) -> String {
    format!("http://{}:{}{}", ip, SONOS_PORT, endpoint)
}

// ─────────────────────────────────────────────────────────────────────────────
// XML Encoding
// ─────────────────────────────────────────────────────────────────────────────

/// Escapes the five XML special characters for embedding in element content.
pub fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

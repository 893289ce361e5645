//! Group membership commands.
//!
//! Joining points a member's AVTransport at its coordinator with the
//! `x-rincon:` scheme; leaving makes the speaker the coordinator of its own
//! standalone group.

use reqwest::Client;

use crate::error::SoapResult;
use crate::protocol_constants::GROUPED_URI_PREFIX;
use crate::sonos::retry::RetryPolicy;
use crate::sonos::services::SonosService;
use crate::sonos::soap::SoapRequestBuilder;

/// Builds the transport URI that makes a speaker follow `coordinator_uuid`.
#[must_use]
pub fn group_uri(coordinator_uuid: &str) -> String {
    format!("{}{}", GROUPED_URI_PREFIX, coordinator_uuid)
}

/// Adds the speaker at `ip` to the group led by `coordinator_uuid`.
///
/// Retries transient faults: a member that is still releasing its previous
/// source answers 701 for a moment.
pub async fn add_member(
    client: &Client,
    ip: &str,
    coordinator_uuid: &str,
    retry: &RetryPolicy,
) -> SoapResult<()> {
    let uri = group_uri(coordinator_uuid);
    log::info!("[Grouping] Joining {} to {} ({})", ip, coordinator_uuid, uri);

    retry
        .run("SetAVTransportURI", || {
            SoapRequestBuilder::new(client, ip)
                .service(SonosService::AVTransport)
                .action("SetAVTransportURI")
                .instance_id()
                .arg("CurrentURI", uri.as_str())
                .arg("CurrentURIMetaData", "")
                .send()
        })
        .await?;

    log::debug!("[Grouping] {} joined {}", ip, coordinator_uuid);
    Ok(())
}

/// Makes the speaker at `ip` leave its group.
///
/// Idempotent: a standalone speaker stays standalone.
pub async fn remove_member(client: &Client, ip: &str) -> SoapResult<()> {
    log::info!("[Grouping] {} leaving its group", ip);

    SoapRequestBuilder::new(client, ip)
        .service(SonosService::AVTransport)
        .action("BecomeCoordinatorOfStandaloneGroup")
        .instance_id()
        .send()
        .await?;

    Ok(())
}

//! Audio-source detection.
//!
//! Asks every speaker, in parallel, for its transport state and current
//! track, and classifies the track URI. A speaker that fails or does not
//! answer in time counts as idle, so one dead speaker never fails the batch.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;

use crate::error::{SoapError, SoapResult};
use crate::sonos::traits::SonosTransport;
use crate::sonos::types::{AudioSource, AudioSourceInfo, Device};

/// Detects what each speaker is playing.
#[derive(Clone)]
pub struct SourceDetector {
    sonos: Arc<dyn SonosTransport>,
    timeout: Duration,
}

impl SourceDetector {
    /// `timeout` bounds the pair of calls made per speaker.
    pub fn new(sonos: Arc<dyn SonosTransport>, timeout: Duration) -> Self {
        Self { sonos, timeout }
    }

    /// Detects sources of all `devices` concurrently.
    ///
    /// Returns one entry per device, keyed by [`Device::key`]. Failures and
    /// timeouts are logged and reported as [`AudioSourceInfo::idle`].
    pub async fn detect_sources(&self, devices: &[Device]) -> HashMap<String, AudioSourceInfo> {
        let results = join_all(devices.iter().map(|device| async move {
            let info = match self.detect_one(device).await {
                Ok(info) => info,
                Err(e) => {
                    log::warn!(
                        "[Sources] {} ({}) defaulted to idle: {}",
                        device.name,
                        device.ip,
                        e
                    );
                    AudioSourceInfo::idle()
                }
            };
            (device.key().to_string(), info)
        }))
        .await;

        results.into_iter().collect()
    }

    /// Detects the source of a single speaker.
    ///
    /// # Errors
    /// The first failing call, or [`SoapError::Timeout`] when the pair does
    /// not complete within the configured bound.
    pub async fn detect_one(&self, device: &Device) -> SoapResult<AudioSourceInfo> {
        let query = async {
            let (state, position) = futures::try_join!(
                self.sonos.get_transport_info(&device.ip),
                self.sonos.get_position_info(&device.ip),
            )?;
            let source = AudioSource::from_track_uri(&position.track_uri);
            Ok::<_, SoapError>(AudioSourceInfo {
                source,
                transport_state: state,
                track_uri: Some(position.track_uri).filter(|uri| !uri.is_empty()),
            })
        };

        let info = tokio::time::timeout(self.timeout, query)
            .await
            .map_err(|_| SoapError::Timeout)??;

        log::debug!(
            "[Sources] {} is {} ({})",
            device.name,
            info.source,
            info.transport_state
        );
        Ok(info)
    }
}

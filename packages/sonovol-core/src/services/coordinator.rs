//! Coordinator selection.
//!
//! Picks the speaker a new group should be built around. The rules favour
//! whatever cannot move: a line-in or TV input is tied to one physical
//! speaker, so that speaker has to lead.

use std::collections::HashMap;

use crate::error::{GroupingError, GroupingResult};
use crate::sonos::types::{AudioSource, AudioSourceInfo, Device};

/// Which rule chose the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionReason {
    LineIn,
    Tv,
    OnlyStreamer,
    NotStereoPair,
    First,
    Explicit,
}

/// Selects a coordinator from `devices`. First matching rule wins:
///
/// 1. a device playing line-in
/// 2. a device playing TV / home-theater input
/// 3. the only device that is streaming and playing
/// 4. a device that is not part of a stereo pair
/// 5. the first device
///
/// Ties inside a rule go to the earliest device in `devices`. Devices missing
/// from `sources` count as idle. Returns `None` for an empty slice.
#[must_use]
pub fn select_coordinator<'a>(
    devices: &'a [Device],
    sources: &HashMap<String, AudioSourceInfo>,
) -> Option<(&'a Device, SelectionReason)> {
    let source_of = |d: &Device| sources.get(d.key()).map_or(AudioSource::Idle, |i| i.source);

    if let Some(d) = devices.iter().find(|d| source_of(*d) == AudioSource::LineIn) {
        return Some((d, SelectionReason::LineIn));
    }
    if let Some(d) = devices.iter().find(|d| source_of(*d) == AudioSource::Tv) {
        return Some((d, SelectionReason::Tv));
    }

    let mut streamers = devices.iter().filter(|d| {
        sources
            .get(d.key())
            .is_some_and(AudioSourceInfo::is_streaming_and_playing)
    });
    if let (Some(d), None) = (streamers.next(), streamers.next()) {
        return Some((d, SelectionReason::OnlyStreamer));
    }

    if let Some(d) = devices.iter().find(|d| d.stereo_pair.is_none()) {
        return Some((d, SelectionReason::NotStereoPair));
    }
    devices.first().map(|d| (d, SelectionReason::First))
}

/// Re-checks the coordinator's source right before grouping commands go out.
///
/// Losing a line-in source aborts the operation; any other change is only
/// logged.
///
/// # Errors
/// [`GroupingError::LineInSourceLost`] when `at_selection` was line-in and
/// `now` is not.
pub fn verify_before_commit(
    coordinator: &Device,
    at_selection: &AudioSourceInfo,
    now: &AudioSourceInfo,
) -> GroupingResult<()> {
    if at_selection.source == AudioSource::LineIn && now.source != AudioSource::LineIn {
        log::warn!(
            "[Coordinator] {} lost its line-in source (now {})",
            coordinator.name,
            now.source
        );
        return Err(GroupingError::LineInSourceLost {
            device: coordinator.name.clone(),
        });
    }
    if at_selection.source != now.source {
        log::warn!(
            "[Coordinator] Source of {} changed from {} to {}, continuing",
            coordinator.name,
            at_selection.source,
            now.source
        );
    }
    Ok(())
}

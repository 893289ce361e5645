//! Group orchestration.
//!
//! Forms and dissolves groups. Member commands go out one at a time against
//! the coordinator, then the orchestrator waits a settle delay and forces a
//! topology refresh so the model reflects what the speakers actually did.
//!
//! A failure part-way through a group creation is not rolled back: members
//! already added stay grouped and the caller gets a single error.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{GroupingError, GroupingResult};
use crate::services::coordinator::{select_coordinator, verify_before_commit, SelectionReason};
use crate::services::source_detector::SourceDetector;
use crate::services::topology::TopologySynchronizer;
use crate::sonos::traits::SonosGrouping;
use crate::sonos::types::{AudioSource, AudioSourceInfo, Device, Group};
use crate::state::SonosState;

/// Result of a successful [`GroupOrchestrator::create_group`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupPlan {
    pub coordinator: Device,
    pub reason: SelectionReason,
    /// Devices that were told to follow the coordinator, in command order.
    pub members: Vec<Device>,
}

/// Creates and dissolves speaker groups.
pub struct GroupOrchestrator {
    state: Arc<SonosState>,
    grouping: Arc<dyn SonosGrouping>,
    detector: SourceDetector,
    topology: Arc<TopologySynchronizer>,
    settle_delay: Duration,
}

impl GroupOrchestrator {
    pub fn new(
        state: Arc<SonosState>,
        grouping: Arc<dyn SonosGrouping>,
        detector: SourceDetector,
        topology: Arc<TopologySynchronizer>,
        settle_delay: Duration,
    ) -> Self {
        Self {
            state,
            grouping,
            detector,
            topology,
            settle_delay,
        }
    }

    /// Groups `devices` around one coordinator.
    ///
    /// The coordinator is `explicit_coordinator` (matched by id, name or IP)
    /// or chosen by [`select_coordinator`]. Its source is re-detected right
    /// before the first member command; see [`verify_before_commit`].
    ///
    /// # Errors
    /// - [`GroupingError::InvalidGroupSize`] for fewer than two distinct devices
    /// - [`GroupingError::CoordinatorNotInCandidates`] for an unknown override
    /// - [`GroupingError::SourceDetectionFailed`] if a line-in coordinator
    ///   cannot be re-checked
    /// - [`GroupingError::LineInSourceLost`] if it stopped playing line-in
    /// - [`GroupingError::Failed`] if any member command failed
    pub async fn create_group(
        &self,
        devices: &[Device],
        explicit_coordinator: Option<&str>,
    ) -> GroupingResult<GroupPlan> {
        let mut seen = HashSet::new();
        let devices: Vec<Device> = devices
            .iter()
            .filter(|d| seen.insert(d.key().to_string()))
            .cloned()
            .collect();
        if devices.len() < 2 {
            return Err(GroupingError::InvalidGroupSize(devices.len()));
        }

        let sources = self.detector.detect_sources(&devices).await;
        for device in &devices {
            if let Some(info) = sources.get(device.key()) {
                self.state.annotate_source(
                    device.key(),
                    Some(info.source),
                    Some(info.transport_state),
                );
            }
        }

        let (coordinator, reason) = match explicit_coordinator {
            Some(wanted) => {
                let device = devices
                    .iter()
                    .find(|d| d.matches(wanted))
                    .ok_or_else(|| GroupingError::CoordinatorNotInCandidates(wanted.to_string()))?;
                (device.clone(), SelectionReason::Explicit)
            }
            None => select_coordinator(&devices, &sources)
                .map(|(d, reason)| (d.clone(), reason))
                .ok_or(GroupingError::InvalidGroupSize(0))?,
        };
        let Some(coordinator_id) = coordinator.id.clone() else {
            return Err(GroupingError::Failed {
                reason: format!("{} has no device identifier", coordinator.name),
            });
        };
        log::info!(
            "[Grouping] Coordinator {} ({:?})",
            coordinator.name,
            reason
        );

        let at_selection = sources
            .get(coordinator.key())
            .cloned()
            .unwrap_or_else(AudioSourceInfo::idle);
        match self.detector.detect_one(&coordinator).await {
            Ok(now) => verify_before_commit(&coordinator, &at_selection, &now)?,
            Err(e) if at_selection.source == AudioSource::LineIn => {
                log::warn!(
                    "[Grouping] Could not re-check line-in on {}: {}",
                    coordinator.name,
                    e
                );
                return Err(GroupingError::SourceDetectionFailed(coordinator.name.clone()));
            }
            Err(e) => {
                log::warn!(
                    "[Grouping] Could not re-check {}, continuing: {}",
                    coordinator.name,
                    e
                );
            }
        }

        let members: Vec<Device> = devices
            .iter()
            .filter(|d| d.key() != coordinator.key())
            .cloned()
            .collect();

        let mut failure = None;
        if coordinator
            .coordinator_id
            .as_deref()
            .is_some_and(|c| c != coordinator_id)
        {
            log::info!("[Grouping] {} leaves its current group first", coordinator.name);
            if let Err(e) = self.grouping.remove_member(&coordinator.ip).await {
                failure = Some(format!("{}: {}", coordinator.name, e));
            }
        }

        if failure.is_none() {
            for member in &members {
                log::info!("[Grouping] Adding {} to {}", member.name, coordinator.name);
                if let Err(e) = self.grouping.add_member(&member.ip, &coordinator_id).await {
                    log::warn!("[Grouping] Adding {} failed: {}", member.name, e);
                    failure = Some(format!("{}: {}", member.name, e));
                    break;
                }
            }
        }

        self.settle_and_refresh().await;

        match failure {
            Some(reason) => Err(GroupingError::Failed { reason }),
            None => Ok(GroupPlan {
                coordinator,
                reason,
                members,
            }),
        }
    }

    /// Makes every non-coordinator member of `group` standalone.
    ///
    /// # Errors
    /// [`GroupingError::Failed`] on the first member command that fails.
    pub async fn dissolve_group(&self, group: &Group) -> GroupingResult<()> {
        let mut failure = None;
        for member_id in group.members.iter().filter(|m| **m != group.coordinator_id) {
            let Some(member) = self.state.device(member_id) else {
                log::warn!("[Grouping] Member {} of {} is not a known device", member_id, group.name);
                continue;
            };
            log::info!("[Grouping] Removing {} from {}", member.name, group.name);
            if let Err(e) = self.grouping.remove_member(&member.ip).await {
                failure = Some(format!("{}: {}", member.name, e));
                break;
            }
        }

        self.settle_and_refresh().await;
        failure.map_or(Ok(()), |reason| Err(GroupingError::Failed { reason }))
    }

    /// Makes `device` standalone.
    ///
    /// # Errors
    /// [`GroupingError::Failed`] if the command fails.
    pub async fn remove_member(&self, device: &Device) -> GroupingResult<()> {
        log::info!("[Grouping] Making {} standalone", device.name);
        let result = self.grouping.remove_member(&device.ip).await;
        self.settle_and_refresh().await;
        result.map_err(|e| GroupingError::Failed {
            reason: format!("{}: {}", device.name, e),
        })
    }

    async fn settle_and_refresh(&self) {
        tokio::time::sleep(self.settle_delay).await;
        self.topology.refresh(true).await;
    }
}

//! Application services layer.
//!
//! Business logic that sits between the collaborator-facing controller and
//! the speaker protocol layer in [`crate::sonos`].

pub mod controller;
pub mod coordinator;
pub mod orchestrator;
pub mod source_detector;
pub mod subscriptions;
pub mod topology;

pub use controller::{SonosController, Target};
pub use coordinator::{select_coordinator, verify_before_commit, SelectionReason};
pub use orchestrator::{GroupOrchestrator, GroupPlan};
pub use source_detector::SourceDetector;
pub use subscriptions::{
    spawn_subscription_manager, NotifyMessage, SubscriptionConfig, SubscriptionHandle,
    SubscriptionInfo, SubscriptionState, SubscriptionStreams,
};
pub use topology::{RefreshOutcome, TopologySynchronizer};

//! Centralized error types for the sonovol core library.
//!
//! Each protocol layer owns a focused error enum (`SoapError`, `DiscoveryError`,
//! `GenaError`); grouping failures are defined here because they surface to the
//! collaborator API unchanged. [`CoreError`] folds everything into the four
//! user-facing categories: network, protocol, subscription and grouping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::context::IpDetectionError;
use crate::sonos::discovery::DiscoveryError;
use crate::sonos::gena_client::GenaError;

/// Trait for error types that provide machine-readable error codes.
pub trait ErrorCode {
    /// Returns a machine-readable error code.
    fn code(&self) -> &'static str;
}

impl ErrorCode for DiscoveryError {
    fn code(&self) -> &'static str {
        match self {
            Self::SocketBind(_) => "socket_bind_failed",
            Self::SocketConfig(_) => "socket_config_failed",
            Self::SendSearch(_) => "ssdp_send_failed",
            Self::NoInterfaces => "no_network_interfaces",
        }
    }
}

impl ErrorCode for SoapError {
    fn code(&self) -> &'static str {
        match self {
            Self::Http(_) => "http_request_failed",
            Self::HttpStatus(_, _) => "http_error_status",
            Self::Timeout => "request_timeout",
            Self::Fault(_) => "soap_fault",
            Self::Parse(_) => "soap_parse_error",
            Self::MissingField(_) => "missing_field",
        }
    }
}

impl ErrorCode for GenaError {
    fn code(&self) -> &'static str {
        match self {
            Self::Http(_) => "http_request_failed",
            Self::SubscriptionFailed(_) => "gena_subscription_failed",
            Self::RenewalFailed(_) => "gena_renewal_failed",
            Self::MissingSid => "gena_missing_sid",
            Self::ListenerNotRunning => "gena_listener_not_running",
            Self::UnknownSubscription(_) => "gena_unknown_subscription",
            Self::ManagerClosed => "gena_manager_closed",
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Grouping
// ─────────────────────────────────────────────────────────────────────────────

/// Errors raised while forming or dissolving speaker groups.
///
/// These are always propagated to the caller; nothing in the grouping path
/// swallows them.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GroupingError {
    /// A group needs at least two speakers.
    #[error("A group needs at least 2 speakers, got {0}")]
    InvalidGroupSize(usize),

    /// The requested coordinator is not one of the speakers being grouped.
    #[error("Coordinator {0} is not among the selected speakers")]
    CoordinatorNotInCandidates(String),

    /// The audio source of the coordinator could not be confirmed.
    #[error("Could not detect audio source on {0}")]
    SourceDetectionFailed(String),

    /// The coordinator was playing line-in at selection time but no longer is.
    #[error("Line-in source on {device} was lost before the group could be formed")]
    LineInSourceLost {
        /// Display name of the coordinator that lost its line-in source.
        device: String,
    },

    /// A grouping command failed.
    #[error("Grouping failed: {reason}")]
    Failed {
        /// Human-readable cause.
        reason: String,
    },
}

impl ErrorCode for GroupingError {
    fn code(&self) -> &'static str {
        match self {
            Self::InvalidGroupSize(_) => "invalid_group_size",
            Self::CoordinatorNotInCandidates(_) => "coordinator_not_in_candidates",
            Self::SourceDetectionFailed(_) => "source_detection_failed",
            Self::LineInSourceLost { .. } => "line_in_source_lost",
            Self::Failed { .. } => "grouping_failed",
        }
    }
}

/// Convenient Result alias for grouping operations.
pub type GroupingResult<T> = Result<T, GroupingError>;

// ─────────────────────────────────────────────────────────────────────────────
// Crate-wide error
// ─────────────────────────────────────────────────────────────────────────────

/// Application-wide error type for the sonovol core.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Timeout, unreachable speaker, or non-2xx response.
    #[error("Network error: {0}")]
    Network(String),

    /// Missing expected XML field or malformed envelope.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Event subscription failure.
    #[error("Subscription error: {0}")]
    Subscription(#[from] GenaError),

    /// Grouping failure.
    #[error(transparent)]
    Grouping(#[from] GroupingError),

    /// Speaker discovery failed at the socket level.
    #[error("Discovery failed: {0}")]
    Discovery(#[from] DiscoveryError),

    /// No known speaker matches the given identifier or name.
    #[error("Speaker not found: {0}")]
    SpeakerNotFound(String),

    /// Caller sent an invalid or malformed request.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Server configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl CoreError {
    /// Returns a machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Network(_) => "network_error",
            Self::Protocol(_) => "protocol_error",
            Self::Subscription(e) => e.code(),
            Self::Grouping(e) => e.code(),
            Self::Discovery(e) => e.code(),
            Self::SpeakerNotFound(_) => "speaker_not_found",
            Self::InvalidRequest(_) => "invalid_request",
            Self::Configuration(_) => "configuration_error",
        }
    }

    /// Maps the error to an HTTP status code for the NOTIFY listener.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::SpeakerNotFound(_) => StatusCode::NOT_FOUND,
            Self::Configuration(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<SoapError> for CoreError {
    fn from(err: SoapError) -> Self {
        if err.is_network() {
            Self::Network(err.to_string())
        } else {
            Self::Protocol(err.to_string())
        }
    }
}

impl From<IpDetectionError> for CoreError {
    fn from(err: IpDetectionError) -> Self {
        Self::Configuration(err.to_string())
    }
}

// Re-export layer errors and Result aliases from their defining modules
pub use crate::sonos::discovery::DiscoveryResult;
pub use crate::sonos::gena_client::GenaResult;
pub use crate::sonos::soap::{SoapError, SoapResult};

/// Convenient Result alias for application-wide operations.
pub type CoreResult<T> = Result<T, CoreError>;

impl IntoResponse for CoreError {
    fn into_response(self) -> Response {
        // GENA publishers ignore response bodies; the status is all that matters.
        (self.status_code(), self.code()).into_response()
    }
}

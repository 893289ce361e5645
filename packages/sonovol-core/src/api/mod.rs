//! Inbound HTTP surface.
//!
//! The only inbound traffic the core serves is GENA NOTIFY callbacks from
//! speakers; see [`notify`].

use thiserror::Error;

pub mod notify;

pub use notify::{start_notify_listener, NotifyListener};

/// Errors that can occur when starting the NOTIFY listener.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Failed to bind or inspect the listening socket.
    #[error("Failed to bind NOTIFY listener: {0}")]
    Bind(#[from] std::io::Error),
}

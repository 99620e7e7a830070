//! Typed errors for the engine's public surface.

use thiserror::Error;

use crate::review::ReviewSource;

/// Result type alias for engine operations.
pub type MonitorResult<T> = Result<T, MonitorError>;

/// Errors surfaced by [`crate::MonitorService`].
#[derive(Debug, Error)]
pub enum MonitorError {
    /// A monitoring session is already active, in this process or another
    /// one holding the session lock.
    #[error("a monitoring session is already active")]
    AlreadyRunning,

    /// The configuration cannot drive a session.
    #[error("invalid monitoring configuration: {0}")]
    InvalidConfig(String),

    /// A review was not found in the registry.
    #[error("review not found: {review_id}")]
    ReviewNotFound { review_id: String },

    /// The review has no generated text to publish.
    #[error("review {review_id} has no generated text to publish")]
    NothingToPublish { review_id: String },

    /// No client was provided for the item's backend.
    #[error("no client configured for backend {backend}")]
    BackendUnavailable { backend: ReviewSource },

    /// Posting the review back to the backend failed; the review stays
    /// accepted and the call can be retried.
    #[error("publishing review failed: {0}")]
    Publish(#[from] crate::host::HostError),

    /// An internal filesystem or bookkeeping error.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

//! Contract for code-hosting backends.
//!
//! One implementation exists per backend (GitLab, GitHub). Implementations
//! own their HTTP plumbing, authentication, and per-call timeouts; every
//! operation reports a terminal [`HostError`] to the scheduler rather than
//! being externally interrupted.

use thiserror::Error;

use crate::review::{ReviewItemRef, ReviewSource};

/// Errors a code-hosting backend operation can fail with.
#[derive(Debug, Error)]
pub enum HostError {
    /// Credentials rejected or missing scope.
    #[error("code host rejected authentication: {0}")]
    Auth(String),

    /// The item, container, or resource does not exist (or is invisible to
    /// the configured credential).
    #[error("not found on code host: {0}")]
    NotFound(String),

    /// The backend throttled us; the next tick retries naturally.
    #[error("rate limited by code host: {0}")]
    RateLimited(String),

    /// Transport-level failure, including the client's own timeout.
    #[error("network error talking to code host: {0}")]
    Network(String),
}

pub type HostResult<T> = Result<T, HostError>;

/// A candidate reviewable item reported by a backend listing.
#[derive(Debug, Clone)]
pub struct ReviewCandidate {
    pub item: ReviewItemRef,
    pub title: String,
    pub url: String,
}

impl ReviewCandidate {
    pub fn new(item: ReviewItemRef, title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            item,
            title: title.into(),
            url: url.into(),
        }
    }
}

/// Client contract for one code-hosting backend.
pub trait CodeHostClient: Send + Sync {
    /// Which backend this client talks to.
    fn source(&self) -> ReviewSource;

    /// Open items with a review explicitly requested from us.
    fn list_items_for_review(&self) -> HostResult<Vec<ReviewCandidate>>;

    /// Open items assigned to us as reviewer.
    fn list_assigned_items(&self) -> HostResult<Vec<ReviewCandidate>>;

    /// Backend-reported head commit identifier for the item.
    fn current_commit(&self, item: &ReviewItemRef) -> HostResult<String>;

    /// Latest combined textual diff for the item.
    fn changes(&self, item: &ReviewItemRef) -> HostResult<String>;

    /// Combined diff between two commits of the item.
    ///
    /// Backends without a commit-range endpoint fall back to the latest
    /// diff.
    fn changes_between(&self, item: &ReviewItemRef, from: &str, to: &str) -> HostResult<String> {
        let _ = (from, to);
        self.changes(item)
    }

    /// Full content of the item's container, used for a first review.
    fn full_content(&self, item: &ReviewItemRef) -> HostResult<String>;

    /// Publish the review text back to the item as a comment/approval.
    fn post_review(&self, item: &ReviewItemRef, text: &str) -> HostResult<()>;

    /// Whether a comment of ours on the item is still awaiting an answer.
    ///
    /// Optional; backends that cannot tell report `false`, which disables
    /// the skip heuristic for them.
    fn has_own_unanswered_comment(&self, item: &ReviewItemRef) -> HostResult<bool> {
        let _ = item;
        Ok(false)
    }
}

//! Domain types for tracked reviews.
//!
//! A [`ReviewItemRef`] identifies one reviewable unit (merge request or pull
//! request) on a backend; a [`CodeReview`] is the registry's record of that
//! unit together with the last generation result for it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Code-hosting backend a review item originates from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewSource {
    GitLab,
    GitHub,
}

impl ReviewSource {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::GitLab => "gitlab",
            Self::GitHub => "github",
        }
    }
}

impl std::fmt::Display for ReviewSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifies one reviewable unit. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReviewItemRef {
    pub source: ReviewSource,
    /// GitLab project id or GitHub `owner/repo` slug.
    pub container_id: String,
    /// Merge request iid / pull request number within the container.
    pub item_number: u64,
}

impl ReviewItemRef {
    pub fn new(source: ReviewSource, container_id: impl Into<String>, item_number: u64) -> Self {
        Self {
            source,
            container_id: container_id.into(),
            item_number,
        }
    }

    /// Composite registry id, unique and stable for the lifetime of the item.
    #[must_use]
    pub fn review_id(&self) -> String {
        format!("{}-{}-{}", self.source, self.container_id, self.item_number)
    }
}

/// Lifecycle status of a tracked review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewStatus {
    /// Tracked but no generation attempted yet.
    Pending,
    /// A generation is in flight. At most one per item at any time.
    InProgress,
    /// Last generation succeeded; `review_text` holds the result (or an
    /// explicit no-changes notice).
    Completed,
    /// Last generation failed; `review_text` holds a human-readable message.
    Error,
}

/// One tracked review item and the last generation result for it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeReview {
    /// Composite id derived from the item ref, see [`ReviewItemRef::review_id`].
    pub id: String,
    pub item: ReviewItemRef,
    pub title: String,
    pub url: String,
    pub status: ReviewStatus,
    /// Backend commit identifier the current `review_text` was generated for.
    /// Empty until the first successful generation.
    #[serde(default)]
    pub last_reviewed_commit: String,
    /// Last AI output; empty until the first successful generation.
    #[serde(default)]
    pub review_text: String,
    /// The user accepted the review text for publication.
    pub accepted: bool,
    /// The review text was posted back to the backend.
    pub commented: bool,
    /// Digest of the content the last generation consumed. Secondary change
    /// signal for commits whose identifier is unreliable or absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_digest: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Timestamp of the last successful generation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reviewed_at: Option<DateTime<Utc>>,
}

impl CodeReview {
    /// Create a fresh `Pending` record for a newly observed item.
    #[must_use]
    pub fn new(item: ReviewItemRef, title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: item.review_id(),
            item,
            title: title.into(),
            url: url.into(),
            status: ReviewStatus::Pending,
            last_reviewed_commit: String::new(),
            review_text: String::new(),
            accepted: false,
            commented: false,
            last_digest: None,
            created_at: Utc::now(),
            reviewed_at: None,
        }
    }

    #[must_use]
    pub fn is_in_progress(&self) -> bool {
        self.status == ReviewStatus::InProgress
    }
}

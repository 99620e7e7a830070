//! Change detection for tracked items.
//!
//! The primary signal is the backend-reported commit identifier compared
//! against the commit recorded at the last successful review. A secondary
//! content digest catches the case where the identifier moved but the
//! fetched content is byte-identical, so generation is not re-invoked for
//! nothing.

use sha2::{Digest, Sha256};

/// Outcome of comparing a backend-reported commit against the last one
/// reviewed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeDecision {
    /// Same commit; no new generation (idempotence guarantee).
    Unchanged,
    /// Different commit, or no commit recorded yet.
    Changed,
}

/// Compare the current commit identifier against the last-reviewed one.
///
/// An empty `last_reviewed` means the item was never successfully reviewed,
/// which always counts as changed.
#[must_use]
pub fn compare_commits(current: &str, last_reviewed: &str) -> ChangeDecision {
    if !last_reviewed.is_empty() && current == last_reviewed {
        ChangeDecision::Unchanged
    } else {
        ChangeDecision::Changed
    }
}

/// Hex-encoded SHA-256 digest of the fetched content.
#[must_use]
pub fn content_digest(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

/// True when the digest of freshly fetched content equals the digest
/// recorded at the last generation.
#[must_use]
pub fn same_content(digest: &str, last_digest: Option<&str>) -> bool {
    last_digest == Some(digest)
}

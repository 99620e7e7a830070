//! Thread-safe registry of tracked reviews.
//!
//! The registry exclusively owns the in-memory [`CodeReview`] collection.
//! Both polling loops and the accept workflow mutate it concurrently, so
//! every operation takes the internal lock for a short critical section.
//! The lock is never held across a backend or AI call.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::review::{CodeReview, ReviewStatus};

/// In-memory collection of per-item review records.
#[derive(Debug, Default)]
pub struct ReviewRegistry {
    entries: Mutex<HashMap<String, CodeReview>>,
}

impl ReviewRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, CodeReview>> {
        // A panicked holder leaves the map structurally intact; keep going.
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert or replace the record for `review.id`.
    pub fn upsert(&self, review: CodeReview) {
        self.lock().insert(review.id.clone(), review);
    }

    /// Insert `review` only if its id is not tracked yet.
    ///
    /// Returns `false` without touching the existing record when the id is
    /// already present. Used by the polling loops so two loops observing the
    /// same unseen candidate cannot clobber each other's entry.
    pub fn try_insert(&self, review: CodeReview) -> bool {
        let mut entries = self.lock();
        if entries.contains_key(&review.id) {
            return false;
        }
        entries.insert(review.id.clone(), review);
        true
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<CodeReview> {
        self.lock().get(id).cloned()
    }

    /// Snapshot of all entries, sorted by creation time then id.
    ///
    /// Returns a copy, never the live backing collection, so concurrent
    /// scheduler mutation cannot be observed mid-update by a caller.
    #[must_use]
    pub fn list(&self) -> Vec<CodeReview> {
        let mut reviews: Vec<CodeReview> = self.lock().values().cloned().collect();
        reviews.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        reviews
    }

    /// Claim or release the in-flight generation slot for an item.
    ///
    /// `set_in_progress(id, true)` is a check-and-set: it returns `false` if
    /// the entry is missing or a generation is already in flight, so at most
    /// one caller can win the claim. `set_in_progress(id, false)` returns a
    /// still-in-progress entry to `Pending`; completion paths that set a
    /// terminal status release the slot implicitly.
    pub fn set_in_progress(&self, id: &str, in_progress: bool) -> bool {
        let mut entries = self.lock();
        let Some(entry) = entries.get_mut(id) else {
            return false;
        };
        if in_progress {
            if entry.status == ReviewStatus::InProgress {
                return false;
            }
            entry.status = ReviewStatus::InProgress;
            true
        } else {
            if entry.status != ReviewStatus::InProgress {
                return false;
            }
            entry.status = ReviewStatus::Pending;
            true
        }
    }

    /// Mark the review as accepted for publication.
    pub fn mark_accepted(&self, id: &str) -> bool {
        self.update_with(id, |entry| entry.accepted = true)
    }

    /// Mark the review as posted back to the backend.
    ///
    /// Also sets `accepted`: a published review is by definition an accepted
    /// one.
    pub fn mark_commented(&self, id: &str) -> bool {
        self.update_with(id, |entry| {
            entry.accepted = true;
            entry.commented = true;
        })
    }

    /// Apply `apply` to the entry under the lock, in one critical section.
    ///
    /// Returns `false` if the id is not tracked.
    pub fn update_with<F>(&self, id: &str, apply: F) -> bool
    where
        F: FnOnce(&mut CodeReview),
    {
        let mut entries = self.lock();
        match entries.get_mut(id) {
            Some(entry) => {
                apply(entry);
                true
            }
            None => false,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

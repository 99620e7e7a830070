//! Per-item handling for one poll tick.
//!
//! Each candidate reported by a backend listing runs through
//! [`MonitorInner::process_candidate`], which returns an [`ItemOutcome`]
//! the polling loop interprets uniformly. Every path that marks an entry
//! in progress either reaches a terminal status or restores the prior one
//! before returning; a leaked in-progress flag would starve the item from
//! all future re-evaluation.

use chrono::Utc;

use crate::ai::{self, ReviewMode};
use crate::detect::{self, ChangeDecision};
use crate::host::{CodeHostClient, ReviewCandidate};
use crate::review::{CodeReview, ReviewItemRef, ReviewStatus};

use super::MonitorInner;

/// Review text recorded when the fetched content is unchanged since the
/// last generation.
pub const NO_CHANGES_TEXT: &str = "No new changes since last review.";

/// What happened to one candidate during one tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    /// Nothing to do: commit unchanged, generation already in flight, or
    /// the skip heuristic held the item back for this tick.
    Skipped,
    /// Commit or content moved but nothing really changed; bookkeeping
    /// only, no generation.
    Unchanged,
    /// First generation for a previously unseen item completed.
    Created,
    /// Incremental generation for a changed item completed.
    Updated,
    /// Fetching or generation failed; the item is retried on a later tick.
    Failed(String),
}

/// Everything needed to finish one generation after content was fetched.
struct Generation<'a> {
    id: &'a str,
    item: &'a ReviewItemRef,
    current_commit: String,
    mode: ReviewMode,
}

impl MonitorInner {
    /// Handle one listed candidate.
    pub(crate) fn process_candidate(
        &self,
        host: &dyn CodeHostClient,
        candidate: ReviewCandidate,
    ) -> ItemOutcome {
        let id = candidate.item.review_id();
        match self.registry.get(&id) {
            None => self.review_new_item(host, candidate, &id),
            Some(existing) => self.review_known_item(host, &candidate.item, &existing, &id),
        }
    }

    /// First time this process sees the item: create a `Pending` entry and
    /// decide between full-content and incremental review via the tracking
    /// store.
    fn review_new_item(
        &self,
        host: &dyn CodeHostClient,
        candidate: ReviewCandidate,
        id: &str,
    ) -> ItemOutcome {
        let item = candidate.item.clone();
        if !self
            .registry
            .try_insert(CodeReview::new(item.clone(), candidate.title, candidate.url))
        {
            // The other polling loop created the entry between our lookup
            // and now; it owns this round.
            return ItemOutcome::Skipped;
        }

        let source = item.source;
        let first = self.store.is_first_review(source, &item.container_id);

        let current = match host.current_commit(&item) {
            Ok(commit) => commit,
            Err(err) => {
                // Entry stays Pending and is retried next tick.
                self.notifier
                    .notify(&format!("Error fetching current commit for {id}: {err}"));
                return ItemOutcome::Failed(err.to_string());
            }
        };

        let last_recorded = if first {
            None
        } else {
            self.store.last_reviewed_commit(source, &item.container_id)
        };

        if let Some(last) = &last_recorded {
            if detect::compare_commits(&current, last) == ChangeDecision::Unchanged {
                // Known container rebuilt after a restart, nothing new
                // upstream. While our own comment is still unanswered,
                // leave the item untouched for this tick.
                if matches!(host.has_own_unanswered_comment(&item), Ok(true)) {
                    return ItemOutcome::Skipped;
                }
                self.registry.update_with(id, |entry| {
                    entry.status = ReviewStatus::Completed;
                    entry.review_text = NO_CHANGES_TEXT.to_string();
                    entry.last_reviewed_commit = current.clone();
                    entry.reviewed_at = Some(Utc::now());
                });
                self.notifier.notify(&format!("No new changes for {id}"));
                return ItemOutcome::Unchanged;
            }
        }

        if !self.registry.set_in_progress(id, true) {
            return ItemOutcome::Skipped;
        }

        let (mode, fetched) = if first {
            self.notifier.notify(&format!(
                "First review for {id} - retrieving full project content"
            ));
            (ReviewMode::FullReview, host.full_content(&item))
        } else {
            let fetched = match &last_recorded {
                Some(last) => host.changes_between(&item, last, &current),
                None => host.changes(&item),
            };
            (ReviewMode::IncrementalReview, fetched)
        };

        let raw = match fetched {
            Ok(raw) => raw,
            Err(err) => {
                self.registry
                    .update_with(id, |entry| entry.status = ReviewStatus::Pending);
                self.notifier
                    .notify(&format!("Error fetching content for {id}: {err}"));
                return ItemOutcome::Failed(err.to_string());
            }
        };

        let task = Generation {
            id,
            item: &item,
            current_commit: current,
            mode,
        };
        self.finish_generation(&task, &raw, ItemOutcome::Created)
    }

    /// The item is already tracked: regenerate only when the backend
    /// reports a different commit than the one last reviewed.
    fn review_known_item(
        &self,
        host: &dyn CodeHostClient,
        item: &ReviewItemRef,
        existing: &CodeReview,
        id: &str,
    ) -> ItemOutcome {
        if existing.is_in_progress() {
            return ItemOutcome::Skipped;
        }

        let current = match host.current_commit(item) {
            Ok(commit) => commit,
            Err(err) => {
                self.notifier
                    .notify(&format!("Error fetching current commit for {id}: {err}"));
                return ItemOutcome::Failed(err.to_string());
            }
        };

        if detect::compare_commits(&current, &existing.last_reviewed_commit)
            == ChangeDecision::Unchanged
        {
            return ItemOutcome::Skipped;
        }

        // A new commit always wins over an outstanding unanswered comment:
        // the review is regenerated for the new state of the item.
        if !self.registry.set_in_progress(id, true) {
            return ItemOutcome::Skipped;
        }

        let fetched = if existing.last_reviewed_commit.is_empty() {
            // No generation recorded in this process yet; the tracking
            // store may still know the previous commit from an earlier run.
            match self
                .store
                .last_reviewed_commit(item.source, &item.container_id)
            {
                Some(last) => host.changes_between(item, &last, &current),
                None => host.changes(item),
            }
        } else {
            host.changes_between(item, &existing.last_reviewed_commit, &current)
        };

        let raw = match fetched {
            Ok(raw) => raw,
            Err(err) => {
                let prior = existing.status;
                self.registry.update_with(id, |entry| entry.status = prior);
                self.notifier
                    .notify(&format!("Error fetching content for {id}: {err}"));
                return ItemOutcome::Failed(err.to_string());
            }
        };

        let task = Generation {
            id,
            item,
            current_commit: current,
            mode: ReviewMode::IncrementalReview,
        };
        self.finish_generation(&task, &raw, ItemOutcome::Updated)
    }

    /// Preprocess fetched content, short-circuit on an identical digest,
    /// otherwise call the AI collaborator and record the terminal result.
    ///
    /// The entry is `InProgress` on entry and always leaves in a terminal
    /// or prior status.
    fn finish_generation(
        &self,
        task: &Generation<'_>,
        raw: &str,
        success: ItemOutcome,
    ) -> ItemOutcome {
        let content = ai::preprocess_diff(raw);
        let digest = detect::content_digest(&content);

        let snapshot = self.registry.get(task.id);
        let prior_digest = snapshot.as_ref().and_then(|e| e.last_digest.clone());
        let title = snapshot.map(|e| e.title).unwrap_or_default();

        if detect::same_content(&digest, prior_digest.as_deref()) {
            // The commit identifier moved but the content did not; record
            // the no-op without invoking the AI a second time.
            let now = Utc::now();
            let commit = task.current_commit.clone();
            self.registry.update_with(task.id, |entry| {
                entry.status = ReviewStatus::Completed;
                entry.review_text = NO_CHANGES_TEXT.to_string();
                entry.last_reviewed_commit = commit;
                entry.reviewed_at = Some(now);
                entry.accepted = false;
                entry.commented = false;
            });
            self.store.update_state(
                task.item.source,
                &task.item.container_id,
                &task.current_commit,
                now,
            );
            self.notifier
                .notify(&format!("No new changes for {}", task.id));
            return ItemOutcome::Unchanged;
        }

        match self.ai.generate_review(&content, task.mode) {
            Ok(text) => {
                let now = Utc::now();
                let commit = task.current_commit.clone();
                self.registry.update_with(task.id, |entry| {
                    entry.status = ReviewStatus::Completed;
                    entry.review_text = text;
                    entry.last_reviewed_commit = commit;
                    entry.last_digest = Some(digest);
                    entry.reviewed_at = Some(now);
                    // Fresh text is a fresh draft: it has to be accepted
                    // and published again.
                    entry.accepted = false;
                    entry.commented = false;
                });
                self.store.update_state(
                    task.item.source,
                    &task.item.container_id,
                    &task.current_commit,
                    now,
                );
                let message = if task.mode == ReviewMode::FullReview {
                    format!("Completed first full review of {}: {title}", task.id)
                } else {
                    format!("Completed review of changes for {}: {title}", task.id)
                };
                self.notifier.notify(&message);
                success
            }
            Err(err) => {
                self.registry.update_with(task.id, |entry| {
                    entry.status = ReviewStatus::Error;
                    entry.review_text = format!("AI error: {err}");
                });
                self.notifier
                    .notify(&format!("AI error during review of {}: {err}", task.id));
                ItemOutcome::Failed(err.to_string())
            }
        }
    }
}

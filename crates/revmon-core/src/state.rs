//! Durable cross-run tracking of per-container review state.
//!
//! One [`ProjectState`] per container (GitLab project or GitHub repository)
//! records the last-reviewed commit, review count, and whether our comment
//! was posted for that commit. The whole document is loaded once at
//! construction and written through on every mutation via a temp-file-then-
//! rename, so the on-disk file is never left truncated or half-written if
//! the process dies mid-save. Persistence failures are logged and non-fatal;
//! the in-memory state stays authoritative for the process lifetime.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::review::ReviewSource;

/// Per-container record of the last successful review.
///
/// Field names are fixed: they are the on-disk wire format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectState {
    #[serde(rename = "LastReviewedCommit")]
    pub last_reviewed_commit: String,
    #[serde(rename = "LastReviewTimeUnix")]
    pub last_review_time_unix: i64,
    #[serde(rename = "ReviewCount")]
    pub review_count: u64,
    #[serde(rename = "Commented")]
    pub commented: bool,
}

/// Root persisted document: one container map per backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppState {
    #[serde(rename = "GitLabProjects", default)]
    pub gitlab_projects: HashMap<String, ProjectState>,
    #[serde(rename = "GitHubRepos", default)]
    pub github_repos: HashMap<String, ProjectState>,
}

impl AppState {
    fn containers(&self, source: ReviewSource) -> &HashMap<String, ProjectState> {
        match source {
            ReviewSource::GitLab => &self.gitlab_projects,
            ReviewSource::GitHub => &self.github_repos,
        }
    }

    fn containers_mut(&mut self, source: ReviewSource) -> &mut HashMap<String, ProjectState> {
        match source {
            ReviewSource::GitLab => &mut self.gitlab_projects,
            ReviewSource::GitHub => &mut self.github_repos,
        }
    }
}

/// Durable tracking store: load-once, write-through, atomic rename.
#[derive(Debug)]
pub struct TrackingStore {
    path: PathBuf,
    state: Mutex<AppState>,
}

impl TrackingStore {
    /// Open the store at `path`, loading existing state when present.
    ///
    /// An absent or unparseable file yields a fresh empty state; the store
    /// itself never fails to construct.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let state = match Self::read_state(&path) {
            Ok(Some(state)) => {
                debug!(path = %path.display(), "tracking state loaded");
                state
            }
            Ok(None) => {
                debug!(path = %path.display(), "no tracking state on disk, starting empty");
                AppState::default()
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "tracking state unreadable, starting empty");
                AppState::default()
            }
        };
        Self {
            path,
            state: Mutex::new(state),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> MutexGuard<'_, AppState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// True iff no state exists yet for the container.
    ///
    /// A true result means the container has never been successfully
    /// reviewed, so the scheduler fetches full content instead of a diff.
    #[must_use]
    pub fn is_first_review(&self, source: ReviewSource, container_key: &str) -> bool {
        !self.lock().containers(source).contains_key(container_key)
    }

    #[must_use]
    pub fn get(&self, source: ReviewSource, container_key: &str) -> Option<ProjectState> {
        self.lock().containers(source).get(container_key).cloned()
    }

    /// Commit recorded by the last successful review of the container.
    #[must_use]
    pub fn last_reviewed_commit(&self, source: ReviewSource, container_key: &str) -> Option<String> {
        self.lock()
            .containers(source)
            .get(container_key)
            .map(|p| p.last_reviewed_commit.clone())
    }

    /// Record a successful review of `container_key` at `commit`.
    ///
    /// Upserts the container entry, increments its review count, and resets
    /// `Commented`: a new commit invalidates any outstanding unanswered
    /// comment.
    pub fn update_state(
        &self,
        source: ReviewSource,
        container_key: &str,
        commit: &str,
        at: DateTime<Utc>,
    ) {
        let mut state = self.lock();
        let containers = state.containers_mut(source);
        match containers.get_mut(container_key) {
            Some(project) => {
                project.last_reviewed_commit = commit.to_string();
                project.last_review_time_unix = at.timestamp();
                project.review_count += 1;
                project.commented = false;
            }
            None => {
                containers.insert(
                    container_key.to_string(),
                    ProjectState {
                        last_reviewed_commit: commit.to_string(),
                        last_review_time_unix: at.timestamp(),
                        review_count: 1,
                        commented: false,
                    },
                );
            }
        }
        debug!(source = %source, container = container_key, commit, "tracking state updated");
        // Written through under the lock so saves cannot reorder.
        self.persist(&state);
    }

    /// Record that our comment was posted for the container's current commit.
    ///
    /// Does not touch the commit. Creates a placeholder entry when the
    /// container was somehow never reviewed.
    pub fn mark_commented(&self, source: ReviewSource, container_key: &str) {
        let mut state = self.lock();
        let containers = state.containers_mut(source);
        match containers.get_mut(container_key) {
            Some(project) => project.commented = true,
            None => {
                containers.insert(
                    container_key.to_string(),
                    ProjectState {
                        last_reviewed_commit: "unknown".to_string(),
                        last_review_time_unix: Utc::now().timestamp(),
                        review_count: 1,
                        commented: true,
                    },
                );
            }
        }
        debug!(source = %source, container = container_key, "container marked commented");
        self.persist(&state);
    }

    /// Write-through a state snapshot. Failures are logged, never fatal.
    fn persist(&self, state: &AppState) {
        if let Err(err) = Self::write_atomic(&self.path, state) {
            warn!(path = %self.path.display(), error = %err, "failed to persist tracking state");
        }
    }

    /// Serialize `state` to a temp file and rename it over the canonical
    /// path, so the canonical file is always either the old or the new
    /// complete document.
    fn write_atomic(path: &Path, state: &AppState) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create state directory: {}", parent.display())
                })?;
            }
        }

        let json =
            serde_json::to_string_pretty(state).context("Failed to serialize tracking state")?;

        let tmp_path = path.with_extension("tmp");
        fs::write(&tmp_path, json)
            .with_context(|| format!("Failed to write temp state file: {}", tmp_path.display()))?;
        fs::rename(&tmp_path, path).with_context(|| {
            format!("Failed to move state file into place: {}", path.display())
        })?;
        Ok(())
    }

    fn read_state(path: &Path) -> Result<Option<AppState>> {
        let data = match fs::read_to_string(path) {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("Failed to read state file: {}", path.display()))
            }
        };
        let state: AppState = serde_json::from_str(&data)
            .with_context(|| format!("Failed to parse state file: {}", path.display()))?;
        Ok(Some(state))
    }
}

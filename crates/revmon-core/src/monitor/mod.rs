//! Monitoring scheduler and accept/publish workflow.
//!
//! [`MonitorService`] is the one service object the presentation layer
//! talks to. It owns the review registry, the durable tracking store, and
//! the collaborator clients, and runs at most one monitoring session at a
//! time: two background polling loops, one for items with open review
//! requests and one for items assigned to the reviewer, each ticking on
//! its own interval until the shared stop signal is raised.
//!
//! Session exclusivity extends across process restarts through an advisory
//! `fs2` lock on a file next to the tracking-store file: a second process
//! (or a second `start` in this one) cannot begin monitoring while the
//! lock is held.

mod item;

pub use item::{ItemOutcome, NO_CHANGES_TEXT};

use std::fs::{File, OpenOptions};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::Context;
use crossbeam_channel::{select, tick, unbounded, Receiver, Sender};
use fs2::FileExt;
use tracing::{debug, info, warn};

use crate::ai::AiReviewClient;
use crate::config::MonitorConfig;
use crate::errors::{MonitorError, MonitorResult};
use crate::host::CodeHostClient;
use crate::notify::Notifier;
use crate::registry::ReviewRegistry;
use crate::review::{CodeReview, ReviewSource};
use crate::state::TrackingStore;

/// Which of the two polling loops a tick belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PollKind {
    /// Items with an open review request for us.
    OpenRequests,
    /// Items assigned to us as reviewer.
    Assigned,
}

impl PollKind {
    fn label(self) -> &'static str {
        match self {
            Self::OpenRequests => "open-requests",
            Self::Assigned => "assigned",
        }
    }

    fn interval(self, config: &MonitorConfig) -> Duration {
        match self {
            Self::OpenRequests => config.open_requests_interval,
            Self::Assigned => config.assigned_interval,
        }
    }

    fn list(
        self,
        host: &dyn CodeHostClient,
    ) -> crate::host::HostResult<Vec<crate::host::ReviewCandidate>> {
        match self {
            Self::OpenRequests => host.list_items_for_review(),
            Self::Assigned => host.list_assigned_items(),
        }
    }
}

/// Shared state both polling loops and the accept workflow operate on.
pub(crate) struct MonitorInner {
    pub(crate) registry: ReviewRegistry,
    pub(crate) store: TrackingStore,
    pub(crate) hosts: Vec<Arc<dyn CodeHostClient>>,
    pub(crate) ai: Arc<dyn AiReviewClient>,
    pub(crate) notifier: Arc<dyn Notifier>,
}

impl MonitorInner {
    fn host_for(&self, source: ReviewSource) -> Option<&Arc<dyn CodeHostClient>> {
        self.hosts.iter().find(|host| host.source() == source)
    }

    /// One tick of one polling loop: list candidates per active backend and
    /// handle each. A listing failure aborts the tick for that backend only;
    /// no per-item error ever propagates out of the tick.
    pub(crate) fn run_tick(&self, config: &MonitorConfig, kind: PollKind) {
        for host in &self.hosts {
            let source = host.source();
            if !config.backend(source).is_active() {
                continue;
            }

            let candidates = match kind.list(host.as_ref()) {
                Ok(candidates) => candidates,
                Err(err) => {
                    warn!(%source, poll = kind.label(), error = %err, "listing candidates failed");
                    self.notifier
                        .notify(&format!("Error fetching review items from {source}: {err}"));
                    continue;
                }
            };
            debug!(%source, poll = kind.label(), count = candidates.len(), "listed candidates");

            for candidate in candidates {
                let id = candidate.item.review_id();
                match self.process_candidate(host.as_ref(), candidate) {
                    ItemOutcome::Created => info!(review_id = %id, "first review completed"),
                    ItemOutcome::Updated => {
                        info!(review_id = %id, "incremental review completed");
                    }
                    ItemOutcome::Unchanged => debug!(review_id = %id, "no new changes"),
                    ItemOutcome::Skipped => debug!(review_id = %id, "nothing to do"),
                    ItemOutcome::Failed(reason) => {
                        warn!(review_id = %id, reason = %reason, "review attempt failed");
                    }
                }
            }
        }
    }
}

/// One active monitoring session: the stop signal, the loop threads, and
/// the held session lock file.
struct Session {
    stop_tx: Sender<()>,
    handles: Vec<JoinHandle<()>>,
    /// Advisory lock released when the file handle drops.
    lock_file: File,
}

/// The review-monitoring engine's public surface.
pub struct MonitorService {
    inner: Arc<MonitorInner>,
    lock_path: PathBuf,
    session: Mutex<Option<Session>>,
}

impl MonitorService {
    /// Create the service.
    ///
    /// Loads the durable tracking store from `state_path` (a missing or
    /// corrupt file starts empty) and derives the session lock file path
    /// from it. No monitoring starts until [`MonitorService::start`].
    pub fn new(
        state_path: impl Into<PathBuf>,
        hosts: Vec<Arc<dyn CodeHostClient>>,
        ai: Arc<dyn AiReviewClient>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let state_path = state_path.into();
        let lock_path = state_path.with_extension("lock");
        Self {
            inner: Arc::new(MonitorInner {
                registry: ReviewRegistry::new(),
                store: TrackingStore::open(state_path),
                hosts,
                ai,
                notifier,
            }),
            lock_path,
            session: Mutex::new(None),
        }
    }

    fn session_guard(&self) -> MutexGuard<'_, Option<Session>> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start a monitoring session with `config`.
    ///
    /// Fails with [`MonitorError::AlreadyRunning`] while a previous session
    /// in this process has not been stopped, or while another process holds
    /// the session lock.
    pub fn start(&self, config: MonitorConfig) -> MonitorResult<()> {
        if config.open_requests_interval.is_zero() || config.assigned_interval.is_zero() {
            return Err(MonitorError::InvalidConfig(
                "polling intervals must be non-zero".to_string(),
            ));
        }

        let mut session = self.session_guard();
        if session.is_some() {
            return Err(MonitorError::AlreadyRunning);
        }

        let lock_file = self.acquire_session_lock()?;

        let (stop_tx, stop_rx) = unbounded::<()>();
        let mut handles = Vec::with_capacity(2);
        for kind in [PollKind::OpenRequests, PollKind::Assigned] {
            let inner = Arc::clone(&self.inner);
            let config = config.clone();
            let stop_rx = stop_rx.clone();
            let handle = thread::Builder::new()
                .name(format!("revmon-{}", kind.label()))
                .spawn(move || poll_loop(&inner, &config, &stop_rx, kind))
                .context("Failed to spawn polling loop thread")?;
            handles.push(handle);
        }

        *session = Some(Session {
            stop_tx,
            handles,
            lock_file,
        });
        info!("monitoring started");
        Ok(())
    }

    /// Stop the active session, if any.
    ///
    /// Raises the stop signal and joins both polling loops before
    /// returning, so no loop outlives this call. Stopping with no active
    /// session is a no-op.
    pub fn stop(&self) -> MonitorResult<()> {
        let Some(session) = self.session_guard().take() else {
            debug!("no active monitoring session to stop");
            return Ok(());
        };

        drop(session.stop_tx);
        for handle in session.handles {
            if handle.join().is_err() {
                warn!("a polling loop panicked before shutdown");
            }
        }
        drop(session.lock_file);
        info!("monitoring stopped");
        Ok(())
    }

    /// Stop the active session (if any) and start a new one with `config`.
    pub fn restart(&self, config: MonitorConfig) -> MonitorResult<()> {
        self.stop()?;
        self.start(config)
    }

    /// Whether a monitoring session is active in this process.
    #[must_use]
    pub fn is_monitoring(&self) -> bool {
        self.session_guard().is_some()
    }

    /// Snapshot of all tracked reviews.
    #[must_use]
    pub fn list_reviews(&self) -> Vec<CodeReview> {
        self.inner.registry.list()
    }

    /// Look up one tracked review.
    #[must_use]
    pub fn get_review(&self, id: &str) -> Option<CodeReview> {
        self.inner.registry.get(id)
    }

    /// Accept the generated review and publish it back to the backend.
    ///
    /// Idempotent once published: when the entry is already `commented`
    /// nothing is posted again. On a post failure the entry keeps
    /// `accepted = true, commented = false` so a later call retries the
    /// post without re-invoking the AI collaborator.
    #[tracing::instrument(skip(self))]
    pub fn accept_review(&self, id: &str) -> MonitorResult<()> {
        let inner = &self.inner;
        let Some(review) = inner.registry.get(id) else {
            return Err(MonitorError::ReviewNotFound {
                review_id: id.to_string(),
            });
        };

        if review.commented {
            debug!(review_id = id, "review already published");
            return Ok(());
        }
        if review.review_text.is_empty() {
            return Err(MonitorError::NothingToPublish {
                review_id: id.to_string(),
            });
        }

        let host = inner
            .host_for(review.item.source)
            .ok_or(MonitorError::BackendUnavailable {
                backend: review.item.source,
            })?;

        inner.registry.mark_accepted(id);
        match host.post_review(&review.item, &review.review_text) {
            Ok(()) => {
                inner.registry.mark_commented(id);
                inner
                    .store
                    .mark_commented(review.item.source, &review.item.container_id);
                inner.notifier.notify(&format!("Published review for {id}"));
                info!(review_id = id, "review published to backend");
                Ok(())
            }
            Err(err) => {
                warn!(review_id = id, error = %err, "posting review failed");
                Err(MonitorError::Publish(err))
            }
        }
    }

    fn acquire_session_lock(&self) -> MonitorResult<File> {
        if let Some(parent) = self.lock_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create lock directory: {}", parent.display())
                })?;
            }
        }
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .open(&self.lock_path)
            .with_context(|| {
                format!("Failed to open session lock: {}", self.lock_path.display())
            })?;
        match file.try_lock_exclusive() {
            Ok(()) => Ok(file),
            Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                Err(MonitorError::AlreadyRunning)
            }
            Err(err) => Err(MonitorError::Internal(anyhow::Error::new(err).context(
                format!("Failed to lock session file: {}", self.lock_path.display()),
            ))),
        }
    }
}

impl Drop for MonitorService {
    fn drop(&mut self) {
        // Best effort: make sure loop threads do not outlive the service.
        let _ = self.stop();
    }
}

/// Body of one polling loop thread. Ticks on its own timer until the stop
/// channel is signalled or disconnected.
fn poll_loop(
    inner: &MonitorInner,
    config: &MonitorConfig,
    stop: &Receiver<()>,
    kind: PollKind,
) {
    let ticker = tick(kind.interval(config));
    debug!(poll = kind.label(), "polling loop started");
    loop {
        select! {
            recv(stop) -> _ => {
                debug!(poll = kind.label(), "polling loop stopping");
                return;
            }
            recv(ticker) -> _ => inner.run_tick(config, kind),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::{AiError, ReviewMode};
    use crate::host::{HostError, HostResult, ReviewCandidate};
    use crate::notify::NullNotifier;
    use crate::review::{ReviewItemRef, ReviewStatus};
    use std::sync::Mutex as StdMutex;
    use tempfile::tempdir;

    #[derive(Default)]
    struct HostState {
        candidates: Vec<ReviewCandidate>,
        current_commit: String,
        changes: String,
        full_content: String,
        unanswered_comment: bool,
        fail_listing: bool,
        fail_commit: bool,
        fail_changes: bool,
        fail_post: bool,
        full_content_calls: usize,
        changes_calls: usize,
        post_calls: usize,
    }

    struct MockHost {
        source: ReviewSource,
        state: StdMutex<HostState>,
    }

    impl MockHost {
        fn new(source: ReviewSource) -> Self {
            Self {
                source,
                state: StdMutex::new(HostState::default()),
            }
        }

        fn with<R>(&self, f: impl FnOnce(&mut HostState) -> R) -> R {
            f(&mut self.state.lock().unwrap())
        }
    }

    impl CodeHostClient for MockHost {
        fn source(&self) -> ReviewSource {
            self.source
        }

        fn list_items_for_review(&self) -> HostResult<Vec<ReviewCandidate>> {
            let state = self.state.lock().unwrap();
            if state.fail_listing {
                return Err(HostError::Network("connection refused".into()));
            }
            Ok(state.candidates.clone())
        }

        fn list_assigned_items(&self) -> HostResult<Vec<ReviewCandidate>> {
            self.list_items_for_review()
        }

        fn current_commit(&self, _item: &ReviewItemRef) -> HostResult<String> {
            let state = self.state.lock().unwrap();
            if state.fail_commit {
                return Err(HostError::Network("commit lookup failed".into()));
            }
            Ok(state.current_commit.clone())
        }

        fn changes(&self, _item: &ReviewItemRef) -> HostResult<String> {
            let mut state = self.state.lock().unwrap();
            if state.fail_changes {
                return Err(HostError::RateLimited("slow down".into()));
            }
            state.changes_calls += 1;
            Ok(state.changes.clone())
        }

        fn full_content(&self, _item: &ReviewItemRef) -> HostResult<String> {
            let mut state = self.state.lock().unwrap();
            if state.fail_changes {
                return Err(HostError::Network("content fetch failed".into()));
            }
            state.full_content_calls += 1;
            Ok(state.full_content.clone())
        }

        fn post_review(&self, _item: &ReviewItemRef, _text: &str) -> HostResult<()> {
            let mut state = self.state.lock().unwrap();
            state.post_calls += 1;
            if state.fail_post {
                return Err(HostError::Network("post failed".into()));
            }
            Ok(())
        }

        fn has_own_unanswered_comment(&self, _item: &ReviewItemRef) -> HostResult<bool> {
            Ok(self.state.lock().unwrap().unanswered_comment)
        }
    }

    #[derive(Default)]
    struct MockAi {
        calls: StdMutex<Vec<ReviewMode>>,
        fail: StdMutex<bool>,
    }

    impl MockAi {
        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }

        fn modes(&self) -> Vec<ReviewMode> {
            self.calls.lock().unwrap().clone()
        }

        fn set_failing(&self, failing: bool) {
            *self.fail.lock().unwrap() = failing;
        }
    }

    impl AiReviewClient for MockAi {
        fn generate_review(&self, input: &str, mode: ReviewMode) -> Result<String, AiError> {
            self.calls.lock().unwrap().push(mode);
            if *self.fail.lock().unwrap() {
                return Err(AiError::EmptyResponse);
            }
            Ok(format!("review of {} bytes", input.len()))
        }
    }

    struct Harness {
        _dir: tempfile::TempDir,
        host: Arc<MockHost>,
        ai: Arc<MockAi>,
        service: MonitorService,
        config: MonitorConfig,
    }

    fn gitlab_candidate(number: u64) -> ReviewCandidate {
        ReviewCandidate::new(
            ReviewItemRef::new(ReviewSource::GitLab, "7", number),
            format!("MR {number}"),
            "https://gitlab.example.test/mr",
        )
    }

    fn make_harness() -> Harness {
        let dir = tempdir().unwrap();
        let host = Arc::new(MockHost::new(ReviewSource::GitLab));
        let ai = Arc::new(MockAi::default());
        let service = MonitorService::new(
            dir.path().join("state.json"),
            vec![host.clone() as Arc<dyn CodeHostClient>],
            ai.clone() as Arc<dyn AiReviewClient>,
            Arc::new(NullNotifier),
        );
        let config = MonitorConfig {
            gitlab: crate::config::BackendConfig::active("glpat-test"),
            ..MonitorConfig::default()
        };
        Harness {
            _dir: dir,
            host,
            ai,
            service,
            config,
        }
    }

    fn run_open_tick(h: &Harness) {
        h.service.inner.run_tick(&h.config, PollKind::OpenRequests);
    }

    #[test]
    fn test_scenario_first_review_uses_full_content() {
        let h = make_harness();
        h.host.with(|s| {
            s.candidates = vec![gitlab_candidate(42)];
            s.current_commit = "abc123".into();
            s.full_content = "fn main() {}".into();
        });

        run_open_tick(&h);

        assert_eq!(h.ai.call_count(), 1);
        assert_eq!(h.ai.modes(), vec![ReviewMode::FullReview]);
        assert_eq!(h.host.with(|s| s.full_content_calls), 1);
        assert_eq!(h.host.with(|s| s.changes_calls), 0);

        let review = h.service.get_review("gitlab-7-42").unwrap();
        assert_eq!(review.status, ReviewStatus::Completed);
        assert_eq!(review.last_reviewed_commit, "abc123");
        assert!(!review.review_text.is_empty());

        let project = h
            .service
            .inner
            .store
            .get(ReviewSource::GitLab, "7")
            .unwrap();
        assert_eq!(project.last_reviewed_commit, "abc123");
        assert_eq!(project.review_count, 1);
    }

    #[test]
    fn test_scenario_unchanged_commit_is_deduped() {
        let h = make_harness();
        h.host.with(|s| {
            s.candidates = vec![gitlab_candidate(42)];
            s.current_commit = "abc123".into();
            s.full_content = "fn main() {}".into();
        });

        run_open_tick(&h);
        let before = h.service.get_review("gitlab-7-42").unwrap();

        run_open_tick(&h);

        assert_eq!(h.ai.call_count(), 1, "second tick must not generate");
        let after = h.service.get_review("gitlab-7-42").unwrap();
        assert_eq!(after.status, before.status);
        assert_eq!(after.review_text, before.review_text);
    }

    #[test]
    fn test_scenario_commit_change_generates_once() {
        let h = make_harness();
        h.host.with(|s| {
            s.candidates = vec![gitlab_candidate(42)];
            s.current_commit = "abc123".into();
            s.full_content = "fn main() {}".into();
        });
        run_open_tick(&h);

        h.host.with(|s| {
            s.current_commit = "def456".into();
            s.changes = "+fn helper() {}".into();
        });
        run_open_tick(&h);

        assert_eq!(h.ai.call_count(), 2);
        assert_eq!(
            h.ai.modes(),
            vec![ReviewMode::FullReview, ReviewMode::IncrementalReview]
        );
        assert_eq!(h.host.with(|s| s.changes_calls), 1);

        let review = h.service.get_review("gitlab-7-42").unwrap();
        assert_eq!(review.last_reviewed_commit, "def456");
        assert!(!review.commented);

        let project = h
            .service
            .inner
            .store
            .get(ReviewSource::GitLab, "7")
            .unwrap();
        assert_eq!(project.review_count, 2);
        assert!(!project.commented);
    }

    #[test]
    fn test_accept_publishes_once() {
        let h = make_harness();
        h.host.with(|s| {
            s.candidates = vec![gitlab_candidate(42)];
            s.current_commit = "abc123".into();
            s.full_content = "fn main() {}".into();
        });
        run_open_tick(&h);

        h.service.accept_review("gitlab-7-42").unwrap();
        assert_eq!(h.host.with(|s| s.post_calls), 1);

        let review = h.service.get_review("gitlab-7-42").unwrap();
        assert!(review.accepted);
        assert!(review.commented);
        assert!(
            h.service
                .inner
                .store
                .get(ReviewSource::GitLab, "7")
                .unwrap()
                .commented
        );

        // Second accept is a no-op.
        h.service.accept_review("gitlab-7-42").unwrap();
        assert_eq!(h.host.with(|s| s.post_calls), 1);
    }

    #[test]
    fn test_accept_failure_keeps_retryable_state() {
        let h = make_harness();
        h.host.with(|s| {
            s.candidates = vec![gitlab_candidate(42)];
            s.current_commit = "abc123".into();
            s.full_content = "fn main() {}".into();
        });
        run_open_tick(&h);

        h.host.with(|s| s.fail_post = true);
        let err = h.service.accept_review("gitlab-7-42").unwrap_err();
        assert!(matches!(err, MonitorError::Publish(_)));

        let review = h.service.get_review("gitlab-7-42").unwrap();
        assert!(review.accepted);
        assert!(!review.commented);

        // Retry succeeds without another generation.
        h.host.with(|s| s.fail_post = false);
        h.service.accept_review("gitlab-7-42").unwrap();
        assert_eq!(h.host.with(|s| s.post_calls), 2);
        assert_eq!(h.ai.call_count(), 1);
        assert!(h.service.get_review("gitlab-7-42").unwrap().commented);
    }

    #[test]
    fn test_accept_unknown_review_fails() {
        let h = make_harness();
        assert!(matches!(
            h.service.accept_review("gitlab-7-99"),
            Err(MonitorError::ReviewNotFound { .. })
        ));
    }

    #[test]
    fn test_generation_error_leaves_terminal_status() {
        let h = make_harness();
        h.host.with(|s| {
            s.candidates = vec![gitlab_candidate(42)];
            s.current_commit = "abc123".into();
            s.full_content = "fn main() {}".into();
        });
        h.ai.set_failing(true);

        run_open_tick(&h);

        let review = h.service.get_review("gitlab-7-42").unwrap();
        assert_eq!(review.status, ReviewStatus::Error);
        assert!(review.review_text.contains("AI error"));

        // The item stays eligible: a new commit triggers a fresh attempt.
        h.ai.set_failing(false);
        h.host.with(|s| {
            s.current_commit = "def456".into();
            s.changes = "+line".into();
        });
        run_open_tick(&h);
        assert_eq!(
            h.service.get_review("gitlab-7-42").unwrap().status,
            ReviewStatus::Completed
        );
    }

    #[test]
    fn test_fetch_error_does_not_leak_in_progress() {
        let h = make_harness();
        h.host.with(|s| {
            s.candidates = vec![gitlab_candidate(42)];
            s.current_commit = "abc123".into();
            s.fail_changes = true;
        });

        run_open_tick(&h);

        let review = h.service.get_review("gitlab-7-42").unwrap();
        assert_ne!(review.status, ReviewStatus::InProgress);
        assert_eq!(h.ai.call_count(), 0);

        // Next tick retries and succeeds.
        h.host.with(|s| {
            s.fail_changes = false;
            s.changes = "+fn main() {}".into();
        });
        run_open_tick(&h);
        assert_eq!(
            h.service.get_review("gitlab-7-42").unwrap().status,
            ReviewStatus::Completed
        );
        assert_eq!(h.ai.call_count(), 1);
    }

    #[test]
    fn test_listing_failure_aborts_tick_without_state_changes() {
        let h = make_harness();
        h.host.with(|s| {
            s.candidates = vec![gitlab_candidate(42)];
            s.fail_listing = true;
        });

        run_open_tick(&h);

        assert!(h.service.list_reviews().is_empty());
        assert_eq!(h.ai.call_count(), 0);
    }

    #[test]
    fn test_disabled_backend_is_skipped() {
        let mut h = make_harness();
        h.config.gitlab.enabled = false;
        h.host.with(|s| {
            s.candidates = vec![gitlab_candidate(42)];
            s.current_commit = "abc123".into();
        });

        run_open_tick(&h);

        assert!(h.service.list_reviews().is_empty());
        assert_eq!(h.ai.call_count(), 0);
    }

    #[test]
    fn test_identical_content_digest_skips_generation() {
        let h = make_harness();
        h.host.with(|s| {
            s.candidates = vec![gitlab_candidate(42)];
            s.current_commit = "abc123".into();
            s.full_content = "shared payload".into();
        });
        run_open_tick(&h);
        assert_eq!(h.ai.call_count(), 1);

        // New commit whose fetched content hashes identically: the commit
        // advances without a second generation.
        h.host.with(|s| {
            s.current_commit = "def456".into();
            s.changes = "shared payload".into();
        });
        run_open_tick(&h);

        assert_eq!(h.ai.call_count(), 1);
        let review = h.service.get_review("gitlab-7-42").unwrap();
        assert_eq!(review.review_text, NO_CHANGES_TEXT);
        assert_eq!(review.last_reviewed_commit, "def456");
        assert_eq!(review.status, ReviewStatus::Completed);
    }

    #[test]
    fn test_restart_with_unanswered_comment_skips_item() {
        let dir = tempdir().unwrap();
        let state_path = dir.path().join("state.json");

        // A previous run reviewed container 7 at abc123.
        {
            let store = TrackingStore::open(&state_path);
            store.update_state(ReviewSource::GitLab, "7", "abc123", chrono::Utc::now());
        }

        let host = Arc::new(MockHost::new(ReviewSource::GitLab));
        let ai = Arc::new(MockAi::default());
        let service = MonitorService::new(
            &state_path,
            vec![host.clone() as Arc<dyn CodeHostClient>],
            ai.clone() as Arc<dyn AiReviewClient>,
            Arc::new(NullNotifier),
        );
        let config = MonitorConfig {
            gitlab: crate::config::BackendConfig::active("glpat-test"),
            ..MonitorConfig::default()
        };

        host.with(|s| {
            s.candidates = vec![gitlab_candidate(42)];
            s.current_commit = "abc123".into();
            s.unanswered_comment = true;
        });
        service.inner.run_tick(&config, PollKind::OpenRequests);

        // Our comment is still waiting for an answer and nothing changed
        // upstream: no generation, no status churn.
        assert_eq!(ai.call_count(), 0);
        let review = service.get_review("gitlab-7-42").unwrap();
        assert_eq!(review.status, ReviewStatus::Pending);

        // Once the commit moves, generation resumes with a diff fetch.
        host.with(|s| {
            s.unanswered_comment = true;
            s.current_commit = "def456".into();
            s.changes = "+new work".into();
        });
        service.inner.run_tick(&config, PollKind::OpenRequests);
        assert_eq!(ai.call_count(), 1);
        assert_eq!(ai.modes(), vec![ReviewMode::IncrementalReview]);
        assert_eq!(
            service.get_review("gitlab-7-42").unwrap().last_reviewed_commit,
            "def456"
        );
    }

    #[test]
    fn test_restart_without_comment_records_no_change() {
        let dir = tempdir().unwrap();
        let state_path = dir.path().join("state.json");
        {
            let store = TrackingStore::open(&state_path);
            store.update_state(ReviewSource::GitLab, "7", "abc123", chrono::Utc::now());
        }

        let host = Arc::new(MockHost::new(ReviewSource::GitLab));
        let ai = Arc::new(MockAi::default());
        let service = MonitorService::new(
            &state_path,
            vec![host.clone() as Arc<dyn CodeHostClient>],
            ai.clone() as Arc<dyn AiReviewClient>,
            Arc::new(NullNotifier),
        );
        let config = MonitorConfig {
            gitlab: crate::config::BackendConfig::active("glpat-test"),
            ..MonitorConfig::default()
        };

        host.with(|s| {
            s.candidates = vec![gitlab_candidate(42)];
            s.current_commit = "abc123".into();
        });
        service.inner.run_tick(&config, PollKind::OpenRequests);

        assert_eq!(ai.call_count(), 0);
        let review = service.get_review("gitlab-7-42").unwrap();
        assert_eq!(review.status, ReviewStatus::Completed);
        assert_eq!(review.review_text, NO_CHANGES_TEXT);
        assert_eq!(review.last_reviewed_commit, "abc123");
    }

    #[test]
    fn test_regeneration_resets_publish_flags() {
        let h = make_harness();
        h.host.with(|s| {
            s.candidates = vec![gitlab_candidate(42)];
            s.current_commit = "abc123".into();
            s.full_content = "fn main() {}".into();
        });
        run_open_tick(&h);
        h.service.accept_review("gitlab-7-42").unwrap();
        assert!(h.service.get_review("gitlab-7-42").unwrap().commented);

        h.host.with(|s| {
            s.current_commit = "def456".into();
            s.changes = "+more".into();
        });
        run_open_tick(&h);

        let review = h.service.get_review("gitlab-7-42").unwrap();
        assert!(!review.accepted);
        assert!(!review.commented);

        // The fresh draft can be accepted and published again.
        h.service.accept_review("gitlab-7-42").unwrap();
        assert_eq!(h.host.with(|s| s.post_calls), 2);
    }
}

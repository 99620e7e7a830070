//! Immutable monitoring configuration.
//!
//! A configuration is a value: a settings change produces a new
//! `MonitorConfig` and a `restart`, never an in-place mutation the
//! scheduler could observe mid-tick.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::review::ReviewSource;

/// Default interval for the open-review-requests polling loop.
pub const DEFAULT_OPEN_REQUESTS_INTERVAL: Duration = Duration::from_secs(300);
/// Default interval for the assigned-items polling loop.
pub const DEFAULT_ASSIGNED_INTERVAL: Duration = Duration::from_secs(120);
/// Default AI input length threshold above which input is segmented.
pub const DEFAULT_SEGMENT_THRESHOLD: usize = 1500;

/// Per-backend settings.
///
/// A backend is polled only when it is enabled and has a credential; a
/// disabled or credential-less backend is skipped entirely.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendConfig {
    pub enabled: bool,
    #[serde(default)]
    pub api_token: String,
}

impl BackendConfig {
    #[must_use]
    pub fn active(token: impl Into<String>) -> Self {
        Self {
            enabled: true,
            api_token: token.into(),
        }
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.enabled && !self.api_token.trim().is_empty()
    }
}

/// Configuration for one monitoring session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorConfig {
    #[serde(default)]
    pub gitlab: BackendConfig,
    #[serde(default)]
    pub github: BackendConfig,
    /// How often the open-review-requests loop ticks.
    pub open_requests_interval: Duration,
    /// How often the assigned-items loop ticks.
    pub assigned_interval: Duration,
    /// AI input length threshold above which input is segmented, in bytes.
    pub segment_threshold: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            gitlab: BackendConfig::default(),
            github: BackendConfig::default(),
            open_requests_interval: DEFAULT_OPEN_REQUESTS_INTERVAL,
            assigned_interval: DEFAULT_ASSIGNED_INTERVAL,
            segment_threshold: DEFAULT_SEGMENT_THRESHOLD,
        }
    }
}

impl MonitorConfig {
    /// Apply one interval to both polling loops (legacy single-interval
    /// configurations).
    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.open_requests_interval = interval;
        self.assigned_interval = interval;
        self
    }

    #[must_use]
    pub fn backend(&self, source: ReviewSource) -> &BackendConfig {
        match source {
            ReviewSource::GitLab => &self.gitlab,
            ReviewSource::GitHub => &self.github,
        }
    }
}

//! revmon-core — review-monitoring and deduplication engine.
//!
//! This crate owns the concurrent polling scheduler, the in-memory review
//! registry and its status state machine, change detection, the durable
//! cross-run tracking store, and the accept/publish workflow. The concrete
//! code-host and AI clients, notification delivery, and any presentation
//! layer live outside this crate and plug in through the traits in
//! [`host`], [`ai`], and [`notify`].

pub mod ai;
pub mod config;
pub mod detect;
pub mod errors;
pub mod host;
pub mod monitor;
pub mod notify;
pub mod registry;
pub mod review;
pub mod state;

pub use config::{BackendConfig, MonitorConfig};
pub use errors::{MonitorError, MonitorResult};
pub use monitor::MonitorService;
pub use registry::ReviewRegistry;
pub use review::{CodeReview, ReviewItemRef, ReviewSource, ReviewStatus};
pub use state::TrackingStore;

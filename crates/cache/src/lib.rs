//! Report caches for recap
//!
//! Two cache fronts share one subprocess-based report generator:
//! - [`ActiveRecordingReportCache`] keeps reports of recordings on live
//!   targets in memory, with a TTL and refresh-ahead
//! - [`ArchivedRecordingReportCache`] keeps reports of archived recordings on
//!   disk, one file per recording and filter
//!
//! Every generation runs under a single [`GenerationLock`], so at most one
//! worker process exists at any time.

pub mod active;
pub mod archive_store;
pub mod archived;
pub mod config;
pub mod generator;
pub mod lock;
pub mod notifications;
pub mod process;
pub mod reports;
pub mod worker;

pub use active::{ActiveRecordingReportCache, ActiveReportKey, CachedReport};
pub use archive_store::{ArchiveStore, ArchivedRecording, FsArchiveStore};
pub use archived::ArchivedRecordingReportCache;
pub use config::{
    ActiveCacheConfig, ArchivedCacheConfig, ConfigSource, GeneratorConfig, ReportsConfig,
    ReportsConfigBuilder, ReportsConfigLoader,
};
pub use generator::{exit_status_for, ReportGenerator, SubprocessReportGenerator};
pub use lock::{GenerationLock, GenerationPermit};
pub use notifications::{recording_events, spawn_invalidation_listener, RecordingEvent};
pub use process::{ProcessOutcome, ProcessRunner, ProcessSpec};
pub use reports::ReportCaches;
pub use worker::{run_worker, RenderError, ReportRenderer, WorkerRequest};

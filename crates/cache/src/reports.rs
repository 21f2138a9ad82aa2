//! Wiring both caches to one generator and one lock

use crate::active::ActiveRecordingReportCache;
use crate::archive_store::FsArchiveStore;
use crate::archived::ArchivedRecordingReportCache;
use crate::config::ReportsConfig;
use crate::generator::{ReportGenerator, SubprocessReportGenerator};
use crate::lock::GenerationLock;
use recap_core::Result;
use std::sync::Arc;

pub struct ReportCaches {
    pub lock: GenerationLock,
    pub active: ActiveRecordingReportCache,
    pub archived: ArchivedRecordingReportCache,
}

impl ReportCaches {
    pub fn from_config(config: &ReportsConfig) -> Result<Self> {
        config.validate()?;
        tracing::debug!(source = ?config.source, "building report caches");

        let lock = GenerationLock::new();
        let generator: Arc<dyn ReportGenerator> = Arc::new(SubprocessReportGenerator::new(
            config.generator.clone(),
            lock.clone(),
        ));
        let archive = Arc::new(FsArchiveStore::new(&config.archived.archive_dir));

        Ok(Self {
            active: ActiveRecordingReportCache::new(&config.active, Arc::clone(&generator)),
            archived: ArchivedRecordingReportCache::new(
                &config.archived.report_dir,
                generator,
                archive,
            ),
            lock,
        })
    }
}

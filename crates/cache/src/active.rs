//! In-memory report cache for recordings on live targets
//!
//! Entries expire a fixed time after they were written. Once an entry is older
//! than the refresh interval, the next hit schedules a background regeneration
//! and keeps serving the current content until the new report lands. The cache
//! is bounded by the total size of the report text it holds, so large reports
//! can be dropped early and are regenerated on the next request.

use crate::config::ActiveCacheConfig;
use crate::generator::ReportGenerator;
use dashmap::mapref::entry::Entry;
use dashmap::{DashMap, DashSet};
use moka::future::Cache;
use recap_core::{ConnectionDescriptor, Error, RecordingDescriptor, ReportFilter, Result};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;

/// Key of one cached report
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ActiveReportKey {
    pub recording: RecordingDescriptor,
    pub filter: ReportFilter,
}

impl ActiveReportKey {
    fn recording_id(&self) -> RecordingId {
        (
            self.recording.connection.target_id().to_string(),
            self.recording.recording_name.clone(),
        )
    }
}

#[derive(Debug)]
pub struct CachedReport {
    pub content: String,
    pub written_at: Instant,
}

impl CachedReport {
    fn new(content: String) -> Self {
        Self {
            content,
            written_at: Instant::now(),
        }
    }

    /// Approximate bytes held, used as the eviction weight
    fn weight(&self, key: &ActiveReportKey) -> u32 {
        let bytes = self.content.len()
            + key.filter.len()
            + key.recording.recording_name.len()
            + key.recording.connection.target_id().len();
        u32::try_from(bytes).unwrap_or(u32::MAX)
    }
}

type Entries = Cache<ActiveReportKey, Arc<CachedReport>>;

/// Outcome of one load, `None` until the load task finishes
type LoadState = Option<std::result::Result<Arc<CachedReport>, Arc<Error>>>;

/// Target id and recording name; the granularity of `delete`
type RecordingId = (String, String);

/// Per-recording invalidation counters
///
/// A generation reads the epoch before it starts and only keeps its result if
/// no `delete` bumped the epoch in the meantime.
#[derive(Default)]
struct Invalidations(DashMap<RecordingId, u64>);

impl Invalidations {
    fn epoch(&self, key: &ActiveReportKey) -> u64 {
        self.0.get(&key.recording_id()).map_or(0, |epoch| *epoch)
    }

    fn bump(&self, id: RecordingId) {
        *self.0.entry(id).or_insert(0) += 1;
    }
}

#[derive(Clone)]
pub struct ActiveRecordingReportCache {
    entries: Entries,
    generator: Arc<dyn ReportGenerator>,
    refresh_after: Duration,
    loading: Arc<DashMap<ActiveReportKey, watch::Receiver<LoadState>>>,
    refreshing: Arc<DashSet<ActiveReportKey>>,
    invalidations: Arc<Invalidations>,
}

impl ActiveRecordingReportCache {
    pub fn new(config: &ActiveCacheConfig, generator: Arc<dyn ReportGenerator>) -> Self {
        let entries = Cache::builder()
            .name("active-reports")
            .max_capacity(config.max_bytes)
            .weigher(|key: &ActiveReportKey, report: &Arc<CachedReport>| report.weight(key))
            .time_to_live(config.ttl)
            .build();

        Self {
            entries,
            generator,
            refresh_after: config.refresh_after,
            loading: Arc::new(DashMap::new()),
            refreshing: Arc::new(DashSet::new()),
            invalidations: Arc::new(Invalidations::default()),
        }
    }

    /// The report for a recording on a live target
    ///
    /// Concurrent misses on the same key share one generation. The generation
    /// runs on its own task, so a caller that stops waiting does not cancel it
    /// and later callers join the same task.
    pub async fn get(
        &self,
        connection: &ConnectionDescriptor,
        recording_name: &str,
        filter: &str,
    ) -> Result<String> {
        let recording = RecordingDescriptor::new(connection.clone(), recording_name);
        recording.validate()?;
        let key = ActiveReportKey {
            recording,
            filter: filter.to_string(),
        };

        loop {
            if let Some(report) = self.entries.get(&key).await {
                tracing::debug!(recording = %key.recording, filter = %key.filter, "active report cache hit");
                if report.written_at.elapsed() >= self.refresh_after {
                    self.schedule_refresh(key);
                }
                return Ok(report.content.clone());
            }

            if let Some(load) = self.join_or_start_load(&key) {
                let report = wait_for_load(load).await?;
                return Ok(report.content.clone());
            }
        }
    }

    /// Drop every cached report of a recording, whatever its filter
    ///
    /// Entries match on target and recording name; credentials are ignored.
    /// Generations of the recording still running are not stored. Returns
    /// whether anything was cached.
    pub async fn delete(&self, connection: &ConnectionDescriptor, recording_name: &str) -> bool {
        self.invalidations.bump((
            connection.target_id().to_string(),
            recording_name.to_string(),
        ));

        let stale: Vec<ActiveReportKey> = self
            .entries
            .iter()
            .filter(|(key, _)| {
                key.recording.recording_name == recording_name
                    && key.recording.connection.same_target(connection)
            })
            .map(|(key, _)| ActiveReportKey::clone(&key))
            .collect();

        for key in &stale {
            self.entries.invalidate(key).await;
        }
        if !stale.is_empty() {
            tracing::debug!(
                target_id = connection.target_id(),
                recording = recording_name,
                entries = stale.len(),
                "invalidated active reports"
            );
        }
        !stale.is_empty()
    }

    /// Number of cached reports, after pending evictions are applied
    pub async fn entry_count(&self) -> u64 {
        self.entries.run_pending_tasks().await;
        self.entries.entry_count()
    }

    /// Subscribe to the running load for `key`, starting one if none runs
    ///
    /// Returns `None` when a load finished and stored its report after the
    /// caller's cache lookup; the caller should look again.
    fn join_or_start_load(&self, key: &ActiveReportKey) -> Option<watch::Receiver<LoadState>> {
        match self.loading.entry(key.clone()) {
            Entry::Occupied(running) => Some(running.get().clone()),
            // Loads store their report before leaving `loading`
            Entry::Vacant(_) if self.entries.contains_key(key) => None,
            Entry::Vacant(slot) => {
                let (done, load) = watch::channel(None);
                slot.insert(load.clone());
                self.spawn_load(key.clone(), done);
                Some(load)
            }
        }
    }

    /// Generate on a separate task that stores its own result, so the report
    /// is kept even if every caller waiting for it has gone away
    fn spawn_load(&self, key: ActiveReportKey, done: watch::Sender<LoadState>) {
        let entries = self.entries.clone();
        let generator = Arc::clone(&self.generator);
        let invalidations = Arc::clone(&self.invalidations);
        let epoch = invalidations.epoch(&key);
        let landed = LoadingSlot {
            loading: Arc::clone(&self.loading),
            key: key.clone(),
        };

        tokio::spawn(async move {
            let outcome = match generator
                .generate_target_report(&key.recording, &key.filter)
                .await
            {
                Ok(content) => {
                    let report = Arc::new(CachedReport::new(content));
                    store(&entries, &invalidations, &key, Arc::clone(&report), epoch).await;
                    Ok(report)
                }
                Err(e) => Err(Arc::new(e)),
            };
            done.send_replace(Some(outcome));
            drop(landed);
        });
    }

    fn schedule_refresh(&self, key: ActiveReportKey) {
        if !self.refreshing.insert(key.clone()) {
            return;
        }

        let entries = self.entries.clone();
        let generator = Arc::clone(&self.generator);
        let refreshing = Arc::clone(&self.refreshing);
        let invalidations = Arc::clone(&self.invalidations);
        let epoch = invalidations.epoch(&key);
        tokio::spawn(async move {
            tracing::debug!(recording = %key.recording, "refreshing active report");
            match generator
                .generate_target_report(&key.recording, &key.filter)
                .await
            {
                // Expired or deleted entries are not brought back
                Ok(content) if entries.contains_key(&key) => {
                    let report = Arc::new(CachedReport::new(content));
                    store(&entries, &invalidations, &key, report, epoch).await;
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(recording = %key.recording, "background report refresh failed: {e}");
                }
            }
            refreshing.remove(&key);
        });
    }
}

/// Removes a key from the running loads when its task ends, panics included
struct LoadingSlot {
    loading: Arc<DashMap<ActiveReportKey, watch::Receiver<LoadState>>>,
    key: ActiveReportKey,
}

impl Drop for LoadingSlot {
    fn drop(&mut self) {
        self.loading.remove(&self.key);
    }
}

/// Insert a generated report unless its recording was invalidated after
/// `epoch` was read
///
/// The epoch is checked again after the insert so a `delete` racing the
/// insert still removes the entry.
async fn store(
    entries: &Entries,
    invalidations: &Invalidations,
    key: &ActiveReportKey,
    report: Arc<CachedReport>,
    epoch: u64,
) -> bool {
    if invalidations.epoch(key) != epoch {
        tracing::debug!(recording = %key.recording, "recording invalidated during generation; report not cached");
        return false;
    }
    entries.insert(key.clone(), report).await;
    if invalidations.epoch(key) != epoch {
        entries.invalidate(key).await;
        return false;
    }
    true
}

async fn wait_for_load(mut load: watch::Receiver<LoadState>) -> Result<Arc<CachedReport>> {
    let outcome = load
        .wait_for(Option::is_some)
        .await
        .map_err(|_| Error::internal("report generation task ended without a result"))?
        .clone();
    match outcome {
        Some(Ok(report)) => Ok(report),
        Some(Err(e)) => Err(Error::from(e)),
        None => Err(Error::internal("report generation task ended without a result")),
    }
}

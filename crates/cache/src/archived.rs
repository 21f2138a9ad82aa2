//! Disk-backed report cache for archived recordings
//!
//! The filesystem is the cache: each (recording, filter) pair maps to a fixed
//! file under the report directory, so a report that exists on disk is served
//! without taking the generation lock. Misses use double-checked locking
//! against the same file so concurrent callers converge on one generation.

use crate::archive_store::{validate_recording_name, ArchiveStore};
use crate::generator::ReportGenerator;
use recap_core::{Error, Result, REPORT_FILE_SUFFIX};
use recap_utils::publish_report;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use xxhash_rust::xxh3::xxh3_64;

/// Hex digits in the filter component of a report file name
const FILTER_HASH_LEN: usize = 16;

pub struct ArchivedRecordingReportCache {
    report_dir: PathBuf,
    generator: Arc<dyn ReportGenerator>,
    archive: Arc<dyn ArchiveStore>,
}

impl ArchivedRecordingReportCache {
    pub fn new(
        report_dir: impl Into<PathBuf>,
        generator: Arc<dyn ReportGenerator>,
        archive: Arc<dyn ArchiveStore>,
    ) -> Self {
        Self {
            report_dir: report_dir.into(),
            generator,
            archive,
        }
    }

    pub fn report_dir(&self) -> &Path {
        &self.report_dir
    }

    /// Where the report for `(recording_name, filter)` lives
    ///
    /// `<report_dir>/<name>.report.html` when unfiltered, otherwise
    /// `<report_dir>/<name>.<xxh3 of filter>.report.html`.
    pub fn report_path(&self, recording_name: &str, filter: &str) -> Result<PathBuf> {
        validate_recording_name(recording_name)?;
        let file_name = if filter.is_empty() {
            format!("{recording_name}{REPORT_FILE_SUFFIX}")
        } else {
            format!(
                "{recording_name}.{:0width$x}{REPORT_FILE_SUFFIX}",
                xxh3_64(filter.as_bytes()),
                width = FILTER_HASH_LEN
            )
        };
        Ok(self.report_dir.join(file_name))
    }

    /// Path of the report, generating it first if it is not on disk
    ///
    /// A classified generation failure leaves its message in the report file,
    /// so later calls return that file instead of retrying. A missing source
    /// recording never leaves a file behind.
    pub async fn get(&self, recording_name: &str, filter: &str) -> Result<PathBuf> {
        let destination = self.report_path(recording_name, filter)?;

        if is_cached(&destination).await {
            tracing::debug!(path = %destination.display(), "archived report cache hit");
            return Ok(destination);
        }

        let permit = self.generator.lock().acquire().await?;

        // Another caller may have generated it while we waited
        if is_cached(&destination).await {
            tracing::debug!(path = %destination.display(), "archived report generated while waiting");
            return Ok(destination);
        }

        let Some(source) = self.archive.find(recording_name).await? else {
            let removed = self.delete(recording_name).await?;
            if removed {
                tracing::info!(recording = recording_name, "removed reports of missing recording");
            }
            return Err(Error::recording_not_found(recording_name, "the recording archive"));
        };

        let result = self
            .generator
            .generate_file_report(&permit, &source.path, &destination, filter)
            .await;

        match result {
            Ok(path) => Ok(path),
            Err(e) if e.is_generation_failure() && !e.is_not_found() => {
                self.cache_failure(&destination, &e).await;
                Err(e)
            }
            Err(e) => {
                if e.is_not_found() {
                    tracing::info!(recording = recording_name, "recording vanished during generation");
                } else if !e.is_generation_failure() {
                    tracing::error!(recording = recording_name, "report generation error: {e}");
                }
                remove_if_present(&destination).await?;
                Err(e)
            }
        }
    }

    /// Remove every cached report of a recording, filtered or not
    ///
    /// `<name>.<16 hex>.report.html` is only taken as a filtered report of
    /// `<name>` when no archived recording is literally named `<name>.<16 hex>`.
    /// Returns whether anything was removed.
    pub async fn delete(&self, recording_name: &str) -> Result<bool> {
        validate_recording_name(recording_name)?;
        let archived = self.archived_names().await?;

        let mut removed = false;
        for (path, names) in self.report_files().await? {
            let owned = match names.as_slice() {
                [literal, ..] if literal == recording_name => true,
                [literal, stripped] => stripped == recording_name && !archived.contains(literal),
                _ => false,
            };
            if owned && remove_if_present(&path).await? {
                removed = true;
            }
        }
        Ok(removed)
    }

    /// Delete reports whose source recording no longer exists in the archive
    ///
    /// A file that could still be the report of an archived recording is
    /// kept. Returns the number of report files removed.
    pub async fn prune_orphans(&self) -> Result<usize> {
        let recordings = self.archived_names().await?;

        let mut pruned = 0;
        for (path, names) in self.report_files().await? {
            if names.iter().any(|name| recordings.contains(name)) {
                continue;
            }
            if remove_if_present(&path).await? {
                tracing::debug!(path = %path.display(), "pruned orphaned report");
                pruned += 1;
            }
        }
        if pruned > 0 {
            tracing::info!(pruned, "pruned orphaned archived reports");
        }
        Ok(pruned)
    }

    async fn archived_names(&self) -> Result<HashSet<String>> {
        Ok(self
            .archive
            .list()
            .await?
            .into_iter()
            .map(|r| r.recording_name)
            .collect())
    }

    /// Report files on disk, each with the recording names it could belong to
    async fn report_files(&self) -> Result<Vec<(PathBuf, Vec<String>)>> {
        let mut entries = match tokio::fs::read_dir(&self.report_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Error::file_system(&self.report_dir, "list reports", e)),
        };

        let mut files = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| Error::file_system(&self.report_dir, "list reports", e))?
        {
            let file_name = entry.file_name().to_string_lossy().into_owned();
            let candidates = recording_names_of(&file_name);
            if !candidates.is_empty() {
                files.push((entry.path(), candidates));
            }
        }
        Ok(files)
    }

    /// Persist the failure message in place of the report
    async fn cache_failure(&self, destination: &Path, error: &Error) {
        tracing::warn!(path = %destination.display(), "caching report failure: {error}");

        let path = destination.to_path_buf();
        let message = error.to_string();
        let written =
            tokio::task::spawn_blocking(move || publish_report(&path, &message)).await;

        let failure = match written {
            Ok(Ok(())) => return,
            Ok(Err(e)) => e.to_string(),
            Err(e) => e.to_string(),
        };
        tracing::warn!(path = %destination.display(), "could not cache report failure: {failure}");
        if let Err(e) = remove_if_present(destination).await {
            tracing::warn!("{e}");
        }
    }
}

async fn is_cached(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|meta| meta.is_file())
        .unwrap_or(false)
}

async fn remove_if_present(path: &Path) -> Result<bool> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(Error::file_system(path, "remove report", e)),
    }
}

/// Recording names a report file name may have been derived from
///
/// `a.0123456789abcdef.report.html` is either the filtered report of `a` or
/// the unfiltered report of a recording literally named `a.0123456789abcdef`.
fn recording_names_of(file_name: &str) -> Vec<String> {
    let Some(stem) = file_name.strip_suffix(REPORT_FILE_SUFFIX) else {
        return Vec::new();
    };
    if stem.is_empty() {
        return Vec::new();
    }

    let mut names = vec![stem.to_string()];
    if let Some((name, hash)) = stem.rsplit_once('.') {
        if !name.is_empty()
            && hash.len() == FILTER_HASH_LEN
            && hash.bytes().all(|b| b.is_ascii_hexdigit())
        {
            names.push(name.to_string());
        }
    }
    names
}

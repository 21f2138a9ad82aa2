//! Locating archived recordings on disk
//!
//! The archive is laid out as `<archive_dir>/<scope>/<recording_name>`, where
//! a scope groups the recordings taken from one target.

use async_trait::async_trait;
use recap_core::{Error, Result};
use std::path::{Path, PathBuf};

/// An archived recording file and the scope it was found in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchivedRecording {
    pub scope: String,
    pub recording_name: String,
    pub path: PathBuf,
}

/// Resolves recording names to readable files
#[async_trait]
pub trait ArchiveStore: Send + Sync {
    /// Find a recording by name in any scope
    async fn find(&self, recording_name: &str) -> Result<Option<ArchivedRecording>>;

    /// Every archived recording
    async fn list(&self) -> Result<Vec<ArchivedRecording>>;
}

/// Reject names that would escape a scope directory
pub fn validate_recording_name(recording_name: &str) -> Result<()> {
    if recording_name.trim().is_empty() {
        return Err(Error::invalid_argument("recording_name", "cannot be empty"));
    }
    if recording_name == "." || recording_name == ".." {
        return Err(Error::invalid_argument(
            "recording_name",
            format!("'{recording_name}' is not a recording"),
        ));
    }
    if recording_name.contains(['/', '\\', '\0']) {
        return Err(Error::invalid_argument(
            "recording_name",
            format!("'{recording_name}' must be a single path component"),
        ));
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct FsArchiveStore {
    root: PathBuf,
}

impl FsArchiveStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    async fn scopes(&self) -> Result<Vec<(String, PathBuf)>> {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Error::file_system(&self.root, "list archive", e)),
        };

        let mut scopes = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| Error::file_system(&self.root, "list archive", e))?
        {
            let is_dir = entry
                .file_type()
                .await
                .map(|t| t.is_dir())
                .unwrap_or(false);
            if is_dir {
                scopes.push((entry.file_name().to_string_lossy().into_owned(), entry.path()));
            }
        }
        scopes.sort();
        Ok(scopes)
    }
}

#[async_trait]
impl ArchiveStore for FsArchiveStore {
    async fn find(&self, recording_name: &str) -> Result<Option<ArchivedRecording>> {
        validate_recording_name(recording_name)?;
        for (scope, dir) in self.scopes().await? {
            let candidate = dir.join(recording_name);
            match tokio::fs::metadata(&candidate).await {
                Ok(meta) if meta.is_file() => {
                    return Ok(Some(ArchivedRecording {
                        scope,
                        recording_name: recording_name.to_string(),
                        path: candidate,
                    }));
                }
                Ok(_) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(Error::file_system(&candidate, "inspect recording", e)),
            }
        }
        Ok(None)
    }

    async fn list(&self) -> Result<Vec<ArchivedRecording>> {
        let mut recordings = Vec::new();
        for (scope, dir) in self.scopes().await? {
            let mut entries = tokio::fs::read_dir(&dir)
                .await
                .map_err(|e| Error::file_system(&dir, "list archive scope", e))?;
            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| Error::file_system(&dir, "list archive scope", e))?
            {
                let is_file = entry
                    .file_type()
                    .await
                    .map(|t| t.is_file())
                    .unwrap_or(false);
                if is_file {
                    recordings.push(ArchivedRecording {
                        scope: scope.clone(),
                        recording_name: entry.file_name().to_string_lossy().into_owned(),
                        path: entry.path(),
                    });
                }
            }
        }
        Ok(recordings)
    }
}

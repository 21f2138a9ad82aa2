//! RAII guards that remove temporary files on every exit path, including
//! early returns, panics and termination signals.

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use recap_core::{Error, Result};
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Global cleanup registry for tracking resources
static CLEANUP_REGISTRY: Lazy<Mutex<CleanupRegistry>> =
    Lazy::new(|| Mutex::new(CleanupRegistry::new()));

/// Registry for tracking resources that need cleanup
struct CleanupRegistry {
    resources: HashMap<u64, PathBuf>,
    next_id: u64,
}

impl CleanupRegistry {
    fn new() -> Self {
        Self {
            resources: HashMap::with_capacity(16),
            next_id: 0,
        }
    }

    fn register(&mut self, path: PathBuf) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.resources.insert(id, path);
        id
    }

    fn unregister(&mut self, id: u64) {
        self.resources.remove(&id);
    }

    fn cleanup_all(&mut self) {
        for (_, path) in self.resources.drain() {
            tracing::debug!(path = %path.display(), "emergency cleanup of temporary file");
            let _ = fs::remove_file(&path);
        }
    }
}

/// RAII guard for temporary files
#[derive(Debug)]
pub struct TempFileGuard {
    path: PathBuf,
    registry_id: Option<u64>,
}

impl TempFileGuard {
    /// Take responsibility for removing `path`, whether or not it exists yet
    pub fn new(path: PathBuf) -> Self {
        let registry_id = Some(CLEANUP_REGISTRY.lock().register(path.clone()));
        Self { path, registry_id }
    }

    /// Reserve a unique, not yet created path in `dir`
    pub fn reserve_in(dir: &Path, prefix: &str, suffix: &str) -> Self {
        Self::new(dir.join(format!("{prefix}{}{suffix}", Uuid::new_v4())))
    }

    /// Create a unique file in `dir` holding `content`
    pub fn create_in(dir: &Path, prefix: &str, suffix: &str, content: &[u8]) -> Result<Self> {
        let guard = Self::reserve_in(dir, prefix, suffix);
        let mut file = fs::OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(guard.path())
            .map_err(|e| Error::file_system(guard.path(), "create temporary file", e))?;
        file.write_all(content)
            .map_err(|e| Error::file_system(guard.path(), "write temporary file", e))?;
        file.sync_all()
            .map_err(|e| Error::file_system(guard.path(), "sync temporary file", e))?;
        Ok(guard)
    }

    /// Get the path to the temporary file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rename the file to `destination`, replacing any file there
    ///
    /// On failure the guard still owns the file and removes it when dropped.
    pub fn persist(mut self, destination: &Path) -> Result<()> {
        fs::rename(&self.path, destination)
            .map_err(|e| Error::file_system(destination, "move temporary file into place", e))?;
        if let Some(id) = self.registry_id.take() {
            CLEANUP_REGISTRY.lock().unregister(id);
        }
        Ok(())
    }
}

impl Drop for TempFileGuard {
    fn drop(&mut self) {
        let Some(id) = self.registry_id.take() else {
            return;
        };
        CLEANUP_REGISTRY.lock().unregister(id);

        match fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "failed to remove temporary file"
                );
            }
        }
    }
}

/// Remove temporary files when the process is interrupted (called once at startup)
pub fn init_cleanup_handler() {
    #[cfg(unix)]
    {
        use signal_hook::{consts::SIGINT, consts::SIGTERM, iterator::Signals};
        use std::thread;

        thread::spawn(move || {
            let mut signals = match Signals::new([SIGINT, SIGTERM]) {
                Ok(s) => s,
                Err(e) => {
                    tracing::error!("failed to register signal handlers: {e}");
                    return;
                }
            };

            #[allow(clippy::never_loop)]
            for sig in signals.forever() {
                tracing::info!("received signal {sig}, cleaning up temporary files");
                cleanup_all_resources();
                std::process::exit(128 + sig);
            }
        });
    }
}

/// Remove every temporary file still registered
pub fn cleanup_all_resources() {
    CLEANUP_REGISTRY.lock().cleanup_all();
}

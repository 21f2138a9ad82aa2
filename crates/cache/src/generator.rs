//! Out-of-process report generation
//!
//! A report is computed by re-invoking a worker program (by default this
//! executable's hidden `worker` subcommand) with positional arguments
//! `(locator, recording-name | -, destination, filter)`. Credentials and the
//! transformer descriptor travel through the environment so they never show
//! up in a process listing. The worker's exit code is mapped onto
//! [`ExitStatus`].

use crate::config::GeneratorConfig;
use crate::lock::{GenerationLock, GenerationPermit};
use crate::process::{ProcessOutcome, ProcessRunner, ProcessSpec};
use async_trait::async_trait;
use recap_core::{
    ConnectionDescriptor, Credentials, Error, ExitStatus, RecordingDescriptor, Result,
    NO_RECORDING_NAME, RECAP_TARGET_PASSWORD_VAR, RECAP_TARGET_USERNAME_VAR,
    RECAP_TRANSFORMERS_FILE_VAR, RECAP_WORKER_MAX_MEMORY_VAR,
};
use recap_utils::TempFileGuard;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Computes reports; both caches depend on this seam rather than on the
/// subprocess machinery directly
#[async_trait]
pub trait ReportGenerator: Send + Sync {
    /// The lock every generation runs under
    fn lock(&self) -> &GenerationLock;

    /// Generate the report for a recording on a live target and return its content
    ///
    /// Acquires the generation lock for the duration of the computation.
    async fn generate_target_report(
        &self,
        recording: &RecordingDescriptor,
        filter: &str,
    ) -> Result<String>;

    /// Generate the report for a recording file into `destination`
    ///
    /// The caller must already hold the generation lock; `permit` is the proof.
    async fn generate_file_report(
        &self,
        permit: &GenerationPermit,
        source: &Path,
        destination: &Path,
        filter: &str,
    ) -> Result<PathBuf>;
}

pub struct SubprocessReportGenerator {
    config: GeneratorConfig,
    lock: GenerationLock,
    runner: ProcessRunner,
}

/// Arguments of one worker invocation
struct Invocation<'a> {
    locator: &'a str,
    recording_name: &'a str,
    destination: &'a Path,
    filter: &'a str,
    credentials: Option<&'a Credentials>,
    /// What the report is about, for logs and errors
    label: String,
}

impl SubprocessReportGenerator {
    pub fn new(config: GeneratorConfig, lock: GenerationLock) -> Self {
        Self {
            config,
            lock,
            runner: ProcessRunner::new(),
        }
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Run the worker once; the caller holds the generation lock
    async fn run_worker(&self, invocation: Invocation<'_>) -> Result<()> {
        let descriptor = serde_json::to_vec(&self.config.transformers)?;
        let transformers_file = TempFileGuard::create_in(
            &self.config.temp_dir,
            "recap-transformers-",
            ".json",
            &descriptor,
        )?;

        let mut env = vec![(
            RECAP_TRANSFORMERS_FILE_VAR.to_string(),
            transformers_file.path().display().to_string(),
        )];
        if let Some(mb) = self.config.max_memory_mb {
            env.push((RECAP_WORKER_MAX_MEMORY_VAR.to_string(), mb.to_string()));
        }
        if let Some(credentials) = invocation.credentials {
            env.push((
                RECAP_TARGET_USERNAME_VAR.to_string(),
                credentials.username().to_string(),
            ));
            env.push((
                RECAP_TARGET_PASSWORD_VAR.to_string(),
                credentials.password().to_string(),
            ));
        }

        let mut args = self.config.worker_args.clone();
        args.extend([
            invocation.locator.to_string(),
            invocation.recording_name.to_string(),
            invocation.destination.display().to_string(),
            invocation.filter.to_string(),
        ]);

        let spec = ProcessSpec {
            program: self.config.worker_program.clone(),
            args,
            env,
            timeout: self.config.timeout,
            max_memory_mb: self.config.max_memory_mb,
        };

        let started = Instant::now();
        tracing::info!(recording = %invocation.label, filter = invocation.filter, "generating report");
        let outcome = self.runner.run(&spec).await?;
        let status = exit_status_for(outcome);

        if status.is_ok() {
            tracing::info!(
                recording = %invocation.label,
                elapsed = ?started.elapsed(),
                "report generated"
            );
            Ok(())
        } else {
            tracing::warn!(
                recording = %invocation.label,
                code = status.code(),
                elapsed = ?started.elapsed(),
                "report generation failed: {}",
                status.message()
            );
            Err(Error::generation(invocation.label, status))
        }
    }
}

#[async_trait]
impl ReportGenerator for SubprocessReportGenerator {
    fn lock(&self) -> &GenerationLock {
        &self.lock
    }

    async fn generate_target_report(
        &self,
        recording: &RecordingDescriptor,
        filter: &str,
    ) -> Result<String> {
        recording.validate()?;

        let permit = self.lock.acquire().await?;
        tracing::debug!(recording = %recording, "acquired generation lock");

        // Declared after the permit so it is removed before the lock is released
        let destination =
            TempFileGuard::reserve_in(&self.config.temp_dir, "recap-report-", ".html");

        self.run_worker(Invocation {
            locator: recording.connection.target_id(),
            recording_name: &recording.recording_name,
            destination: destination.path(),
            filter,
            credentials: recording.connection.credentials(),
            label: recording.to_string(),
        })
        .await?;

        let content = tokio::fs::read_to_string(destination.path())
            .await
            .map_err(|e| Error::file_system(destination.path(), "read generated report", e))?;

        tracing::debug!(held_for = ?permit.held_for(), "releasing generation lock");
        Ok(content)
    }

    async fn generate_file_report(
        &self,
        permit: &GenerationPermit,
        source: &Path,
        destination: &Path,
        filter: &str,
    ) -> Result<PathBuf> {
        if source.as_os_str().is_empty() {
            return Err(Error::invalid_argument("source", "cannot be empty"));
        }
        if destination.as_os_str().is_empty() {
            return Err(Error::invalid_argument("destination", "cannot be empty"));
        }
        if !permit.issued_by(&self.lock) {
            return Err(Error::configuration(
                "generation permit was not issued by this generator's lock",
            ));
        }

        let source = tokio::fs::canonicalize(source).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::recording_not_found(source.display().to_string(), "the recording archive")
            } else {
                Error::file_system(source, "resolve recording file", e)
            }
        })?;
        let connection = ConnectionDescriptor::from_archive_file(&source)?;

        if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::file_system(parent, "create report directory", e))?;
        }

        let label = source
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| source.display().to_string());

        self.run_worker(Invocation {
            locator: connection.target_id(),
            recording_name: NO_RECORDING_NAME,
            destination,
            filter,
            credentials: None,
            label,
        })
        .await?;

        Ok(destination.to_path_buf())
    }
}

/// Map how the worker ended onto the exit status table
///
/// A worker killed by `SIGKILL` or `SIGABRT` that the runner did not kill has
/// almost always hit its memory cap (kernel OOM killer, or an allocation
/// failure aborting the process).
pub fn exit_status_for(outcome: ProcessOutcome) -> ExitStatus {
    match outcome {
        ProcessOutcome::Exited(code) => ExitStatus::from_code(code),
        ProcessOutcome::TimedOut => ExitStatus::Terminated,
        ProcessOutcome::Signaled(signal) => signal_status(signal),
    }
}

#[cfg(unix)]
fn signal_status(signal: i32) -> ExitStatus {
    if signal == libc::SIGKILL || signal == libc::SIGABRT {
        ExitStatus::OutOfMemory
    } else {
        ExitStatus::Other
    }
}

#[cfg(not(unix))]
fn signal_status(_signal: i32) -> ExitStatus {
    ExitStatus::Other
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_map_through_the_table() {
        for status in ExitStatus::ALL {
            if status == ExitStatus::Terminated {
                continue;
            }
            assert_eq!(
                exit_status_for(ProcessOutcome::Exited(status.code())),
                status
            );
        }
        assert_eq!(
            exit_status_for(ProcessOutcome::Exited(42)),
            ExitStatus::Other
        );
    }

    #[test]
    fn test_timeout_maps_to_terminated() {
        assert_eq!(
            exit_status_for(ProcessOutcome::TimedOut),
            ExitStatus::Terminated
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_signals() {
        assert_eq!(
            exit_status_for(ProcessOutcome::Signaled(libc::SIGKILL)),
            ExitStatus::OutOfMemory
        );
        assert_eq!(
            exit_status_for(ProcessOutcome::Signaled(libc::SIGABRT)),
            ExitStatus::OutOfMemory
        );
        assert_eq!(
            exit_status_for(ProcessOutcome::Signaled(libc::SIGTERM)),
            ExitStatus::Other
        );
    }

    #[tokio::test]
    async fn test_foreign_permit_is_rejected() {
        let generator =
            SubprocessReportGenerator::new(GeneratorConfig::default(), GenerationLock::new());
        let foreign = GenerationLock::new();
        let permit = foreign.acquire().await.unwrap();
        let err = generator
            .generate_file_report(
                &permit,
                Path::new("/tmp/recording.jfr"),
                Path::new("/tmp/out.html"),
                "",
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
    }

    #[tokio::test]
    async fn test_blank_recording_is_rejected_without_locking() {
        let lock = GenerationLock::new();
        let generator = SubprocessReportGenerator::new(GeneratorConfig::default(), lock.clone());
        let recording = RecordingDescriptor::new(ConnectionDescriptor::new("target"), " ");
        let err = generator
            .generate_target_report(&recording, "")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { .. }));
        assert_eq!(lock.acquisitions(), 0);
    }
}

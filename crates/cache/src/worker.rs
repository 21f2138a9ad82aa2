//! Worker side of report generation
//!
//! The worker is a single-shot process started by [`SubprocessReportGenerator`]
//! with the positional arguments `(locator, recording-name | -, destination,
//! filter)`. It renders the report, writes it to `destination` and reports the
//! outcome through its exit code.
//!
//! [`SubprocessReportGenerator`]: crate::generator::SubprocessReportGenerator

use async_trait::async_trait;
use recap_core::{
    Credentials, Error, ExitStatus, ReportFilter, Result, NO_RECORDING_NAME,
    RECAP_TARGET_PASSWORD_VAR, RECAP_TARGET_USERNAME_VAR, RECAP_TRANSFORMERS_FILE_VAR,
    RECAP_WORKER_MAX_MEMORY_VAR,
};
use recap_utils::publish_report;
use std::path::PathBuf;

/// One report to render, as handed over by the parent process
#[derive(Debug, Clone)]
pub struct WorkerRequest {
    /// Target locator, or the `file://` URI of an archived recording
    pub locator: String,
    /// `None` when the locator already names the recording
    pub recording_name: Option<String>,
    pub destination: PathBuf,
    pub filter: ReportFilter,
    pub credentials: Option<Credentials>,
    /// Post-processing transformers, in application order
    pub transformers: Vec<String>,
    pub max_memory_mb: Option<u64>,
}

impl WorkerRequest {
    /// Parse the positional arguments and the environment handed to the worker
    pub fn from_args_and_env(
        args: &[String],
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let [locator, recording_name, destination, filter] = args else {
            return Err(Error::invalid_argument(
                "args",
                format!(
                    "expected <locator> <recording-name|-> <destination> <filter>, got {} arguments",
                    args.len()
                ),
            ));
        };
        if locator.trim().is_empty() {
            return Err(Error::invalid_argument("locator", "cannot be empty"));
        }
        if destination.trim().is_empty() {
            return Err(Error::invalid_argument("destination", "cannot be empty"));
        }

        let credentials = match (
            lookup(RECAP_TARGET_USERNAME_VAR),
            lookup(RECAP_TARGET_PASSWORD_VAR),
        ) {
            (Some(username), Some(password)) => Some(Credentials::new(username, password)),
            (None, None) => None,
            _ => {
                return Err(Error::invalid_argument(
                    RECAP_TARGET_USERNAME_VAR,
                    "username and password must be given together",
                ))
            }
        };

        let transformers = match lookup(RECAP_TRANSFORMERS_FILE_VAR) {
            Some(path) => {
                let raw = std::fs::read_to_string(&path)
                    .map_err(|e| Error::file_system(&path, "read transformers file", e))?;
                serde_json::from_str(&raw)?
            }
            None => Vec::new(),
        };

        let max_memory_mb = lookup(RECAP_WORKER_MAX_MEMORY_VAR)
            .map(|raw| {
                raw.parse::<u64>().map_err(|e| {
                    Error::invalid_argument(RECAP_WORKER_MAX_MEMORY_VAR, e.to_string())
                })
            })
            .transpose()?;

        Ok(Self {
            locator: locator.clone(),
            recording_name: (recording_name != NO_RECORDING_NAME).then(|| recording_name.clone()),
            destination: PathBuf::from(destination),
            filter: filter.clone(),
            credentials,
            transformers,
            max_memory_mb,
        })
    }
}

/// Why rendering failed, in the terms of the exit status table
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("cannot reach target: {0}")]
    TargetConnection(String),

    #[error("no such recording: {0}")]
    NoSuchRecording(String),

    #[error("unreadable recording: {0}")]
    Recording(String),

    #[error("I/O failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("out of memory while rendering")]
    OutOfMemory,

    #[error("{0}")]
    Other(String),
}

impl RenderError {
    pub fn exit_status(&self) -> ExitStatus {
        match self {
            RenderError::TargetConnection(_) => ExitStatus::TargetConnectionFailure,
            RenderError::NoSuchRecording(_) => ExitStatus::NoSuchRecording,
            RenderError::Recording(_) => ExitStatus::RecordingException,
            RenderError::Io(_) => ExitStatus::IoException,
            RenderError::OutOfMemory => ExitStatus::OutOfMemory,
            RenderError::Other(_) => ExitStatus::Other,
        }
    }
}

/// Turns a recording into report content
#[async_trait]
pub trait ReportRenderer: Send + Sync {
    async fn render(&self, request: &WorkerRequest) -> std::result::Result<String, RenderError>;
}

/// Render the report and write it to the request's destination
///
/// Never fails: every outcome is an [`ExitStatus`] for the process to exit with.
pub async fn run_worker(request: WorkerRequest, renderer: &dyn ReportRenderer) -> ExitStatus {
    let content = match renderer.render(&request).await {
        Ok(content) => content,
        Err(e) => {
            let status = e.exit_status();
            tracing::error!(locator = %request.locator, code = status.code(), "report worker failed: {e}");
            return status;
        }
    };

    let destination = request.destination.clone();
    let written =
        tokio::task::spawn_blocking(move || publish_report(&destination, &content)).await;
    match written {
        Ok(Ok(())) => {
            tracing::debug!(destination = %request.destination.display(), "report written");
            ExitStatus::Ok
        }
        Ok(Err(e)) => {
            tracing::error!("writing report failed: {e}");
            ExitStatus::IoException
        }
        Err(e) => {
            tracing::error!("report writer task failed: {e}");
            ExitStatus::IoException
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    /// Renders fixed content, or reports the recording missing when there is none
    struct Fixed(Option<&'static str>);

    #[async_trait]
    impl ReportRenderer for Fixed {
        async fn render(&self, request: &WorkerRequest) -> std::result::Result<String, RenderError> {
            match self.0 {
                Some(content) => Ok(content.to_string()),
                None => Err(RenderError::NoSuchRecording(
                    request.recording_name.clone().unwrap_or_default(),
                )),
            }
        }
    }

    #[test]
    fn test_parses_archived_request() {
        let dir = TempDir::new().unwrap();
        let transformers = dir.path().join("transformers.json");
        std::fs::write(&transformers, r#"["strip-scripts","inline-css"]"#).unwrap();
        let transformers = transformers.display().to_string();

        let request = WorkerRequest::from_args_and_env(
            &args(&["file:///archive/rec.jfr", "-", "/tmp/out.html", ""]),
            env(&[
                (RECAP_TRANSFORMERS_FILE_VAR, transformers.as_str()),
                (RECAP_WORKER_MAX_MEMORY_VAR, "256"),
            ]),
        )
        .unwrap();

        assert_eq!(request.recording_name, None);
        assert_eq!(request.destination, PathBuf::from("/tmp/out.html"));
        assert_eq!(request.transformers, vec!["strip-scripts", "inline-css"]);
        assert_eq!(request.max_memory_mb, Some(256));
        assert!(request.credentials.is_none());
    }

    #[test]
    fn test_parses_credentials() {
        let request = WorkerRequest::from_args_and_env(
            &args(&["service:jmx:rmi://app", "rec1", "/tmp/out.html", "heap"]),
            env(&[
                (RECAP_TARGET_USERNAME_VAR, "admin"),
                (RECAP_TARGET_PASSWORD_VAR, "secret"),
            ]),
        )
        .unwrap();

        assert_eq!(request.recording_name.as_deref(), Some("rec1"));
        assert_eq!(request.filter, "heap");
        let credentials = request.credentials.unwrap();
        assert_eq!(credentials.username(), "admin");
        assert_eq!(credentials.password(), "secret");
    }

    #[test]
    fn test_rejects_malformed_requests() {
        assert!(WorkerRequest::from_args_and_env(&args(&["a", "b"]), env(&[])).is_err());
        assert!(
            WorkerRequest::from_args_and_env(&args(&["", "-", "/tmp/out", ""]), env(&[])).is_err()
        );
        assert!(WorkerRequest::from_args_and_env(
            &args(&["t", "r", "/tmp/out", ""]),
            env(&[(RECAP_TARGET_USERNAME_VAR, "admin")])
        )
        .is_err());
    }

    #[test]
    fn test_render_errors_map_to_statuses() {
        assert_eq!(
            RenderError::TargetConnection("t".into()).exit_status(),
            ExitStatus::TargetConnectionFailure
        );
        assert_eq!(
            RenderError::NoSuchRecording("r".into()).exit_status(),
            ExitStatus::NoSuchRecording
        );
        assert_eq!(
            RenderError::Recording("r".into()).exit_status(),
            ExitStatus::RecordingException
        );
        assert_eq!(RenderError::OutOfMemory.exit_status(), ExitStatus::OutOfMemory);
        assert_eq!(RenderError::Other("x".into()).exit_status(), ExitStatus::Other);
    }

    fn request_to(destination: PathBuf) -> WorkerRequest {
        WorkerRequest {
            locator: "service:jmx:rmi://app".to_string(),
            recording_name: Some("rec1".to_string()),
            destination,
            filter: String::new(),
            credentials: None,
            transformers: Vec::new(),
            max_memory_mb: None,
        }
    }

    #[tokio::test]
    async fn test_run_worker_writes_report() {
        let dir = TempDir::new().unwrap();
        let destination = dir.path().join("out.html");

        let status = run_worker(request_to(destination.clone()), &Fixed(Some("<html>OK</html>"))).await;
        assert_eq!(status, ExitStatus::Ok);
        assert_eq!(std::fs::read_to_string(destination).unwrap(), "<html>OK</html>");
    }

    #[tokio::test]
    async fn test_run_worker_reports_render_failure() {
        let dir = TempDir::new().unwrap();
        let destination = dir.path().join("out.html");

        let status = run_worker(
            request_to(destination.clone()),
            &Fixed(None),
        )
        .await;
        assert_eq!(status, ExitStatus::NoSuchRecording);
        assert!(!destination.exists());
    }

    #[tokio::test]
    async fn test_unwritable_destination_is_an_io_failure() {
        let status = run_worker(request_to(PathBuf::from("out.html")), &Fixed(Some("report"))).await;
        assert_eq!(status, ExitStatus::IoException);
    }
}

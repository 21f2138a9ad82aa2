use crate::types::ExitStatus;
use std::path::PathBuf;
use std::sync::Arc;

/// Result type alias for recap operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for recap operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Rejected input; raised before any lock or file is touched
    #[error("invalid argument '{argument}': {message}")]
    InvalidArgument { argument: String, message: String },

    /// The report computation ran but exited with a non-OK status
    #[error(
        "report generation for '{recording}' failed: {message} (exit code {code})",
        message = .status.message(),
        code = .status.code()
    )]
    Generation {
        recording: String,
        status: ExitStatus,
    },

    /// The recording does not exist, so there is nothing to generate or cache
    #[error("recording '{recording}' not found in {location}")]
    RecordingNotFound { recording: String, location: String },

    /// Command execution errors
    #[error("{}", format_command_error(.command, .args, .message))]
    CommandExecution {
        command: String,
        args: Vec<String>,
        message: String,
    },

    /// Configuration errors
    #[error("configuration error: {message}")]
    Configuration { message: String },

    /// File system operations
    #[error("file system {operation} operation failed for '{path}': {source}")]
    FileSystem {
        path: PathBuf,
        operation: String,
        #[source]
        source: std::io::Error,
    },

    /// JSON serialization/deserialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: serde_json::Error,
    },

    /// A background task died before producing a result
    #[error("internal error: {message}")]
    Internal { message: String },

    /// One failure delivered to every caller waiting on the same computation
    #[error(transparent)]
    Shared(Arc<Error>),
}

fn format_command_error(command: &str, args: &[String], message: &str) -> String {
    if args.is_empty() {
        format!("command '{command}' failed: {message}")
    } else {
        format!("command '{command} {}' failed: {message}", args.join(" "))
    }
}

impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Error::FileSystem {
            path: PathBuf::new(),
            operation: "unknown".to_string(),
            source: error,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Error::Json {
            message: error.to_string(),
            source: error,
        }
    }
}

impl From<Arc<Error>> for Error {
    fn from(error: Arc<Error>) -> Self {
        match Arc::try_unwrap(error) {
            Ok(error) => error,
            Err(shared) => Error::Shared(shared),
        }
    }
}

// Helper methods for creating errors with context
impl Error {
    /// Create an invalid argument error
    #[must_use]
    pub fn invalid_argument(argument: impl Into<String>, message: impl Into<String>) -> Self {
        Error::InvalidArgument {
            argument: argument.into(),
            message: message.into(),
        }
    }

    /// Create a generation error for a non-OK exit status
    #[must_use]
    pub fn generation(recording: impl Into<String>, status: ExitStatus) -> Self {
        Error::Generation {
            recording: recording.into(),
            status,
        }
    }

    /// Create a recording not found error
    #[must_use]
    pub fn recording_not_found(recording: impl Into<String>, location: impl Into<String>) -> Self {
        Error::RecordingNotFound {
            recording: recording.into(),
            location: location.into(),
        }
    }

    /// Create a command execution error
    #[must_use]
    pub fn command_execution(
        command: impl Into<String>,
        args: Vec<String>,
        message: impl Into<String>,
    ) -> Self {
        Error::CommandExecution {
            command: command.into(),
            args,
            message: message.into(),
        }
    }

    /// Create a configuration error
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Error::Configuration {
            message: message.into(),
        }
    }

    /// Create an internal error
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Error::Internal {
            message: message.into(),
        }
    }

    /// Create a file system error with context
    #[must_use]
    pub fn file_system(
        path: impl Into<PathBuf>,
        operation: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        Error::FileSystem {
            path: path.into(),
            operation: operation.into(),
            source,
        }
    }

    /// The innermost error, looking through `Shared` wrappers
    pub fn root(&self) -> &Error {
        match self {
            Error::Shared(inner) => inner.root(),
            other => other,
        }
    }

    /// Exit status of a failed generation, if this is one
    pub fn exit_status(&self) -> Option<ExitStatus> {
        match self.root() {
            Error::Generation { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the failure means the source recording does not exist
    pub fn is_not_found(&self) -> bool {
        match self.root() {
            Error::RecordingNotFound { .. } => true,
            Error::Generation { status, .. } => *status == ExitStatus::NoSuchRecording,
            _ => false,
        }
    }

    /// Whether this is an expected, classified generation failure
    pub fn is_generation_failure(&self) -> bool {
        matches!(self.root(), Error::Generation { .. })
    }
}

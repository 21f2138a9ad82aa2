//! Constants used throughout the recap codebase

// Worker environment variable names
pub const RECAP_TARGET_USERNAME_VAR: &str = "RECAP_TARGET_USERNAME";
pub const RECAP_TARGET_PASSWORD_VAR: &str = "RECAP_TARGET_PASSWORD";
pub const RECAP_TRANSFORMERS_FILE_VAR: &str = "RECAP_TRANSFORMERS_FILE";
pub const RECAP_WORKER_MAX_MEMORY_VAR: &str = "RECAP_WORKER_MAX_MEMORY_MB";

// Configuration environment variable names
pub const RECAP_CONFIG_VAR: &str = "RECAP_CONFIG";
pub const RECAP_REPORT_TIMEOUT_VAR: &str = "RECAP_REPORT_TIMEOUT_SECS";
pub const RECAP_REPORT_TRANSFORMERS_VAR: &str = "RECAP_REPORT_TRANSFORMERS";
pub const RECAP_ACTIVE_TTL_VAR: &str = "RECAP_ACTIVE_TTL_SECS";
pub const RECAP_ACTIVE_REFRESH_VAR: &str = "RECAP_ACTIVE_REFRESH_SECS";
pub const RECAP_ACTIVE_MAX_BYTES_VAR: &str = "RECAP_ACTIVE_MAX_BYTES";
pub const RECAP_REPORT_DIR_VAR: &str = "RECAP_REPORT_DIR";
pub const RECAP_ARCHIVE_DIR_VAR: &str = "RECAP_ARCHIVE_DIR";

// Name of the hidden subcommand the generator re-invokes
pub const WORKER_SUBCOMMAND: &str = "worker";

// Placeholder passed as the recording-name argument when the locator already
// points at a recording file
pub const NO_RECORDING_NAME: &str = "-";

// Archived report file naming
pub const REPORT_FILE_SUFFIX: &str = ".report.html";

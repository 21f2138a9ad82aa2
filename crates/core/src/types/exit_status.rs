//! Exit codes of the out-of-process report computation

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};

/// Outcome of one report computation, encoded in the worker's exit code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExitStatus {
    Ok,
    TargetConnectionFailure,
    NoSuchRecording,
    RecordingException,
    IoException,
    OutOfMemory,
    Other,
    /// Exceeded its deadline and was killed by the runner
    Terminated,
}

impl ExitStatus {
    pub const ALL: [ExitStatus; 8] = [
        ExitStatus::Ok,
        ExitStatus::TargetConnectionFailure,
        ExitStatus::NoSuchRecording,
        ExitStatus::RecordingException,
        ExitStatus::IoException,
        ExitStatus::OutOfMemory,
        ExitStatus::Other,
        ExitStatus::Terminated,
    ];

    pub const fn code(self) -> i32 {
        match self {
            ExitStatus::Ok => 0,
            ExitStatus::TargetConnectionFailure => 1,
            ExitStatus::NoSuchRecording => 2,
            ExitStatus::RecordingException => 3,
            ExitStatus::IoException => 4,
            ExitStatus::OutOfMemory => 5,
            ExitStatus::Other => 6,
            ExitStatus::Terminated => -1,
        }
    }

    pub const fn message(self) -> &'static str {
        match self {
            ExitStatus::Ok => "report generated successfully",
            ExitStatus::TargetConnectionFailure => "connection to the target failed",
            ExitStatus::NoSuchRecording => "no such recording was found",
            ExitStatus::RecordingException => {
                "the recording could not be read or its data is corrupt"
            }
            ExitStatus::IoException => "an I/O error occurred while writing the report",
            ExitStatus::OutOfMemory => {
                "the report computation exceeded its memory limit and was terminated"
            }
            ExitStatus::Other => "an unexpected error occurred during report computation",
            ExitStatus::Terminated => "the report computation timed out and was terminated",
        }
    }

    /// Map a raw exit code; anything outside the table is `Other`
    pub fn from_code(code: i32) -> Self {
        Self::ALL
            .into_iter()
            .find(|status| status.code() == code)
            .unwrap_or(ExitStatus::Other)
    }

    pub const fn is_ok(self) -> bool {
        matches!(self, ExitStatus::Ok)
    }
}

impl Display for ExitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message(), self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_round_trip_through_the_table() {
        for status in ExitStatus::ALL {
            assert_eq!(ExitStatus::from_code(status.code()), status);
        }
    }

    #[test]
    fn unknown_codes_map_to_other() {
        assert_eq!(ExitStatus::from_code(7), ExitStatus::Other);
        assert_eq!(ExitStatus::from_code(137), ExitStatus::Other);
        assert_eq!(ExitStatus::from_code(-2), ExitStatus::Other);
    }

    #[test]
    fn only_ok_is_ok() {
        let ok: Vec<_> = ExitStatus::ALL.into_iter().filter(|s| s.is_ok()).collect();
        assert_eq!(ok, vec![ExitStatus::Ok]);
    }
}

//! Publishing report files so readers never observe a partial report

use crate::cleanup::TempFileGuard;
use recap_core::{Error, Result};
use std::fs;
use std::path::Path;

/// Staged copies start with a dot so report listings skip them
const STAGING_PREFIX: &str = ".";
const STAGING_SUFFIX: &str = ".partial";

/// Write `content` to `destination` in one step
///
/// The content is staged and synced beside the destination, then renamed over
/// it. A staged file left by a failure or an interrupt is removed by its guard.
pub fn publish_report(destination: &Path, content: &str) -> Result<()> {
    let dir = destination
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .ok_or_else(|| {
            Error::invalid_argument(
                destination.display().to_string(),
                "report path has no parent directory",
            )
        })?;
    fs::create_dir_all(dir).map_err(|e| Error::file_system(dir, "create report directory", e))?;

    TempFileGuard::create_in(dir, STAGING_PREFIX, STAGING_SUFFIX, content.as_bytes())?
        .persist(destination)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_publish_into_missing_directory() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("reports").join("rec1.report.html");

        publish_report(&path, "<html>OK</html>").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "<html>OK</html>");
    }

    #[test]
    fn test_publish_replaces_and_leaves_nothing_staged() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("rec1.report.html");
        fs::write(&path, "Report generation failed").unwrap();

        publish_report(&path, "<html>OK</html>").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "<html>OK</html>");
        assert_eq!(fs::read_dir(temp_dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_destination_that_is_a_directory_keeps_nothing_staged() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("rec1.report.html");
        fs::create_dir(&path).unwrap();
        fs::write(path.join("inside"), "x").unwrap();

        assert!(matches!(
            publish_report(&path, "<html>OK</html>"),
            Err(Error::FileSystem { .. })
        ));
        assert_eq!(fs::read_dir(temp_dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_bare_file_name_is_rejected() {
        let result = publish_report(Path::new("report.html"), "x");
        assert!(matches!(result, Err(Error::InvalidArgument { .. })));
    }
}

use std::env;
use std::path::{Path, PathBuf};

const APP_DIR: &str = "recap";

/// XDG Base Directory paths for recap
pub struct XdgPaths;

impl XdgPaths {
    /// Get XDG_CONFIG_HOME/recap or fallback
    pub fn config_dir() -> PathBuf {
        resolve("XDG_CONFIG_HOME", ".config", env_lookup, dirs::home_dir())
    }

    /// Get XDG_DATA_HOME/recap or fallback
    pub fn data_dir() -> PathBuf {
        resolve("XDG_DATA_HOME", ".local/share", env_lookup, dirs::home_dir())
    }

    /// Get XDG_CACHE_HOME/recap or fallback
    pub fn cache_dir() -> PathBuf {
        resolve("XDG_CACHE_HOME", ".cache", env_lookup, dirs::home_dir())
    }

    /// Default JSON configuration file
    pub fn config_file() -> PathBuf {
        Self::config_dir().join("config.json")
    }

    /// Default directory for generated archived-recording reports
    pub fn report_dir() -> PathBuf {
        Self::cache_dir().join("reports")
    }

    /// Default root of the recording archive
    pub fn archive_dir() -> PathBuf {
        Self::data_dir().join("archive")
    }
}

fn env_lookup(var: &str) -> Option<String> {
    env::var(var).ok().filter(|value| !value.is_empty())
}

fn resolve(
    var: &str,
    home_relative: &str,
    lookup: impl Fn(&str) -> Option<String>,
    home: Option<PathBuf>,
) -> PathBuf {
    lookup(var)
        .map(PathBuf::from)
        .unwrap_or_else(|| match home {
            Some(home) => home.join(home_relative),
            None => Path::new(home_relative).to_path_buf(),
        })
        .join(APP_DIR)
}

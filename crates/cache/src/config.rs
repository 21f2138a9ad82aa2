//! Report cache configuration with precedence and validation
//!
//! Precedence, lowest to highest: built-in defaults, the JSON config file
//! (`RECAP_CONFIG` or `$XDG_CONFIG_HOME/recap/config.json`), then `RECAP_*`
//! environment variables.

use recap_core::{
    Error, Result, RECAP_ACTIVE_MAX_BYTES_VAR, RECAP_ACTIVE_REFRESH_VAR, RECAP_ACTIVE_TTL_VAR,
    RECAP_ARCHIVE_DIR_VAR, RECAP_CONFIG_VAR, RECAP_REPORT_DIR_VAR, RECAP_REPORT_TIMEOUT_VAR,
    RECAP_REPORT_TRANSFORMERS_VAR, RECAP_WORKER_MAX_MEMORY_VAR, WORKER_SUBCOMMAND,
};
use recap_utils::XdgPaths;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_GENERATION_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_WORKER_MAX_MEMORY_MB: u64 = 512;
pub const DEFAULT_ACTIVE_TTL: Duration = Duration::from_secs(30 * 60);
pub const DEFAULT_ACTIVE_REFRESH_AFTER: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_ACTIVE_MAX_BYTES: u64 = 64 * 1024 * 1024;

/// How the report worker process is launched
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// Program to spawn; defaults to the running executable
    pub worker_program: PathBuf,
    /// Arguments placed before the positional worker arguments
    pub worker_args: Vec<String>,
    /// Wall-clock deadline for one generation
    pub timeout: Duration,
    /// Address-space cap for the worker, in megabytes
    pub max_memory_mb: Option<u64>,
    /// Ordered report post-processing transformer identifiers
    pub transformers: Vec<String>,
    /// Where temporary descriptor and report files are created
    pub temp_dir: PathBuf,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            worker_program: std::env::current_exe().unwrap_or_else(|_| PathBuf::from("recap")),
            worker_args: vec![WORKER_SUBCOMMAND.to_string()],
            timeout: DEFAULT_GENERATION_TIMEOUT,
            max_memory_mb: Some(DEFAULT_WORKER_MAX_MEMORY_MB),
            transformers: Vec::new(),
            temp_dir: std::env::temp_dir(),
        }
    }
}

/// In-memory cache for reports of recordings on live targets
#[derive(Debug, Clone)]
pub struct ActiveCacheConfig {
    pub ttl: Duration,
    pub refresh_after: Duration,
    /// Upper bound on cached report text, in bytes
    pub max_bytes: u64,
}

impl Default for ActiveCacheConfig {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_ACTIVE_TTL,
            refresh_after: DEFAULT_ACTIVE_REFRESH_AFTER,
            max_bytes: DEFAULT_ACTIVE_MAX_BYTES,
        }
    }
}

/// On-disk cache for reports of archived recordings
#[derive(Debug, Clone)]
pub struct ArchivedCacheConfig {
    pub report_dir: PathBuf,
    pub archive_dir: PathBuf,
}

impl Default for ArchivedCacheConfig {
    fn default() -> Self {
        Self {
            report_dir: XdgPaths::report_dir(),
            archive_dir: XdgPaths::archive_dir(),
        }
    }
}

/// Complete configuration for both report caches and their generator
#[derive(Debug, Clone, Default)]
pub struct ReportsConfig {
    pub generator: GeneratorConfig,
    pub active: ActiveCacheConfig,
    pub archived: ArchivedCacheConfig,
    /// Configuration source for debugging
    pub source: ConfigSource,
}

impl ReportsConfig {
    pub fn validate(&self) -> Result<()> {
        if self.generator.timeout.is_zero() {
            return Err(Error::configuration("generation timeout must be non-zero"));
        }
        if self.active.ttl.is_zero() {
            return Err(Error::configuration("active report TTL must be non-zero"));
        }
        if self.active.refresh_after >= self.active.ttl {
            return Err(Error::configuration(format!(
                "active report refresh interval ({:?}) must be shorter than its TTL ({:?})",
                self.active.refresh_after, self.active.ttl
            )));
        }
        if self.generator.max_memory_mb == Some(0) {
            return Err(Error::configuration("worker memory cap must be non-zero"));
        }
        Ok(())
    }
}

/// Source of configuration for debugging and precedence tracking
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Default configuration
    #[default]
    Default,
    /// Configuration file
    ConfigFile(PathBuf),
    /// Environment variable
    EnvironmentVariable(String),
}

/// Builder for creating report configurations
#[derive(Debug, Default)]
pub struct ReportsConfigBuilder {
    config: ReportsConfig,
}

impl ReportsConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_worker_command(mut self, program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        self.config.generator.worker_program = program.into();
        self.config.generator.worker_args = args;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.config.generator.timeout = timeout;
        self
    }

    pub fn with_max_memory_mb(mut self, max_memory_mb: Option<u64>) -> Self {
        self.config.generator.max_memory_mb = max_memory_mb;
        self
    }

    pub fn with_transformers(mut self, transformers: Vec<String>) -> Self {
        self.config.generator.transformers = transformers;
        self
    }

    pub fn with_temp_dir(mut self, temp_dir: impl Into<PathBuf>) -> Self {
        self.config.generator.temp_dir = temp_dir.into();
        self
    }

    pub fn with_active_ttl(mut self, ttl: Duration) -> Self {
        self.config.active.ttl = ttl;
        self
    }

    pub fn with_active_refresh_after(mut self, refresh_after: Duration) -> Self {
        self.config.active.refresh_after = refresh_after;
        self
    }

    pub fn with_active_max_bytes(mut self, max_bytes: u64) -> Self {
        self.config.active.max_bytes = max_bytes;
        self
    }

    pub fn with_report_dir(mut self, report_dir: impl Into<PathBuf>) -> Self {
        self.config.archived.report_dir = report_dir.into();
        self
    }

    pub fn with_archive_dir(mut self, archive_dir: impl Into<PathBuf>) -> Self {
        self.config.archived.archive_dir = archive_dir.into();
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> Result<ReportsConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Partial configuration as read from the config file or the environment
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ConfigOverrides {
    timeout_secs: Option<u64>,
    worker_max_memory_mb: Option<u64>,
    transformers: Option<Vec<String>>,
    active_ttl_secs: Option<u64>,
    active_refresh_secs: Option<u64>,
    active_max_bytes: Option<u64>,
    report_dir: Option<PathBuf>,
    archive_dir: Option<PathBuf>,
}

impl ConfigOverrides {
    fn is_empty(&self) -> bool {
        *self == ConfigOverrides::default()
    }

    fn apply(self, config: &mut ReportsConfig) {
        if let Some(secs) = self.timeout_secs {
            config.generator.timeout = Duration::from_secs(secs);
        }
        if let Some(mb) = self.worker_max_memory_mb {
            config.generator.max_memory_mb = Some(mb);
        }
        if let Some(transformers) = self.transformers {
            config.generator.transformers = transformers;
        }
        if let Some(secs) = self.active_ttl_secs {
            config.active.ttl = Duration::from_secs(secs);
        }
        if let Some(secs) = self.active_refresh_secs {
            config.active.refresh_after = Duration::from_secs(secs);
        }
        if let Some(bytes) = self.active_max_bytes {
            config.active.max_bytes = bytes;
        }
        if let Some(dir) = self.report_dir {
            config.archived.report_dir = dir;
        }
        if let Some(dir) = self.archive_dir {
            config.archived.archive_dir = dir;
        }
    }
}

/// Configuration loader that handles precedence
pub struct ReportsConfigLoader;

impl ReportsConfigLoader {
    /// Load configuration from the default file location and the process environment
    pub fn load() -> Result<ReportsConfig> {
        let lookup = |var: &str| std::env::var(var).ok();
        let config_path = lookup(RECAP_CONFIG_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(XdgPaths::config_file);
        Self::load_from(&config_path, lookup)
    }

    /// Load configuration from an explicit file and variable lookup
    pub fn load_from(
        config_path: &Path,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<ReportsConfig> {
        let mut config = ReportsConfig::default();

        if let Some(file_overrides) = Self::load_from_config_file(config_path)? {
            file_overrides.apply(&mut config);
            config.source = ConfigSource::ConfigFile(config_path.to_path_buf());
        }

        let env_overrides = Self::load_from_env(lookup)?;
        if !env_overrides.is_empty() {
            env_overrides.apply(&mut config);
            config.source = ConfigSource::EnvironmentVariable("RECAP_*".to_string());
        }

        config.validate()?;
        tracing::debug!(source = ?config.source, "loaded report configuration");
        Ok(config)
    }

    fn load_from_config_file(config_path: &Path) -> Result<Option<ConfigOverrides>> {
        if !config_path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(config_path)
            .map_err(|e| Error::file_system(config_path, "read config file", e))?;

        let overrides = serde_json::from_str(&content).map_err(|e| Error::Json {
            message: format!("invalid config file '{}'", config_path.display()),
            source: e,
        })?;

        Ok(Some(overrides))
    }

    fn load_from_env(lookup: impl Fn(&str) -> Option<String>) -> Result<ConfigOverrides> {
        let number = |var: &str| -> Result<Option<u64>> {
            lookup(var)
                .map(|raw| {
                    raw.trim().parse::<u64>().map_err(|e| {
                        Error::configuration(format!("{var} must be an unsigned integer: {e}"))
                    })
                })
                .transpose()
        };

        Ok(ConfigOverrides {
            timeout_secs: number(RECAP_REPORT_TIMEOUT_VAR)?,
            worker_max_memory_mb: number(RECAP_WORKER_MAX_MEMORY_VAR)?,
            transformers: lookup(RECAP_REPORT_TRANSFORMERS_VAR).map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|id| !id.is_empty())
                    .map(str::to_string)
                    .collect()
            }),
            active_ttl_secs: number(RECAP_ACTIVE_TTL_VAR)?,
            active_refresh_secs: number(RECAP_ACTIVE_REFRESH_VAR)?,
            active_max_bytes: number(RECAP_ACTIVE_MAX_BYTES_VAR)?,
            report_dir: lookup(RECAP_REPORT_DIR_VAR).map(PathBuf::from),
            archive_dir: lookup(RECAP_ARCHIVE_DIR_VAR).map(PathBuf::from),
        })
    }
}

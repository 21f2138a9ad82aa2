//! Shared fixtures: a scratch directory and `sh -c` scripts standing in for
//! the report worker

#![allow(dead_code)]

use recap_cache::GeneratorConfig;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;

pub struct Scratch {
    pub dir: TempDir,
}

impl Scratch {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        for sub in ["tmp", "reports", "archive"] {
            std::fs::create_dir_all(dir.path().join(sub)).unwrap();
        }
        Self { dir }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn temp_dir(&self) -> PathBuf {
        self.path().join("tmp")
    }

    pub fn report_dir(&self) -> PathBuf {
        self.path().join("reports")
    }

    pub fn archive_dir(&self) -> PathBuf {
        self.path().join("archive")
    }

    /// File the worker script appends one line to per invocation
    pub fn counter(&self) -> PathBuf {
        self.path().join("invocations")
    }

    pub fn invocations(&self) -> usize {
        std::fs::read_to_string(self.counter())
            .map(|s| s.lines().count())
            .unwrap_or(0)
    }

    /// Files left in the generator's temp directory
    pub fn leftover_temp_files(&self) -> Vec<PathBuf> {
        std::fs::read_dir(self.temp_dir())
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .collect()
    }

    pub fn archive_recording(&self, scope: &str, name: &str) -> PathBuf {
        let dir = self.archive_dir().join(scope);
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        std::fs::write(&path, b"recording bytes").unwrap();
        path
    }

    /// Worker running `body` with `$1..$4` bound to the positional arguments,
    /// after recording the invocation
    pub fn worker(&self, body: &str) -> GeneratorConfig {
        let script = format!("echo run >> '{}'\n{body}", self.counter().display());
        GeneratorConfig {
            worker_program: PathBuf::from("sh"),
            worker_args: vec!["-c".to_string(), script, "recap-worker".to_string()],
            timeout: Duration::from_secs(10),
            max_memory_mb: None,
            transformers: vec!["strip-scripts".to_string()],
            temp_dir: self.temp_dir(),
        }
    }
}

pub const WRITE_OK: &str = r#"printf '<html>OK</html>' > "$3""#;

//! Spawning the report worker with a deadline

use recap_core::{Error, Result};
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio::time::timeout;
use zeroize::Zeroize;

/// Everything needed to launch one worker process
#[derive(Clone)]
pub struct ProcessSpec {
    pub program: PathBuf,
    pub args: Vec<String>,
    /// Extra variables on top of the inherited environment
    pub env: Vec<(String, String)>,
    pub timeout: Duration,
    /// Address-space cap in megabytes (Unix only)
    pub max_memory_mb: Option<u64>,
}

impl std::fmt::Debug for ProcessSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Values may carry target credentials
        let env_keys: Vec<&str> = self.env.iter().map(|(k, _)| k.as_str()).collect();
        f.debug_struct("ProcessSpec")
            .field("program", &self.program)
            .field("args", &self.args)
            .field("env", &env_keys)
            .field("timeout", &self.timeout)
            .field("max_memory_mb", &self.max_memory_mb)
            .finish()
    }
}

impl Drop for ProcessSpec {
    fn drop(&mut self) {
        for (_, value) in &mut self.env {
            value.zeroize();
        }
    }
}

/// How a worker process ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    Exited(i32),
    /// Killed by a signal the runner did not send
    Signaled(i32),
    /// Missed its deadline and was killed by the runner
    TimedOut,
}

#[derive(Debug, Clone, Default)]
pub struct ProcessRunner;

impl ProcessRunner {
    pub fn new() -> Self {
        Self
    }

    /// Run the process to completion or until its deadline passes
    ///
    /// Only failing to spawn or wait is an error; every exit, including a
    /// timeout, is reported as a [`ProcessOutcome`].
    pub async fn run(&self, spec: &ProcessSpec) -> Result<ProcessOutcome> {
        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .envs(spec.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        configure_platform_specific(&mut cmd, spec.max_memory_mb);

        let mut child = cmd.spawn().map_err(|e| {
            Error::command_execution(
                spec.program.display().to_string(),
                spec.args.clone(),
                format!("failed to spawn report worker: {e}"),
            )
        })?;
        let pid = child.id();
        tracing::debug!(?pid, program = %spec.program.display(), "spawned report worker");

        match timeout(spec.timeout, child.wait()).await {
            Ok(Ok(status)) => Ok(outcome_from_status(status)),
            Ok(Err(e)) => {
                terminate(&mut child, pid).await;
                Err(Error::command_execution(
                    spec.program.display().to_string(),
                    spec.args.clone(),
                    format!("failed to wait for report worker: {e}"),
                ))
            }
            Err(_) => {
                tracing::warn!(?pid, timeout = ?spec.timeout, "report worker timed out; killing it");
                terminate(&mut child, pid).await;
                Ok(ProcessOutcome::TimedOut)
            }
        }
    }
}

fn outcome_from_status(status: std::process::ExitStatus) -> ProcessOutcome {
    if let Some(code) = status.code() {
        return ProcessOutcome::Exited(code);
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return ProcessOutcome::Signaled(signal);
        }
    }

    ProcessOutcome::Signaled(0)
}

/// Kill the worker's whole process group, then reap the worker itself
async fn terminate(child: &mut Child, pid: Option<u32>) {
    #[cfg(unix)]
    {
        if let Some(pgid) = pid.and_then(|pid| libc::pid_t::try_from(pid).ok()) {
            // The worker leads its own group, so this also reaches its descendants
            unsafe {
                libc::killpg(pgid, libc::SIGKILL);
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = pid;
    }

    if let Err(e) = child.kill().await {
        tracing::debug!("report worker already gone: {e}");
    }
}

fn configure_platform_specific(cmd: &mut Command, max_memory_mb: Option<u64>) {
    #[cfg(unix)]
    {
        cmd.process_group(0);

        if let Some(mb) = max_memory_mb {
            let bytes = mb.saturating_mul(1024 * 1024) as libc::rlim_t;
            // Runs in the forked child before exec; only async-signal-safe calls
            unsafe {
                cmd.pre_exec(move || {
                    let limit = libc::rlimit {
                        rlim_cur: bytes,
                        rlim_max: bytes,
                    };
                    if libc::setrlimit(libc::RLIMIT_AS, &limit) != 0 {
                        return Err(std::io::Error::last_os_error());
                    }
                    Ok(())
                });
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = (cmd, max_memory_mb);
    }
}

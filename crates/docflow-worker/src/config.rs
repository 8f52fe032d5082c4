//! Worker configuration.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use docflow_tools::WorkerKind;

use crate::error::{WorkerError, WorkerResult};

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Tool set this process serves
    pub kind: WorkerKind,
    /// Root directory for per-job staging directories
    pub work_dir: PathBuf,
    /// Maximum jobs in flight; 1 keeps the loop strictly serial
    pub max_concurrent_jobs: usize,
    /// Kill external tools running longer than this (no limit when unset)
    pub tool_timeout: Option<Duration>,
    /// Grace period for in-flight jobs on shutdown
    pub shutdown_timeout: Duration,
    /// Prometheus listener address (no exporter when unset)
    pub metrics_addr: Option<SocketAddr>,
}

impl WorkerConfig {
    /// Config with defaults for the given kind.
    pub fn new(kind: WorkerKind) -> Self {
        Self {
            kind,
            work_dir: PathBuf::from("/tmp/docflow"),
            max_concurrent_jobs: 1,
            tool_timeout: None,
            shutdown_timeout: Duration::from_secs(60),
            metrics_addr: None,
        }
    }

    /// Create config from environment variables.
    pub fn from_env() -> WorkerResult<Self> {
        let kind = std::env::var("WORKER_KIND")
            .map_err(|_| WorkerError::config("WORKER_KIND not set"))?
            .parse::<WorkerKind>()
            .map_err(|e| WorkerError::config(e.to_string()))?;

        let metrics_addr = match std::env::var("METRICS_ADDR") {
            Ok(raw) if !raw.trim().is_empty() => Some(raw.trim().parse().map_err(|_| {
                WorkerError::config(format!("METRICS_ADDR '{}' is not a socket address", raw))
            })?),
            _ => None,
        };

        Ok(Self {
            kind,
            work_dir: std::env::var("WORKER_WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("/tmp/docflow")),
            max_concurrent_jobs: std::env::var("WORKER_MAX_JOBS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(1),
            tool_timeout: std::env::var("WORKER_TOOL_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
            shutdown_timeout: Duration::from_secs(
                std::env::var("WORKER_SHUTDOWN_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(60),
            ),
            metrics_addr,
        })
    }
}

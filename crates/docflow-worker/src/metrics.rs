//! Worker metrics.
//!
//! Recorded through the `metrics` facade; nothing is exported unless a
//! recorder is installed with [`install_exporter`].

use std::net::SocketAddr;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::error::{WorkerError, WorkerResult};

/// Metric name constants for consistency.
pub mod names {
    /// Messages received from the queue.
    pub const MESSAGES_RECEIVED_TOTAL: &str = "docflow_messages_received_total";

    /// Malformed messages deleted without processing.
    pub const MESSAGES_DROPPED_TOTAL: &str = "docflow_messages_dropped_total";

    /// Jobs finished with status `completed`, by tool.
    pub const JOBS_COMPLETED_TOTAL: &str = "docflow_jobs_completed_total";

    /// Jobs finished with status `error`, by tool and stage.
    pub const JOBS_FAILED_TOTAL: &str = "docflow_jobs_failed_total";

    /// Wall time of a whole job, by tool.
    pub const JOB_DURATION_SECONDS: &str = "docflow_job_duration_seconds";

    /// Wall time of the transformation step, by tool.
    pub const TOOL_DURATION_SECONDS: &str = "docflow_tool_duration_seconds";
}

/// Label used for tool names that are not registered, so arbitrary
/// upstream strings do not become label values.
pub const UNKNOWN_TOOL: &str = "unknown";

pub fn record_message_received() {
    counter!(names::MESSAGES_RECEIVED_TOTAL).increment(1);
}

pub fn record_message_dropped() {
    counter!(names::MESSAGES_DROPPED_TOTAL).increment(1);
}

pub fn record_job_completed(tool: &str, duration_secs: f64) {
    counter!(names::JOBS_COMPLETED_TOTAL, "tool" => tool.to_string()).increment(1);
    histogram!(names::JOB_DURATION_SECONDS, "tool" => tool.to_string()).record(duration_secs);
}

pub fn record_job_failed(tool: &str, stage: &str, duration_secs: f64) {
    counter!(
        names::JOBS_FAILED_TOTAL,
        "tool" => tool.to_string(),
        "stage" => stage.to_string()
    )
    .increment(1);
    histogram!(names::JOB_DURATION_SECONDS, "tool" => tool.to_string()).record(duration_secs);
}

pub fn record_tool_duration(tool: &str, duration_secs: f64) {
    histogram!(names::TOOL_DURATION_SECONDS, "tool" => tool.to_string()).record(duration_secs);
}

/// Install the Prometheus recorder with an HTTP listener on `addr`.
///
/// Must be called from within a Tokio runtime.
pub fn install_exporter(addr: SocketAddr) -> WorkerResult<()> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| WorkerError::config(format!("metrics exporter on {}: {}", addr, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_names() {
        assert!(names::JOBS_COMPLETED_TOTAL.starts_with("docflow_"));
        assert!(names::JOBS_FAILED_TOTAL.ends_with("_total"));
        assert!(names::TOOL_DURATION_SECONDS.ends_with("_seconds"));
    }

    #[test]
    fn test_recording_without_recorder_is_noop() {
        record_message_received();
        record_job_failed(UNKNOWN_TOOL, "dispatch", 0.01);
    }
}

//! Structured job logging utilities.
//!
//! Every event carries the job id and tool name so one job can be followed
//! through the logs of a busy worker.

use docflow_models::JobId;
use tracing::{error, info, warn, Span};

/// Job logger for structured logging with consistent formatting.
#[derive(Debug, Clone)]
pub struct JobLogger {
    job_id: String,
    tool: String,
}

impl JobLogger {
    pub fn new(job_id: &JobId, tool: &str) -> Self {
        Self {
            job_id: job_id.to_string(),
            tool: tool.to_string(),
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(job_id = %self.job_id, tool = %self.tool, "Job started: {}", message);
    }

    pub fn log_progress(&self, message: &str) {
        info!(job_id = %self.job_id, tool = %self.tool, "Job progress: {}", message);
    }

    pub fn log_warning(&self, message: &str) {
        warn!(job_id = %self.job_id, tool = %self.tool, "Job warning: {}", message);
    }

    pub fn log_error(&self, message: &str) {
        error!(job_id = %self.job_id, tool = %self.tool, "Job error: {}", message);
    }

    pub fn log_completion(&self, message: &str) {
        info!(job_id = %self.job_id, tool = %self.tool, "Job completed: {}", message);
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn tool(&self) -> &str {
        &self.tool
    }

    /// Span wrapping the whole processing of this job.
    pub fn create_span(&self) -> Span {
        tracing::info_span!("job", job_id = %self.job_id, tool = %self.tool)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_logger_creation() {
        let logger = JobLogger::new(&JobId::from_string("j-42"), "merge");

        assert_eq!(logger.job_id(), "j-42");
        assert_eq!(logger.tool(), "merge");
    }
}

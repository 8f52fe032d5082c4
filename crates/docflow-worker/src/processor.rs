//! Job processor.
//!
//! Turns one decoded job into a terminal status. The order of operations:
//!
//! 1. status `processing`
//! 2. tool lookup and file-count check (before any download)
//! 3. download every input into a fresh staging directory
//! 4. run the tool
//! 5. upload every output, in order
//! 6. result record, then status `completed`
//!
//! Any failure, including a result record that could not be written, writes
//! a reason and status `error` instead. The staging directory is removed on
//! every path. Nothing is retried.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use docflow_models::{Job, JobId, JobResult, JobStatus};
use docflow_queue::StatusStore;
use docflow_storage::ArtifactStore;
use docflow_tools::{Capability, CommandRunner, ToolContext, ToolError, ToolRegistry};
use tracing::Instrument;

use crate::error::{WorkerError, WorkerResult};
use crate::logging::JobLogger;
use crate::metrics;
use crate::staging::StagingArea;

/// How a job ended.
#[derive(Debug)]
pub enum JobOutcome {
    Completed(JobResult),
    Failed(WorkerError),
}

impl JobOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, JobOutcome::Completed(_))
    }

    pub fn status(&self) -> JobStatus {
        match self {
            JobOutcome::Completed(_) => JobStatus::Completed,
            JobOutcome::Failed(_) => JobStatus::Error,
        }
    }
}

/// Runs jobs against injected storage, status and tool collaborators.
pub struct JobProcessor {
    store: Arc<dyn ArtifactStore>,
    status: Arc<dyn StatusStore>,
    registry: Arc<ToolRegistry>,
    runner: CommandRunner,
    work_dir: PathBuf,
}

impl JobProcessor {
    pub fn new(
        store: Arc<dyn ArtifactStore>,
        status: Arc<dyn StatusStore>,
        registry: Arc<ToolRegistry>,
        work_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            store,
            status,
            registry,
            runner: CommandRunner::new(),
            work_dir: work_dir.into(),
        }
    }

    /// Runner handed to every tool (carries the optional tool timeout).
    pub fn with_runner(mut self, runner: CommandRunner) -> Self {
        self.runner = runner;
        self
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Process one job to a terminal status.
    pub async fn process(&self, job: &Job) -> JobOutcome {
        let logger = JobLogger::new(&job.id, &job.tool);
        let span = logger.create_span();
        self.process_logged(job, &logger).instrument(span).await
    }

    async fn process_logged(&self, job: &Job, logger: &JobLogger) -> JobOutcome {
        let started = Instant::now();
        logger.log_start(&format!("{} file(s), options {}", job.files.len(), job.options));

        self.write_status(&job.id, logger, JobStatus::Processing).await;
        if let Err(e) = self.status.clear_error(&job.id).await {
            logger.log_warning(&format!("Failed to clear previous failure reason: {}", e));
        }

        let tool_label = self.tool_label(&job.tool);

        // A job is only done once its result record has landed.
        let outcome = match self.run(job, logger).await {
            Ok(result) => match self.status.save_result(&job.id, &result).await {
                Ok(()) => Ok(result),
                Err(e) => Err(WorkerError::Record(e)),
            },
            Err(e) => Err(e),
        };

        match outcome {
            Ok(result) => {
                self.write_status(&job.id, logger, JobStatus::Completed).await;

                metrics::record_job_completed(tool_label, started.elapsed().as_secs_f64());
                logger.log_completion(&format!(
                    "{} output(s) in {:.2}s",
                    result.len(),
                    started.elapsed().as_secs_f64()
                ));
                JobOutcome::Completed(result)
            }
            Err(e) => {
                self.record_failure(&job.id, logger, &e).await;
                metrics::record_job_failed(tool_label, e.stage(), started.elapsed().as_secs_f64());
                JobOutcome::Failed(e)
            }
        }
    }

    /// Mark a job that will never finish as failed.
    ///
    /// Used for jobs still running when the worker stops.
    pub async fn abandon(&self, job_id: &JobId, tool: &str) {
        let logger = JobLogger::new(job_id, tool);
        let err = WorkerError::Interrupted;
        self.record_failure(job_id, &logger, &err).await;
        metrics::record_job_failed(self.tool_label(tool), err.stage(), 0.0);
    }

    fn tool_label<'a>(&self, tool: &'a str) -> &'a str {
        if self.registry.get(tool).is_some() {
            tool
        } else {
            metrics::UNKNOWN_TOOL
        }
    }

    async fn record_failure(&self, job_id: &JobId, logger: &JobLogger, err: &WorkerError) {
        logger.log_error(&format!("[{}] {}", err.stage(), err));
        if let Err(write_err) = self.status.set_error(job_id, &err.to_string()).await {
            logger.log_warning(&format!("Failed to record failure reason: {}", write_err));
        }
        self.write_status(job_id, logger, JobStatus::Error).await;
    }

    /// Status writes never change the outcome of a job.
    async fn write_status(&self, job_id: &JobId, logger: &JobLogger, status: JobStatus) {
        if let Err(e) = self.status.set_status(job_id, status).await {
            logger.log_warning(&format!("Failed to set status {}: {}", status, e));
        }
    }

    async fn run(&self, job: &Job, logger: &JobLogger) -> WorkerResult<JobResult> {
        let capability = self
            .registry
            .resolve(&job.tool)
            .map_err(WorkerError::Dispatch)?;
        capability
            .check_arity(job.files.len())
            .map_err(WorkerError::Dispatch)?;

        let staging = StagingArea::create(&self.work_dir, &job.id)
            .await
            .map_err(WorkerError::Staging)?;

        let result = self.run_staged(job, capability.as_ref(), &staging, logger).await;

        if let Err(e) = staging.cleanup().await {
            logger.log_warning(&format!("Failed to remove staging dir: {}", e));
        }
        result
    }

    async fn run_staged(
        &self,
        job: &Job,
        capability: &dyn Capability,
        staging: &StagingArea,
        logger: &JobLogger,
    ) -> WorkerResult<JobResult> {
        let mut inputs = Vec::with_capacity(job.files.len());
        for (index, reference) in job.files.iter().enumerate() {
            let dest = staging.input_path(index, reference);
            let bytes = self
                .store
                .download(reference, &dest)
                .await
                .map_err(|e| WorkerError::download(reference.as_str(), e))?;
            logger.log_progress(&format!("Downloaded {} ({} bytes)", reference, bytes));
            inputs.push(dest);
        }

        let ctx = ToolContext::new(staging.dir(), self.runner.clone());
        let tool_started = Instant::now();
        let outputs = capability.run(&inputs, &job.options, &ctx).await;
        metrics::record_tool_duration(capability.name(), tool_started.elapsed().as_secs_f64());
        let outputs = outputs.map_err(WorkerError::Transformation)?;

        verify_outputs(capability.name(), &outputs).await?;

        let mut references = Vec::with_capacity(outputs.len());
        for output in &outputs {
            let file_name = output
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .ok_or_else(|| {
                    WorkerError::Transformation(ToolError::NoOutput(capability.name().to_string()))
                })?;
            let key = self.store.output_key(&job.id, &file_name);
            let reference = self
                .store
                .upload(output, &key)
                .await
                .map_err(|e| WorkerError::upload(file_name.as_str(), e))?;
            logger.log_progress(&format!("Uploaded {}", reference));
            references.push(reference);
        }

        Ok(JobResult::new(references))
    }
}

/// An empty list, an empty path or a missing file all mean "no output".
///
/// Outputs are published under their file name, so two outputs sharing a
/// name would overwrite each other and are rejected.
async fn verify_outputs(tool: &str, outputs: &[PathBuf]) -> WorkerResult<()> {
    let no_output = || WorkerError::Transformation(ToolError::NoOutput(tool.to_string()));
    if outputs.is_empty() {
        return Err(no_output());
    }
    let mut names = HashSet::with_capacity(outputs.len());
    for output in outputs {
        let name = output.file_name().ok_or_else(no_output)?;
        match tokio::fs::metadata(output).await {
            Ok(meta) if meta.is_file() => {}
            _ => return Err(no_output()),
        }
        if !names.insert(name) {
            return Err(WorkerError::Transformation(ToolError::unexpected_output(
                tool,
                format!("duplicate output name {}", name.to_string_lossy()),
            )));
        }
    }
    Ok(())
}

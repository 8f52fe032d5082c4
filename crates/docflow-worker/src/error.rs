//! Worker error types.

use docflow_models::JobDecodeError;
use docflow_queue::{QueueError, StatusError};
use docflow_storage::StorageError;
use docflow_tools::ToolError;
use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

/// Per-job failures map to one variant each; the rest are process-level and
/// only occur at startup.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Malformed message: {0}")]
    Decode(#[from] JobDecodeError),

    #[error("Download of {reference} failed: {source}")]
    Download {
        reference: String,
        #[source]
        source: StorageError,
    },

    #[error("Staging failed: {0}")]
    Staging(#[source] std::io::Error),

    #[error("{0}")]
    Dispatch(#[source] ToolError),

    #[error("Transformation failed: {0}")]
    Transformation(#[source] ToolError),

    #[error("Upload of {file} failed: {source}")]
    Upload {
        file: String,
        #[source]
        source: StorageError,
    },

    #[error("Saving result failed: {0}")]
    Record(#[source] StatusError),

    #[error("Interrupted by worker shutdown")]
    Interrupted,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("Status store error: {0}")]
    Status(#[from] StatusError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),
}

impl WorkerError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn download(reference: impl Into<String>, source: StorageError) -> Self {
        Self::Download {
            reference: reference.into(),
            source,
        }
    }

    pub fn upload(file: impl Into<String>, source: StorageError) -> Self {
        Self::Upload {
            file: file.into(),
            source,
        }
    }

    /// Processing stage the error belongs to, used as a metrics label.
    pub fn stage(&self) -> &'static str {
        match self {
            WorkerError::Decode(_) => "decode",
            WorkerError::Download { .. } | WorkerError::Staging(_) => "download",
            WorkerError::Dispatch(_) => "dispatch",
            WorkerError::Transformation(_) => "transform",
            WorkerError::Upload { .. } => "upload",
            WorkerError::Record(_) => "result",
            WorkerError::Interrupted => "shutdown",
            WorkerError::Config(_)
            | WorkerError::Queue(_)
            | WorkerError::Status(_)
            | WorkerError::Storage(_)
            | WorkerError::Tool(_) => "startup",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_labels() {
        let decode = WorkerError::from(JobDecodeError::EmptyId);
        assert_eq!(decode.stage(), "decode");

        let download = WorkerError::download("s3://b/k", StorageError::not_found("s3://b/k"));
        assert_eq!(download.stage(), "download");
        assert!(download.to_string().contains("s3://b/k"));

        let dispatch = WorkerError::Dispatch(ToolError::UnknownTool("bogus".into()));
        assert_eq!(dispatch.stage(), "dispatch");
        assert_eq!(dispatch.to_string(), "Unknown tool: bogus");

        let transform = WorkerError::Transformation(ToolError::NoOutput("rotate".into()));
        assert_eq!(transform.stage(), "transform");

        let upload = WorkerError::upload("merged.pdf", StorageError::upload_failed("boom"));
        assert_eq!(upload.stage(), "upload");

        let record = WorkerError::Record(StatusError::write_failed("redis down"));
        assert_eq!(record.stage(), "result");
        assert!(record.to_string().contains("redis down"));

        assert_eq!(WorkerError::Interrupted.stage(), "shutdown");
    }
}

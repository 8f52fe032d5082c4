//! Job definitions decoded from queue messages.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::options::JobOptions;

/// Identifier assigned by the upstream job-creation system.
///
/// Workers never generate one; it is only ever decoded from a message and used
/// as the key for status and result records.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Reasons a message body cannot become a [`Job`].
#[derive(Debug, Error)]
pub enum JobDecodeError {
    #[error("Malformed job payload: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Job id is empty")]
    EmptyId,

    #[error("Tool name is empty")]
    EmptyTool,

    #[error("Job has no input files")]
    NoFiles,

    #[error("Input file reference at position {0} is empty")]
    EmptyFileReference(usize),
}

/// One unit of work received from the queue.
///
/// Immutable once decoded; the processor only ever borrows it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// Upstream job identifier
    pub id: JobId,

    /// Tool name selecting the transformation
    pub tool: String,

    /// Ordered input artifact references (position is meaningful)
    pub files: Vec<String>,

    /// Tool-specific options; absent means empty
    #[serde(default, skip_serializing_if = "JobOptions::is_empty")]
    pub options: JobOptions,
}

impl Job {
    /// Create a job with no options.
    pub fn new(
        id: impl Into<String>,
        tool: impl Into<String>,
        files: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            id: JobId::from_string(id),
            tool: tool.into(),
            files: files.into_iter().map(Into::into).collect(),
            options: JobOptions::default(),
        }
    }

    /// Set an option.
    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(key, value);
        self
    }

    /// Decode and validate a queue message body.
    pub fn decode(body: &[u8]) -> Result<Self, JobDecodeError> {
        let job: Job = serde_json::from_slice(body)?;
        job.validate()?;
        Ok(job)
    }

    /// Check the structural invariants every worker relies on.
    pub fn validate(&self) -> Result<(), JobDecodeError> {
        if self.id.as_str().trim().is_empty() {
            return Err(JobDecodeError::EmptyId);
        }
        if self.tool.trim().is_empty() {
            return Err(JobDecodeError::EmptyTool);
        }
        if self.files.is_empty() {
            return Err(JobDecodeError::NoFiles);
        }
        if let Some(index) = self.files.iter().position(|f| f.trim().is_empty()) {
            return Err(JobDecodeError::EmptyFileReference(index));
        }
        Ok(())
    }

    /// Encode as a queue message body.
    pub fn encode(&self) -> Vec<u8> {
        // A map of strings cannot fail to serialize.
        serde_json::to_vec(self).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_full_message() {
        let body = br#"{"id":"j3","tool":"rotate","files":["s3://b/in.pdf"],"options":{"angle":"90"}}"#;
        let job = Job::decode(body).unwrap();

        assert_eq!(job.id.as_str(), "j3");
        assert_eq!(job.tool, "rotate");
        assert_eq!(job.files, vec!["s3://b/in.pdf".to_string()]);
        assert_eq!(job.options.get("angle"), Some("90"));
    }

    #[test]
    fn test_decode_without_options() {
        let body = br#"{"id":"j1","tool":"merge","files":["a","b"]}"#;
        let job = Job::decode(body).unwrap();

        assert!(job.options.is_empty());
        assert_eq!(job.files.len(), 2);
    }

    #[test]
    fn test_decode_rejects_non_json() {
        let err = Job::decode(b"not json at all").unwrap_err();
        assert!(matches!(err, JobDecodeError::Malformed(_)));
    }

    #[test]
    fn test_decode_rejects_empty_files() {
        let err = Job::decode(br#"{"id":"j","tool":"merge","files":[]}"#).unwrap_err();
        assert!(matches!(err, JobDecodeError::NoFiles));

        let err = Job::decode(br#"{"id":"j","tool":"merge","files":["a",""]}"#).unwrap_err();
        assert!(matches!(err, JobDecodeError::EmptyFileReference(1)));
    }

    #[test]
    fn test_decode_rejects_missing_identity() {
        let err = Job::decode(br#"{"id":"","tool":"merge","files":["a"]}"#).unwrap_err();
        assert!(matches!(err, JobDecodeError::EmptyId));

        let err = Job::decode(br#"{"id":"j","tool":" ","files":["a"]}"#).unwrap_err();
        assert!(matches!(err, JobDecodeError::EmptyTool));

        let err = Job::decode(br#"{"tool":"merge","files":["a"]}"#).unwrap_err();
        assert!(matches!(err, JobDecodeError::Malformed(_)));
    }

    #[test]
    fn test_encode_decodes_back() {
        let job = Job::new("j9", "watermark", ["s3://b/doc.pdf"]).with_option("text", "DRAFT");
        let decoded = Job::decode(&job.encode()).unwrap();
        assert_eq!(decoded, job);
    }
}

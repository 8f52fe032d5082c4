//! Shared data models for the document worker fleet.
//!
//! This crate provides Serde-serializable types for:
//! - Jobs decoded from queue messages
//! - Tool-specific option maps
//! - Job status tokens and result records

pub mod job;
pub mod job_status;
pub mod options;

pub use job::{Job, JobDecodeError, JobId};
pub use job_status::{JobResult, JobStatus, ParseStatusError};
pub use options::{JobOptions, OptionError};

//! Queue-driven document worker.
//!
//! This crate provides:
//! - The job processor (download, transform, upload, status)
//! - The queue consumer with bounded concurrency and graceful shutdown
//! - Per-job staging directories
//! - Structured job logging and Prometheus metrics

pub mod config;
pub mod consumer;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod processor;
pub mod staging;

pub use config::WorkerConfig;
pub use consumer::{MessageOutcome, QueueConsumer};
pub use error::{WorkerError, WorkerResult};
pub use logging::JobLogger;
pub use processor::{JobOutcome, JobProcessor};
pub use staging::StagingArea;

//! Job intake queues and the job status store.
//!
//! This crate provides:
//! - The `MessageQueue` interface (receive at most one message, delete on ack)
//! - SQS and Redis Streams queue backends
//! - The `StatusStore` interface for status tokens and result records
//! - A Redis status store
//! - In-memory backends for both interfaces

pub mod config;
pub mod error;
pub mod memory;
pub mod queue;
pub mod redis_stream;
pub mod sqs;
pub mod status;

pub use config::{redis_url_from_env, QueueBackend, QueueConfig};
pub use error::{QueueError, QueueResult, StatusError, StatusResult};
pub use memory::{MemoryQueue, MemoryStatusStore, StatusWrite};
pub use queue::{MessageQueue, QueueMessage};
pub use redis_stream::RedisStreamQueue;
pub use sqs::SqsQueue;
pub use status::{RedisStatusStore, StatusConfig, StatusStore};

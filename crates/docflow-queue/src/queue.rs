//! Message queue interface.

use async_trait::async_trait;

use crate::error::QueueResult;

/// A message received from the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueMessage {
    /// Handle used to delete the message
    pub receipt: String,
    /// Raw message body
    pub body: Vec<u8>,
}

impl QueueMessage {
    pub fn new(receipt: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        Self {
            receipt: receipt.into(),
            body: body.into(),
        }
    }
}

/// Queue a worker pulls jobs from.
///
/// `receive` waits a bounded time and returns at most one message; an empty
/// poll is `Ok(None)`, not an error. `delete` acknowledges a message so it is
/// never delivered again.
#[async_trait]
pub trait MessageQueue: Send + Sync {
    async fn receive(&self) -> QueueResult<Option<QueueMessage>>;

    async fn delete(&self, receipt: &str) -> QueueResult<()>;

    /// Short human-readable identity for logs.
    fn describe(&self) -> String;
}

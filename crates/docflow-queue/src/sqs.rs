//! SQS message queue.

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_sqs::config::Region;
use aws_sdk_sqs::error::DisplayErrorContext;
use aws_sdk_sqs::Client;
use tracing::{debug, info, warn};

use crate::config::QueueConfig;
use crate::error::{QueueError, QueueResult};
use crate::queue::{MessageQueue, QueueMessage};

/// SQS-backed job queue.
pub struct SqsQueue {
    client: Client,
    queue_url: String,
    wait_secs: i32,
    visibility_timeout: Option<i32>,
}

impl SqsQueue {
    /// Create a new SQS queue client.
    pub async fn new(config: &QueueConfig) -> QueueResult<Self> {
        let queue_url = config
            .queue_url
            .clone()
            .ok_or_else(|| QueueError::config("SQS queue URL not set"))?;

        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .load()
            .await;
        let client = Client::new(&sdk_config);

        info!("SQS queue ready: {}", queue_url);

        Ok(Self {
            client,
            queue_url,
            wait_secs: config.wait_secs(),
            visibility_timeout: config.visibility_timeout.map(|d| d.as_secs() as i32),
        })
    }

    /// Check that the queue exists and is reachable.
    pub async fn check_connectivity(&self) -> QueueResult<()> {
        self.client
            .get_queue_attributes()
            .queue_url(&self.queue_url)
            .send()
            .await
            .map_err(|e| {
                QueueError::connection_failed(format!(
                    "SQS connectivity check failed: {}",
                    DisplayErrorContext(&e)
                ))
            })?;
        Ok(())
    }
}

#[async_trait]
impl MessageQueue for SqsQueue {
    async fn receive(&self) -> QueueResult<Option<QueueMessage>> {
        let output = self
            .client
            .receive_message()
            .queue_url(&self.queue_url)
            .max_number_of_messages(1)
            .wait_time_seconds(self.wait_secs)
            .set_visibility_timeout(self.visibility_timeout)
            .send()
            .await
            .map_err(|e| QueueError::receive_failed(DisplayErrorContext(&e).to_string()))?;

        let Some(message) = output.messages.unwrap_or_default().into_iter().next() else {
            return Ok(None);
        };

        let Some(receipt) = message.receipt_handle else {
            warn!(
                "Received SQS message {:?} without a receipt handle, skipping",
                message.message_id
            );
            return Ok(None);
        };

        debug!("Received SQS message {:?}", message.message_id);
        Ok(Some(QueueMessage {
            receipt,
            body: message.body.unwrap_or_default().into_bytes(),
        }))
    }

    async fn delete(&self, receipt: &str) -> QueueResult<()> {
        self.client
            .delete_message()
            .queue_url(&self.queue_url)
            .receipt_handle(receipt)
            .send()
            .await
            .map_err(|e| QueueError::delete_failed(DisplayErrorContext(&e).to_string()))?;

        debug!("Deleted SQS message");
        Ok(())
    }

    fn describe(&self) -> String {
        format!("sqs {}", self.queue_url)
    }
}

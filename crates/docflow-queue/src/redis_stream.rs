//! Job queue using Redis Streams.

use async_trait::async_trait;
use redis::streams::StreamReadReply;
use redis::AsyncCommands;
use tracing::{debug, info, warn};

use crate::config::QueueConfig;
use crate::error::{QueueError, QueueResult};
use crate::queue::{MessageQueue, QueueMessage};

/// Field holding the serialized job in each stream entry.
pub const JOB_FIELD: &str = "job";

/// Redis Streams job queue read through a consumer group.
pub struct RedisStreamQueue {
    client: redis::Client,
    stream_name: String,
    consumer_group: String,
    consumer_name: String,
    block_ms: u64,
}

impl RedisStreamQueue {
    /// Create a new stream queue for the given consumer.
    pub fn new(config: &QueueConfig, consumer_name: impl Into<String>) -> QueueResult<Self> {
        let redis_url = config
            .redis_url
            .as_deref()
            .ok_or_else(|| QueueError::config("REDIS_URL or REDIS_HOST not set"))?;
        let client = redis::Client::open(redis_url)?;

        Ok(Self {
            client,
            stream_name: config.stream_name.clone(),
            consumer_group: config.consumer_group.clone(),
            consumer_name: consumer_name.into(),
            block_ms: config.wait_time.as_millis() as u64,
        })
    }

    /// Initialize the queue (create consumer group if not exists).
    pub async fn init(&self) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let result: Result<(), redis::RedisError> = redis::cmd("XGROUP")
            .arg("CREATE")
            .arg(&self.stream_name)
            .arg(&self.consumer_group)
            .arg("$")
            .arg("MKSTREAM")
            .query_async(&mut conn)
            .await;

        match result {
            Ok(_) => info!("Created consumer group: {}", self.consumer_group),
            Err(e) if e.to_string().contains("BUSYGROUP") => {
                debug!("Consumer group already exists: {}", self.consumer_group);
            }
            Err(e) => return Err(QueueError::Redis(e)),
        }

        Ok(())
    }

    /// Append a message body to the stream, returning its entry id.
    pub async fn enqueue(&self, body: &[u8]) -> QueueResult<String> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let entry_id: String = redis::cmd("XADD")
            .arg(&self.stream_name)
            .arg("*")
            .arg(JOB_FIELD)
            .arg(body)
            .query_async(&mut conn)
            .await?;

        debug!("Enqueued entry {} on {}", entry_id, self.stream_name);
        Ok(entry_id)
    }

    /// Get stream length.
    pub async fn len(&self) -> QueueResult<u64> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let len: u64 = conn.xlen(&self.stream_name).await?;
        Ok(len)
    }
}

#[async_trait]
impl MessageQueue for RedisStreamQueue {
    async fn receive(&self) -> QueueResult<Option<QueueMessage>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let reply: Option<StreamReadReply> = redis::cmd("XREADGROUP")
            .arg("GROUP")
            .arg(&self.consumer_group)
            .arg(&self.consumer_name)
            .arg("COUNT")
            .arg(1)
            .arg("BLOCK")
            .arg(self.block_ms)
            .arg("STREAMS")
            .arg(&self.stream_name)
            .arg(">") // Only new messages
            .query_async(&mut conn)
            .await?;

        let Some(reply) = reply else {
            return Ok(None);
        };

        let entry = reply
            .keys
            .into_iter()
            .flat_map(|stream_key| stream_key.ids)
            .next();

        let Some(entry) = entry else {
            return Ok(None);
        };

        let body = match entry.map.get(JOB_FIELD) {
            Some(redis::Value::BulkString(payload)) => payload.clone(),
            Some(redis::Value::SimpleString(payload)) => payload.clone().into_bytes(),
            _ => {
                warn!("Stream entry {} has no '{}' field", entry.id, JOB_FIELD);
                Vec::new()
            }
        };

        debug!("Consumed entry {} from {}", entry.id, self.stream_name);
        Ok(Some(QueueMessage {
            receipt: entry.id,
            body,
        }))
    }

    async fn delete(&self, receipt: &str) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        redis::cmd("XACK")
            .arg(&self.stream_name)
            .arg(&self.consumer_group)
            .arg(receipt)
            .query_async::<()>(&mut conn)
            .await?;

        // Delete the message from the stream
        redis::cmd("XDEL")
            .arg(&self.stream_name)
            .arg(receipt)
            .query_async::<()>(&mut conn)
            .await?;

        debug!("Acknowledged entry: {}", receipt);
        Ok(())
    }

    fn describe(&self) -> String {
        format!("redis stream {} ({})", self.stream_name, self.consumer_group)
    }
}

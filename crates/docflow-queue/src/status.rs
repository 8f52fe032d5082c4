//! Job status store.
//!
//! Status tokens live under `job:<id>`, result records under `result:<id>`
//! as a JSON array, and the optional failure reason under `error:<id>`.
//! Writes are plain `SET`s: last writer wins.

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use tracing::{debug, info};

use docflow_models::{JobId, JobResult, JobStatus};

use crate::config::redis_url_from_env;
use crate::error::{StatusError, StatusResult};

/// Key holding a job's status token.
pub fn status_key(job_id: &JobId) -> String {
    format!("job:{}", job_id)
}

/// Key holding a job's result record.
pub fn result_key(job_id: &JobId) -> String {
    format!("result:{}", job_id)
}

/// Key holding a job's failure reason.
pub fn error_key(job_id: &JobId) -> String {
    format!("error:{}", job_id)
}

/// Store the API polls for job progress.
#[async_trait]
pub trait StatusStore: Send + Sync {
    /// Overwrite the status token of a job.
    async fn set_status(&self, job_id: &JobId, status: JobStatus) -> StatusResult<()>;

    /// Record a human-readable failure reason.
    async fn set_error(&self, job_id: &JobId, reason: &str) -> StatusResult<()>;

    /// Remove the failure reason left by an earlier run of the same job.
    async fn clear_error(&self, job_id: &JobId) -> StatusResult<()>;

    /// Write the result record of a completed job.
    async fn save_result(&self, job_id: &JobId, result: &JobResult) -> StatusResult<()>;
}

/// Status store configuration.
#[derive(Debug, Clone)]
pub struct StatusConfig {
    pub redis_url: String,
    /// Expiry for written keys; keys persist when unset
    pub ttl_secs: Option<u64>,
}

impl StatusConfig {
    /// Create config from environment variables.
    pub fn from_env() -> StatusResult<Self> {
        Ok(Self {
            redis_url: redis_url_from_env()
                .ok_or_else(|| StatusError::config("REDIS_URL or REDIS_HOST not set"))?,
            ttl_secs: std::env::var("STATUS_TTL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|ttl| *ttl > 0),
        })
    }
}

/// Redis-backed status store.
#[derive(Clone)]
pub struct RedisStatusStore {
    conn: MultiplexedConnection,
    ttl_secs: Option<u64>,
}

impl RedisStatusStore {
    /// Connect and verify the server answers `PING`.
    pub async fn connect(config: &StatusConfig) -> StatusResult<Self> {
        let client = redis::Client::open(config.redis_url.as_str())?;
        let mut conn = client.get_multiplexed_async_connection().await?;

        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        info!("Redis status store connected");

        Ok(Self {
            conn,
            ttl_secs: config.ttl_secs,
        })
    }

    /// Create from environment variables.
    pub async fn from_env() -> StatusResult<Self> {
        Self::connect(&StatusConfig::from_env()?).await
    }

    async fn set(&self, key: String, value: String) -> StatusResult<()> {
        let mut conn = self.conn.clone();
        match self.ttl_secs {
            Some(ttl) => conn.set_ex::<_, _, ()>(&key, value, ttl).await?,
            None => conn.set::<_, _, ()>(&key, value).await?,
        }
        debug!("SET {}", key);
        Ok(())
    }

    /// Read a job's status token.
    pub async fn get_status(&self, job_id: &JobId) -> StatusResult<Option<JobStatus>> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(status_key(job_id)).await?;
        raw.map(|s| {
            s.parse::<JobStatus>()
                .map_err(|e| StatusError::InvalidRecord(e.to_string()))
        })
        .transpose()
    }

    /// Read a job's result record.
    pub async fn get_result(&self, job_id: &JobId) -> StatusResult<Option<JobResult>> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(result_key(job_id)).await?;
        raw.map(|s| JobResult::from_json(&s).map_err(|e| StatusError::InvalidRecord(e.to_string())))
            .transpose()
    }

    /// Read a job's failure reason.
    pub async fn get_error(&self, job_id: &JobId) -> StatusResult<Option<String>> {
        let mut conn = self.conn.clone();
        Ok(conn.get(error_key(job_id)).await?)
    }
}

#[async_trait]
impl StatusStore for RedisStatusStore {
    async fn set_status(&self, job_id: &JobId, status: JobStatus) -> StatusResult<()> {
        self.set(status_key(job_id), status.as_str().to_string()).await
    }

    async fn set_error(&self, job_id: &JobId, reason: &str) -> StatusResult<()> {
        self.set(error_key(job_id), reason.to_string()).await
    }

    async fn clear_error(&self, job_id: &JobId) -> StatusResult<()> {
        let mut conn = self.conn.clone();
        let key = error_key(job_id);
        conn.del::<_, ()>(&key).await?;
        debug!("DEL {}", key);
        Ok(())
    }

    async fn save_result(&self, job_id: &JobId, result: &JobResult) -> StatusResult<()> {
        self.set(result_key(job_id), result.to_json()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_layout() {
        let id = JobId::from_string("abc-123");
        assert_eq!(status_key(&id), "job:abc-123");
        assert_eq!(result_key(&id), "result:abc-123");
        assert_eq!(error_key(&id), "error:abc-123");
    }
}

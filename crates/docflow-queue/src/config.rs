//! Queue configuration.

use std::str::FromStr;
use std::time::Duration;

use crate::error::{QueueError, QueueResult};

/// Which queue service a worker pulls from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueBackend {
    Sqs,
    Redis,
}

impl FromStr for QueueBackend {
    type Err = QueueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sqs" => Ok(QueueBackend::Sqs),
            "redis" => Ok(QueueBackend::Redis),
            other => Err(QueueError::config(format!("unknown QUEUE_BACKEND '{}'", other))),
        }
    }
}

/// Queue configuration.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Queue service
    pub backend: QueueBackend,
    /// SQS queue URL
    pub queue_url: Option<String>,
    /// AWS region for SQS
    pub region: String,
    /// Long-poll wait per receive
    pub wait_time: Duration,
    /// Visibility timeout requested on receive (queue default when unset)
    pub visibility_timeout: Option<Duration>,
    /// Redis URL for the stream backend
    pub redis_url: Option<String>,
    /// Stream name for jobs
    pub stream_name: String,
    /// Consumer group name
    pub consumer_group: String,
}

impl QueueConfig {
    /// Create config from environment variables for a worker kind.
    ///
    /// The SQS URL is read from `QUEUE_URL`, then `<KIND>_QUEUE_URL`
    /// (for example `PDF_QUEUE_URL`).
    pub fn from_env(kind: &str) -> QueueResult<Self> {
        let backend = match std::env::var("QUEUE_BACKEND") {
            Ok(raw) => raw.parse()?,
            Err(_) => QueueBackend::Sqs,
        };

        let kind_var = format!("{}_QUEUE_URL", kind.to_ascii_uppercase());
        let queue_url = non_empty_var("QUEUE_URL").or_else(|| non_empty_var(&kind_var));

        let config = Self {
            backend,
            queue_url,
            region: std::env::var("AWS_REGION").unwrap_or_else(|_| "us-east-1".to_string()),
            wait_time: Duration::from_secs(
                std::env::var("QUEUE_WAIT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(10),
            ),
            visibility_timeout: std::env::var("QUEUE_VISIBILITY_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs),
            redis_url: redis_url_from_env(),
            stream_name: std::env::var("QUEUE_STREAM")
                .unwrap_or_else(|_| format!("docflow:{}:jobs", kind)),
            consumer_group: std::env::var("QUEUE_CONSUMER_GROUP")
                .unwrap_or_else(|_| format!("docflow:{}:workers", kind)),
        };

        match config.backend {
            QueueBackend::Sqs if config.queue_url.is_none() => Err(QueueError::config(format!(
                "QUEUE_URL or {} not set",
                kind_var
            ))),
            QueueBackend::Redis if config.redis_url.is_none() => {
                Err(QueueError::config("REDIS_URL or REDIS_HOST not set"))
            }
            _ => Ok(config),
        }
    }

    /// SQS wait in whole seconds, clamped to the service maximum of 20.
    pub fn wait_secs(&self) -> i32 {
        self.wait_time.as_secs().min(20) as i32
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Redis URL from `REDIS_URL`, or built from `REDIS_HOST` and `REDIS_PASSWORD`.
pub fn redis_url_from_env() -> Option<String> {
    if let Some(url) = non_empty_var("REDIS_URL") {
        return Some(url);
    }
    let host = non_empty_var("REDIS_HOST")?;
    Some(build_redis_url(&host, non_empty_var("REDIS_PASSWORD").as_deref()))
}

fn build_redis_url(host: &str, password: Option<&str>) -> String {
    if host.contains("://") {
        return host.to_string();
    }
    match password {
        Some(password) => format!("redis://:{}@{}/0", urlencoding::encode(password), host),
        None => format!("redis://{}/0", host),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_parsing() {
        assert_eq!("SQS".parse::<QueueBackend>().unwrap(), QueueBackend::Sqs);
        assert_eq!("redis".parse::<QueueBackend>().unwrap(), QueueBackend::Redis);
        assert!("kafka".parse::<QueueBackend>().is_err());
    }

    #[test]
    fn test_build_redis_url() {
        assert_eq!(build_redis_url("cache:6379", None), "redis://cache:6379/0");
        assert_eq!(
            build_redis_url("cache:6379", Some("p@ss")),
            "redis://:p%40ss@cache:6379/0"
        );
        assert_eq!(
            build_redis_url("rediss://managed:25061", Some("ignored")),
            "rediss://managed:25061"
        );
    }
}

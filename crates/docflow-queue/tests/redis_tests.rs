//! Redis integration tests.

use std::time::Duration;

use docflow_models::{Job, JobId, JobResult, JobStatus};
use docflow_queue::{
    redis_url_from_env, MessageQueue, QueueBackend, QueueConfig, RedisStatusStore,
    RedisStreamQueue, StatusStore,
};
use uuid::Uuid;

fn stream_config(redis_url: String) -> QueueConfig {
    let suffix = Uuid::new_v4();
    QueueConfig {
        backend: QueueBackend::Redis,
        queue_url: None,
        region: "us-east-1".to_string(),
        wait_time: Duration::from_millis(500),
        visibility_timeout: None,
        redis_url: Some(redis_url),
        stream_name: format!("docflow:test:{}:jobs", suffix),
        consumer_group: format!("docflow:test:{}:workers", suffix),
    }
}

/// Test the stream receive/delete cycle.
#[tokio::test]
#[ignore = "requires Redis"]
async fn test_stream_receive_delete() {
    dotenvy::dotenv().ok();

    let url = redis_url_from_env().expect("REDIS_URL or REDIS_HOST not set");
    let queue = RedisStreamQueue::new(&stream_config(url), "test-consumer")
        .expect("Failed to create queue");
    queue.init().await.expect("Failed to initialize queue");
    // init is idempotent
    queue.init().await.expect("Failed to re-initialize queue");

    let job = Job::new("it-1", "merge", ["s3://docs/a.pdf", "s3://docs/b.pdf"]);
    queue.enqueue(&job.encode()).await.expect("Failed to enqueue");

    let message = queue
        .receive()
        .await
        .expect("Failed to receive")
        .expect("No message received");
    assert_eq!(Job::decode(&message.body).unwrap(), job);

    queue.delete(&message.receipt).await.expect("Failed to delete");
    assert_eq!(queue.len().await.unwrap(), 0);
    assert!(queue.receive().await.unwrap().is_none());
}

/// Test status, error and result keys.
#[tokio::test]
#[ignore = "requires Redis"]
async fn test_status_store_round_trip() {
    dotenvy::dotenv().ok();

    let store = RedisStatusStore::from_env()
        .await
        .expect("Failed to connect status store");
    let job_id = JobId::from_string(format!("it-{}", Uuid::new_v4()));

    store.set_status(&job_id, JobStatus::Processing).await.unwrap();
    assert_eq!(
        store.get_status(&job_id).await.unwrap(),
        Some(JobStatus::Processing)
    );

    let result = JobResult::new(vec!["https://docs.s3.amazonaws.com/processed/x/out.pdf".into()]);
    store.save_result(&job_id, &result).await.unwrap();
    store.set_status(&job_id, JobStatus::Completed).await.unwrap();

    assert_eq!(store.get_result(&job_id).await.unwrap(), Some(result));
    assert_eq!(
        store.get_status(&job_id).await.unwrap(),
        Some(JobStatus::Completed)
    );
}

#[tokio::test]
#[ignore = "requires Redis"]
async fn test_status_store_clears_error() {
    dotenvy::dotenv().ok();

    let store = RedisStatusStore::from_env()
        .await
        .expect("Failed to connect status store");
    let job_id = JobId::from_string(format!("it-{}", Uuid::new_v4()));

    store.set_error(&job_id, "merge needs 2 files").await.unwrap();
    assert_eq!(
        store.get_error(&job_id).await.unwrap().as_deref(),
        Some("merge needs 2 files")
    );

    store.clear_error(&job_id).await.unwrap();
    assert_eq!(store.get_error(&job_id).await.unwrap(), None);
    // clearing a missing key is not an error
    store.clear_error(&job_id).await.unwrap();
}

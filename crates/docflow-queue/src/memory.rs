//! In-memory queue and status store for local runs and tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use docflow_models::{JobId, JobResult, JobStatus};

use crate::error::{QueueError, QueueResult, StatusError, StatusResult};
use crate::queue::{MessageQueue, QueueMessage};
use crate::status::StatusStore;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// FIFO queue with SQS-like receive/delete semantics.
///
/// Received messages stay in flight until deleted; they are never
/// redelivered.
pub struct MemoryQueue {
    pending: Mutex<VecDeque<QueueMessage>>,
    in_flight: Mutex<HashMap<String, QueueMessage>>,
    deleted: Mutex<Vec<String>>,
    next_id: AtomicU64,
    idle_wait: Duration,
}

impl Default for MemoryQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self {
            pending: Mutex::new(VecDeque::new()),
            in_flight: Mutex::new(HashMap::new()),
            deleted: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            idle_wait: Duration::from_millis(10),
        }
    }

    /// Time an empty receive waits before returning.
    pub fn with_idle_wait(mut self, wait: Duration) -> Self {
        self.idle_wait = wait;
        self
    }

    /// Enqueue a raw body, returning its receipt.
    pub fn push(&self, body: impl Into<Vec<u8>>) -> String {
        let receipt = format!("msg-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        lock(&self.pending).push_back(QueueMessage::new(receipt.clone(), body));
        receipt
    }

    pub fn pending_len(&self) -> usize {
        lock(&self.pending).len()
    }

    pub fn in_flight_len(&self) -> usize {
        lock(&self.in_flight).len()
    }

    /// Receipts deleted so far, in order.
    pub fn deleted(&self) -> Vec<String> {
        lock(&self.deleted).clone()
    }
}

#[async_trait]
impl MessageQueue for MemoryQueue {
    async fn receive(&self) -> QueueResult<Option<QueueMessage>> {
        let next = lock(&self.pending).pop_front();
        match next {
            Some(message) => {
                lock(&self.in_flight).insert(message.receipt.clone(), message.clone());
                Ok(Some(message))
            }
            None => {
                tokio::time::sleep(self.idle_wait).await;
                Ok(None)
            }
        }
    }

    async fn delete(&self, receipt: &str) -> QueueResult<()> {
        lock(&self.in_flight)
            .remove(receipt)
            .ok_or_else(|| QueueError::UnknownReceipt(receipt.to_string()))?;
        lock(&self.deleted).push(receipt.to_string());
        Ok(())
    }

    fn describe(&self) -> String {
        "memory queue".to_string()
    }
}

/// One write observed by [`MemoryStatusStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusWrite {
    Status(JobId, JobStatus),
    Error(JobId, String),
    ErrorCleared(JobId),
    Result(JobId, JobResult),
}

impl StatusWrite {
    pub fn job_id(&self) -> &JobId {
        match self {
            StatusWrite::Status(id, _)
            | StatusWrite::Error(id, _)
            | StatusWrite::ErrorCleared(id)
            | StatusWrite::Result(id, _) => id,
        }
    }
}

/// Status store keeping the full write history.
#[derive(Default)]
pub struct MemoryStatusStore {
    writes: Mutex<Vec<StatusWrite>>,
    fail_status: AtomicBool,
    fail_results: AtomicBool,
}

impl MemoryStatusStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following write fail (nothing is recorded).
    pub fn set_fail_writes(&self, fail: bool) {
        self.set_fail_status(fail);
        self.set_fail_results(fail);
    }

    /// Fail status token and failure reason writes only.
    pub fn set_fail_status(&self, fail: bool) {
        self.fail_status.store(fail, Ordering::SeqCst);
    }

    /// Fail result record writes only.
    pub fn set_fail_results(&self, fail: bool) {
        self.fail_results.store(fail, Ordering::SeqCst);
    }

    /// Every write, in order.
    pub fn writes(&self) -> Vec<StatusWrite> {
        lock(&self.writes).clone()
    }

    /// Status tokens written for a job, in order.
    pub fn history(&self, job_id: &str) -> Vec<JobStatus> {
        lock(&self.writes)
            .iter()
            .filter_map(|w| match w {
                StatusWrite::Status(id, status) if id.as_str() == job_id => Some(*status),
                _ => None,
            })
            .collect()
    }

    /// Current status token of a job.
    pub fn status(&self, job_id: &str) -> Option<JobStatus> {
        self.history(job_id).last().copied()
    }

    /// Result records written for a job, in order.
    pub fn results(&self, job_id: &str) -> Vec<JobResult> {
        lock(&self.writes)
            .iter()
            .filter_map(|w| match w {
                StatusWrite::Result(id, result) if id.as_str() == job_id => Some(result.clone()),
                _ => None,
            })
            .collect()
    }

    /// Current result record of a job.
    pub fn result(&self, job_id: &str) -> Option<JobResult> {
        self.results(job_id).pop()
    }

    /// Current failure reason of a job.
    pub fn error(&self, job_id: &str) -> Option<String> {
        lock(&self.writes)
            .iter()
            .rev()
            .find_map(|w| match w {
                StatusWrite::Error(id, reason) if id.as_str() == job_id => {
                    Some(Some(reason.clone()))
                }
                StatusWrite::ErrorCleared(id) if id.as_str() == job_id => Some(None),
                _ => None,
            })
            .flatten()
    }

    fn record(&self, write: StatusWrite) -> StatusResult<()> {
        let failing = match write {
            StatusWrite::Result(..) => &self.fail_results,
            _ => &self.fail_status,
        };
        if failing.load(Ordering::SeqCst) {
            return Err(StatusError::write_failed(format!(
                "injected failure for job {}",
                write.job_id()
            )));
        }
        lock(&self.writes).push(write);
        Ok(())
    }
}

#[async_trait]
impl StatusStore for MemoryStatusStore {
    async fn set_status(&self, job_id: &JobId, status: JobStatus) -> StatusResult<()> {
        self.record(StatusWrite::Status(job_id.clone(), status))
    }

    async fn set_error(&self, job_id: &JobId, reason: &str) -> StatusResult<()> {
        self.record(StatusWrite::Error(job_id.clone(), reason.to_string()))
    }

    async fn clear_error(&self, job_id: &JobId) -> StatusResult<()> {
        self.record(StatusWrite::ErrorCleared(job_id.clone()))
    }

    async fn save_result(&self, job_id: &JobId, result: &JobResult) -> StatusResult<()> {
        self.record(StatusWrite::Result(job_id.clone(), result.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_queue_receive_and_delete() {
        let queue = MemoryQueue::new();
        let receipt = queue.push(b"hello".to_vec());

        let message = queue.receive().await.unwrap().unwrap();
        assert_eq!(message.receipt, receipt);
        assert_eq!(message.body, b"hello");
        assert_eq!(queue.pending_len(), 0);
        assert_eq!(queue.in_flight_len(), 1);

        queue.delete(&receipt).await.unwrap();
        assert_eq!(queue.in_flight_len(), 0);
        assert_eq!(queue.deleted(), vec![receipt.clone()]);

        assert!(matches!(
            queue.delete(&receipt).await,
            Err(QueueError::UnknownReceipt(_))
        ));
    }

    #[tokio::test]
    async fn test_memory_queue_empty_poll() {
        let queue = MemoryQueue::new().with_idle_wait(Duration::from_millis(1));
        assert!(queue.receive().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_memory_status_store_last_write_wins() {
        let store = MemoryStatusStore::new();
        let id = JobId::from_string("j1");

        store.set_status(&id, JobStatus::Processing).await.unwrap();
        store
            .save_result(&id, &JobResult::new(vec!["a".into()]))
            .await
            .unwrap();
        store.set_status(&id, JobStatus::Completed).await.unwrap();

        assert_eq!(
            store.history("j1"),
            vec![JobStatus::Processing, JobStatus::Completed]
        );
        assert_eq!(store.status("j1"), Some(JobStatus::Completed));
        assert_eq!(store.result("j1").unwrap().outputs(), ["a".to_string()]);
        assert!(store.status("other").is_none());
    }

    #[tokio::test]
    async fn test_memory_status_store_injected_failure() {
        let store = MemoryStatusStore::new();
        store.set_fail_writes(true);

        let id = JobId::from_string("j1");
        assert!(store.set_status(&id, JobStatus::Processing).await.is_err());
        assert!(store.writes().is_empty());
    }

    #[tokio::test]
    async fn test_memory_status_store_selective_failure() {
        let store = MemoryStatusStore::new();
        store.set_fail_results(true);

        let id = JobId::from_string("j1");
        assert!(store.set_status(&id, JobStatus::Processing).await.is_ok());
        assert!(store
            .save_result(&id, &JobResult::new(vec!["a".into()]))
            .await
            .is_err());
        assert!(store.result("j1").is_none());
        assert_eq!(store.status("j1"), Some(JobStatus::Processing));
    }

    #[tokio::test]
    async fn test_memory_status_store_cleared_error() {
        let store = MemoryStatusStore::new();
        let id = JobId::from_string("j1");

        store.set_error(&id, "boom").await.unwrap();
        assert_eq!(store.error("j1").as_deref(), Some("boom"));
        store.clear_error(&id).await.unwrap();
        assert!(store.error("j1").is_none());
    }
}

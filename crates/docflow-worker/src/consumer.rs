//! Queue consumer.
//!
//! Pulls messages, hands each decoded job to the [`JobProcessor`] and
//! deletes the message once the job has reached a terminal status.
//! Delivery is at-most-once: a message is deleted after every attempt,
//! whether the job completed or failed, and malformed messages are deleted
//! without touching the status store.
//!
//! Jobs still running when the shutdown grace period ends are aborted,
//! marked `error` and their messages deleted, so none is left in
//! `processing` or redelivered.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use docflow_models::{Job, JobId};
use docflow_queue::{MessageQueue, QueueMessage};
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::metrics;
use crate::processor::JobProcessor;

/// Back-off after a failed receive.
const RECEIVE_BACKOFF: Duration = Duration::from_secs(5);

/// What happened to one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageOutcome {
    /// Body could not be decoded; deleted without processing
    Dropped,
    /// Job finished with status `completed`
    Completed,
    /// Job finished with status `error`
    Failed,
}

/// Messages received but not yet deleted, by receipt.
///
/// The value is the job being processed; `None` before decoding and after
/// the job reached a terminal status.
#[derive(Default)]
struct InFlight {
    messages: Mutex<HashMap<String, Option<(JobId, String)>>>,
}

impl InFlight {
    fn lock(&self) -> MutexGuard<'_, HashMap<String, Option<(JobId, String)>>> {
        self.messages.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn received(&self, receipt: &str) {
        self.lock().insert(receipt.to_string(), None);
    }

    fn processing(&self, receipt: &str, job: &Job) {
        self.lock()
            .insert(receipt.to_string(), Some((job.id.clone(), job.tool.clone())));
    }

    fn finished(&self, receipt: &str) {
        if let Some(entry) = self.lock().get_mut(receipt) {
            *entry = None;
        }
    }

    fn deleted(&self, receipt: &str) {
        self.lock().remove(receipt);
    }

    fn drain(&self) -> Vec<(String, Option<(JobId, String)>)> {
        self.lock().drain().collect()
    }
}

/// Receive loop bound to one queue and one processor.
pub struct QueueConsumer {
    queue: Arc<dyn MessageQueue>,
    processor: Arc<JobProcessor>,
    in_flight: Arc<InFlight>,
    job_semaphore: Arc<Semaphore>,
    max_jobs: usize,
    shutdown_timeout: Duration,
    shutdown: watch::Sender<bool>,
}

impl QueueConsumer {
    pub fn new(
        queue: Arc<dyn MessageQueue>,
        processor: Arc<JobProcessor>,
        config: &WorkerConfig,
    ) -> Self {
        let max_jobs = config.max_concurrent_jobs.max(1);
        let (shutdown, _) = watch::channel(false);
        Self {
            queue,
            processor,
            in_flight: Arc::new(InFlight::default()),
            job_semaphore: Arc::new(Semaphore::new(max_jobs)),
            max_jobs,
            shutdown_timeout: config.shutdown_timeout,
            shutdown,
        }
    }

    /// Run until [`QueueConsumer::shutdown`] is called, then wait for
    /// in-flight jobs up to the shutdown timeout. Jobs still running after
    /// that are aborted and recorded as failed.
    pub async fn run(&self) -> WorkerResult<()> {
        info!(
            "Consuming from {} with {} max concurrent jobs",
            self.queue.describe(),
            self.max_jobs
        );

        let mut shutdown_rx = self.shutdown.subscribe();
        let mut tasks = JoinSet::new();

        loop {
            while tasks.try_join_next().is_some() {}

            if *shutdown_rx.borrow() {
                break;
            }

            let permit = tokio::select! {
                _ = shutdown_rx.changed() => continue,
                permit = Arc::clone(&self.job_semaphore).acquire_owned() => {
                    permit.map_err(|_| WorkerError::config("job semaphore closed"))?
                }
            };

            // A receive in progress is never cancelled; it returns within
            // the queue's wait time.
            let message = match self.queue.receive().await {
                Ok(Some(message)) => message,
                Ok(None) => continue,
                Err(e) => {
                    warn!("Failed to receive from {}: {}", self.queue.describe(), e);
                    drop(permit);
                    tokio::select! {
                        _ = shutdown_rx.changed() => {}
                        _ = tokio::time::sleep(RECEIVE_BACKOFF) => {}
                    }
                    continue;
                }
            };

            // Tracked before spawning so an abort before the first poll
            // still deletes the message.
            self.in_flight.received(&message.receipt);
            let queue = Arc::clone(&self.queue);
            let processor = Arc::clone(&self.processor);
            let in_flight = Arc::clone(&self.in_flight);
            tasks.spawn(async move {
                let _permit = permit;
                Self::execute(queue, processor, in_flight, message).await;
            });
        }

        info!("Shutdown requested, waiting for in-flight jobs...");
        let drained = tokio::time::timeout(self.shutdown_timeout, async {
            while tasks.join_next().await.is_some() {}
        })
        .await;

        if drained.is_err() {
            warn!(
                "{} job(s) still running after {:?}, aborting",
                tasks.len(),
                self.shutdown_timeout
            );
            tasks.abort_all();
            while tasks.join_next().await.is_some() {}
            self.abandon_in_flight().await;
        }

        info!("Consumer stopped");
        Ok(())
    }

    /// Fail and delete every message whose task was aborted.
    async fn abandon_in_flight(&self) {
        for (receipt, job) in self.in_flight.drain() {
            if let Some((job_id, tool)) = job {
                self.processor.abandon(&job_id, &tool).await;
            }
            if let Err(e) = self.queue.delete(&receipt).await {
                error!("Failed to delete message {}: {}", receipt, e);
            }
        }
    }

    /// Receive and fully handle at most one message on the current task.
    pub async fn poll_once(&self) -> WorkerResult<Option<MessageOutcome>> {
        match self.queue.receive().await? {
            Some(message) => Ok(Some(self.handle_message(message).await)),
            None => Ok(None),
        }
    }

    /// Handle one message already received from this consumer's queue.
    pub async fn handle_message(&self, message: QueueMessage) -> MessageOutcome {
        Self::execute(
            Arc::clone(&self.queue),
            Arc::clone(&self.processor),
            Arc::clone(&self.in_flight),
            message,
        )
        .await
    }

    /// Signal shutdown.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }

    async fn execute(
        queue: Arc<dyn MessageQueue>,
        processor: Arc<JobProcessor>,
        in_flight: Arc<InFlight>,
        message: QueueMessage,
    ) -> MessageOutcome {
        metrics::record_message_received();
        in_flight.received(&message.receipt);

        let outcome = match Job::decode(&message.body) {
            Ok(job) => {
                debug!("Decoded job {} for tool {}", job.id, job.tool);
                in_flight.processing(&message.receipt, &job);
                let completed = processor.process(&job).await.is_completed();
                in_flight.finished(&message.receipt);
                if completed {
                    MessageOutcome::Completed
                } else {
                    MessageOutcome::Failed
                }
            }
            Err(e) => {
                let err = WorkerError::from(e);
                warn!("Dropping message {}: {}", message.receipt, err);
                metrics::record_message_dropped();
                MessageOutcome::Dropped
            }
        };

        if let Err(e) = queue.delete(&message.receipt).await {
            error!("Failed to delete message {}: {}", message.receipt, e);
        }
        in_flight.deleted(&message.receipt);

        outcome
    }
}

//! Publish queue port - abstraction over delay-capable job queue backends.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::PublishJob;

/// Worker-reported outcome of one job attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobVerdict {
    /// The job reached a terminal conclusion (which may include recorded
    /// per-platform failures - those never trigger a job-level retry).
    Completed,
    /// Internal fault; retry the whole job per backoff policy.
    Retry(String),
    /// Permanently failed; do not retry.
    Failed(String),
}

/// Handler invoked with each due job. Delivery is single-owner: the queue
/// never hands the same job to two concurrent workers.
pub type JobHandler =
    Arc<dyn Fn(PublishJob) -> Pin<Box<dyn Future<Output = JobVerdict> + Send>> + Send + Sync>;

/// Durable, delay-capable publish queue.
#[async_trait]
pub trait PublishQueue: Send + Sync {
    /// Enqueue a job; it becomes eligible for dequeue once `due_at` passes.
    /// Storage failures surface here and are fatal to the scheduling request.
    async fn enqueue(&self, job: PublishJob) -> Result<Uuid, QueueError>;

    /// Cancel the pending job for a post, if any. Returns whether a pending
    /// job was removed. Cancelling a job already handed to a worker is
    /// advisory: the in-flight attempt finishes but no retry is scheduled.
    async fn cancel_for_post(&self, post_id: Uuid) -> Result<bool, QueueError>;

    /// Identifier of the active (pending or executing) job for a post.
    async fn active_job(&self, post_id: Uuid) -> Result<Option<Uuid>, QueueError>;

    /// Start consuming due jobs with the given handler.
    async fn start_worker(&self, handler: JobHandler) -> Result<(), QueueError>;

    /// Queue statistics.
    async fn stats(&self) -> Result<QueueStats, QueueError>;
}

/// Queue statistics.
#[derive(Debug, Clone, Default)]
pub struct QueueStats {
    pub pending: usize,
    pub processing: usize,
    pub completed: usize,
    pub failed: usize,
}

/// Queue errors.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("Failed to enqueue job: {0}")]
    Enqueue(String),

    #[error("Job serialization failed: {0}")]
    Serialization(String),

    #[error("Backend error: {0}")]
    Backend(String),
}

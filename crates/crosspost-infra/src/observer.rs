//! Queue observers: tracing-backed logging and fan-out composition.

use std::sync::Arc;
use std::time::Duration;

use crosspost_core::domain::PublishJob;
use crosspost_core::ports::QueueObserver;

/// Logs every queue lifecycle transition through `tracing`.
pub struct TracingQueueObserver;

impl QueueObserver for TracingQueueObserver {
    fn on_enqueued(&self, job: &PublishJob) {
        tracing::debug!(
            job_id = %job.id,
            post_id = %job.post_id,
            due_at = %job.due_at,
            platforms = job.platforms.len(),
            "Publish job enqueued"
        );
    }

    fn on_started(&self, job: &PublishJob) {
        tracing::debug!(
            job_id = %job.id,
            post_id = %job.post_id,
            attempt = job.attempts,
            "Publish job started"
        );
    }

    fn on_retried(&self, job: &PublishJob, reason: &str, delay: Duration) {
        tracing::warn!(
            job_id = %job.id,
            post_id = %job.post_id,
            attempt = job.attempts,
            max_attempts = job.max_attempts,
            delay_secs = delay.as_secs(),
            reason = %reason,
            "Publish job failed, will retry"
        );
    }

    fn on_completed(&self, job: &PublishJob) {
        tracing::info!(job_id = %job.id, post_id = %job.post_id, "Publish job completed");
    }

    fn on_failed(&self, job: &PublishJob, reason: &str) {
        tracing::error!(
            job_id = %job.id,
            post_id = %job.post_id,
            reason = %reason,
            "Publish job failed permanently"
        );
    }
}

/// Broadcasts each transition to several observers, in registration order.
pub struct FanoutObserver {
    observers: Vec<Arc<dyn QueueObserver>>,
}

impl FanoutObserver {
    pub fn new(observers: Vec<Arc<dyn QueueObserver>>) -> Self {
        Self { observers }
    }
}

impl QueueObserver for FanoutObserver {
    fn on_enqueued(&self, job: &PublishJob) {
        for observer in &self.observers {
            observer.on_enqueued(job);
        }
    }

    fn on_started(&self, job: &PublishJob) {
        for observer in &self.observers {
            observer.on_started(job);
        }
    }

    fn on_retried(&self, job: &PublishJob, reason: &str, delay: Duration) {
        for observer in &self.observers {
            observer.on_retried(job, reason, delay);
        }
    }

    fn on_completed(&self, job: &PublishJob) {
        for observer in &self.observers {
            observer.on_completed(job);
        }
    }

    fn on_failed(&self, job: &PublishJob, reason: &str) {
        for observer in &self.observers {
            observer.on_failed(job, reason);
        }
    }
}

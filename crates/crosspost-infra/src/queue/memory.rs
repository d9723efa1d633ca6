//! In-memory publish queue implementation.
//!
//! This is a fallback when Redis is not available. Jobs are held in memory
//! and processed by local worker tasks. Note: pending jobs are lost on
//! server restart, so scheduled posts do not survive a redeploy in this
//! mode.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Notify;
use tokio::time::{Duration, Instant};
use uuid::Uuid;

use crosspost_core::domain::PublishJob;
use crosspost_core::ports::{
    JobHandler, JobVerdict, NoopObserver, PublishQueue, QueueError, QueueObserver, QueueStats,
};

/// In-memory queue configuration.
#[derive(Debug, Clone)]
pub struct InMemoryQueueConfig {
    /// Number of worker tasks.
    pub workers: usize,
    /// Idle re-check interval when no job is pending.
    pub poll_interval: Duration,
    /// Bound on the retained completed-job history.
    pub completed_history: usize,
    /// Bound on the retained failed-job history.
    pub failed_history: usize,
}

impl Default for InMemoryQueueConfig {
    fn default() -> Self {
        Self {
            workers: 2,
            poll_interval: Duration::from_millis(250),
            completed_history: 100,
            failed_history: 500,
        }
    }
}

impl InMemoryQueueConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            workers: std::env::var("PUBLISH_QUEUE_WORKERS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.workers),
            ..defaults
        }
    }
}

struct QueuedJob {
    job: PublishJob,
    due: Instant,
}

#[derive(Default)]
struct State {
    /// Jobs waiting for their due time, keyed by job id.
    pending: HashMap<Uuid, QueuedJob>,
    /// Active job (pending or executing) per post.
    by_post: HashMap<Uuid, Uuid>,
    /// Jobs currently held by a worker.
    executing: HashSet<Uuid>,
    /// Advisory cancellations for executing jobs: no retry is scheduled.
    cancelled: HashSet<Uuid>,
    completed: VecDeque<PublishJob>,
    failed: VecDeque<(PublishJob, String)>,
}

enum Poll {
    Ready(PublishJob),
    NotDue(Instant),
    Empty,
}

impl State {
    /// Claim the earliest due job, moving it to executing. Removal under the
    /// lock is what makes delivery single-owner.
    fn claim_due(&mut self, now: Instant) -> Poll {
        let Some((&id, queued)) = self
            .pending
            .iter()
            .min_by_key(|(_, queued)| queued.due)
        else {
            return Poll::Empty;
        };
        if queued.due > now {
            return Poll::NotDue(queued.due);
        }
        let Some(queued) = self.pending.remove(&id) else {
            return Poll::Empty;
        };
        self.executing.insert(id);
        Poll::Ready(queued.job)
    }

    /// Drop the post mapping, but only if it still refers to this job - a
    /// replacement job may have taken the slot while this one executed.
    fn release(&mut self, job: &PublishJob) {
        self.executing.remove(&job.id);
        self.cancelled.remove(&job.id);
        if self.by_post.get(&job.post_id) == Some(&job.id) {
            self.by_post.remove(&job.post_id);
        }
    }
}

struct Inner {
    state: Mutex<State>,
    notify: Notify,
    observer: Arc<dyn QueueObserver>,
    completed_total: AtomicUsize,
    failed_total: AtomicUsize,
    completed_bound: usize,
    failed_bound: usize,
}

/// In-memory publish queue.
pub struct InMemoryPublishQueue {
    inner: Arc<Inner>,
    config: InMemoryQueueConfig,
}

impl InMemoryPublishQueue {
    pub fn new(config: InMemoryQueueConfig) -> Self {
        Self::with_observer(config, Arc::new(NoopObserver))
    }

    pub fn with_observer(config: InMemoryQueueConfig, observer: Arc<dyn QueueObserver>) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State::default()),
                notify: Notify::new(),
                observer,
                completed_total: AtomicUsize::new(0),
                failed_total: AtomicUsize::new(0),
                completed_bound: config.completed_history,
                failed_bound: config.failed_history,
            }),
            config,
        }
    }

    /// Most recent terminal jobs, newest last. Kept for observability.
    pub fn recent_completed(&self) -> Vec<PublishJob> {
        self.inner
            .state
            .lock()
            .unwrap()
            .completed
            .iter()
            .cloned()
            .collect()
    }

    pub fn recent_failed(&self) -> Vec<(PublishJob, String)> {
        self.inner
            .state
            .lock()
            .unwrap()
            .failed
            .iter()
            .cloned()
            .collect()
    }
}

impl Inner {
    fn record_completed(&self, job: PublishJob) {
        self.observer.on_completed(&job);
        self.completed_total.fetch_add(1, Ordering::Relaxed);
        let mut state = self.state.lock().unwrap();
        state.release(&job);
        state.completed.push_back(job);
        while state.completed.len() > self.completed_bound {
            state.completed.pop_front();
        }
    }

    fn record_failed(&self, job: PublishJob, reason: String) {
        self.observer.on_failed(&job, &reason);
        self.failed_total.fetch_add(1, Ordering::Relaxed);
        let mut state = self.state.lock().unwrap();
        state.release(&job);
        state.failed.push_back((job, reason));
        while state.failed.len() > self.failed_bound {
            state.failed.pop_front();
        }
    }

    fn reschedule(&self, mut job: PublishJob, reason: &str) {
        let delay = job.retry_delay();
        self.observer.on_retried(&job, reason, delay);
        job.due_at = Utc::now() + chrono::Duration::from_std(delay).unwrap_or_default();
        let mut state = self.state.lock().unwrap();
        state.executing.remove(&job.id);
        state.pending.insert(
            job.id,
            QueuedJob {
                due: Instant::now() + delay,
                job,
            },
        );
        drop(state);
        self.notify.notify_one();
    }

    async fn run_worker(self: Arc<Self>, worker_id: usize, handler: JobHandler, idle: Duration) {
        tracing::info!(worker_id, "Publish queue worker started");

        loop {
            let claimed = {
                let mut state = self.state.lock().unwrap();
                state.claim_due(Instant::now())
            };

            match claimed {
                Poll::Ready(mut job) => {
                    job.attempts += 1;
                    self.observer.on_started(&job);

                    let verdict = handler(job.clone()).await;
                    self.settle(job, verdict);
                }
                Poll::NotDue(due) => {
                    tokio::select! {
                        _ = self.notify.notified() => {}
                        _ = tokio::time::sleep_until(due) => {}
                    }
                }
                Poll::Empty => {
                    tokio::select! {
                        _ = self.notify.notified() => {}
                        _ = tokio::time::sleep(idle) => {}
                    }
                }
            }
        }
    }

    fn settle(&self, job: PublishJob, verdict: JobVerdict) {
        match verdict {
            JobVerdict::Completed => self.record_completed(job),
            JobVerdict::Retry(reason) => {
                let cancelled = self.state.lock().unwrap().cancelled.contains(&job.id);
                if cancelled {
                    self.record_failed(job, format!("Cancelled; retry suppressed: {reason}"));
                } else if job.attempts < job.max_attempts {
                    self.reschedule(job, &reason);
                } else {
                    self.record_failed(job, reason);
                }
            }
            JobVerdict::Failed(reason) => self.record_failed(job, reason),
        }
    }
}

#[async_trait]
impl PublishQueue for InMemoryPublishQueue {
    async fn enqueue(&self, job: PublishJob) -> Result<Uuid, QueueError> {
        let id = job.id;
        let delay = (job.due_at - Utc::now())
            .to_std()
            .unwrap_or(std::time::Duration::ZERO);

        self.inner.observer.on_enqueued(&job);
        {
            let mut state = self.inner.state.lock().unwrap();
            // One active job per post: a still-pending predecessor is
            // replaced outright.
            if let Some(&previous) = state.by_post.get(&job.post_id) {
                if state.pending.remove(&previous).is_some() {
                    tracing::debug!(job_id = %previous, post_id = %job.post_id, "Pending job replaced");
                }
            }
            state.by_post.insert(job.post_id, id);
            state.pending.insert(
                id,
                QueuedJob {
                    due: Instant::now() + delay,
                    job,
                },
            );
        }
        self.inner.notify.notify_one();
        Ok(id)
    }

    async fn cancel_for_post(&self, post_id: Uuid) -> Result<bool, QueueError> {
        let mut state = self.inner.state.lock().unwrap();
        let Some(&job_id) = state.by_post.get(&post_id) else {
            return Ok(false);
        };
        if state.pending.remove(&job_id).is_some() {
            state.by_post.remove(&post_id);
            tracing::debug!(job_id = %job_id, post_id = %post_id, "Pending job cancelled");
            return Ok(true);
        }
        // Already handed to a worker: let the in-flight attempt finish but
        // suppress any further retries.
        state.cancelled.insert(job_id);
        tracing::debug!(job_id = %job_id, post_id = %post_id, "Executing job cancelled (advisory)");
        Ok(false)
    }

    async fn active_job(&self, post_id: Uuid) -> Result<Option<Uuid>, QueueError> {
        Ok(self.inner.state.lock().unwrap().by_post.get(&post_id).copied())
    }

    async fn start_worker(&self, handler: JobHandler) -> Result<(), QueueError> {
        for worker_id in 0..self.config.workers {
            tokio::spawn(Arc::clone(&self.inner).run_worker(
                worker_id,
                handler.clone(),
                self.config.poll_interval,
            ));
        }
        Ok(())
    }

    async fn stats(&self) -> Result<QueueStats, QueueError> {
        let (pending, processing) = {
            let state = self.inner.state.lock().unwrap();
            (state.pending.len(), state.executing.len())
        };
        Ok(QueueStats {
            pending,
            processing,
            completed: self.inner.completed_total.load(Ordering::Relaxed),
            failed: self.inner.failed_total.load(Ordering::Relaxed),
        })
    }
}

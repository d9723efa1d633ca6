//! Redis publish queue implementation.
//!
//! The durable backend: jobs survive process restarts, which scheduled
//! posts due hours or days later depend on. Layout per queue name:
//!
//! - `{name}:delayed`   - sorted set of job ids scored by due time (ms)
//! - `{name}:jobs`      - hash of job id -> serialized job
//! - `{name}:by_post`   - hash of post id -> active job id
//! - `{name}:cancelled` - set of advisorily cancelled job ids
//! - `{name}:completed` / `{name}:failed` - bounded recent-history lists
//!
//! Workers poll the sorted set for due entries; the ZREM return value
//! decides which worker owns a job, so delivery is single-owner without
//! any coordination beyond Redis itself.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use tokio::sync::RwLock;
use uuid::Uuid;

use crosspost_core::domain::PublishJob;
use crosspost_core::ports::{
    JobHandler, JobVerdict, NoopObserver, PublishQueue, QueueError, QueueObserver, QueueStats,
};

/// Redis queue configuration.
#[derive(Debug, Clone)]
pub struct RedisQueueConfig {
    /// Redis connection URL.
    pub url: String,
    /// Connection establishment timeout.
    pub connect_timeout: Duration,
    /// Queue name/key prefix.
    pub queue_name: String,
    /// Number of worker consumers.
    pub workers: usize,
    /// Due-job poll interval.
    pub poll_interval: Duration,
    /// Bound on the retained completed-job history.
    pub completed_history: isize,
    /// Bound on the retained failed-job history.
    pub failed_history: isize,
}

impl Default for RedisQueueConfig {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379".to_string(),
            connect_timeout: Duration::from_secs(5),
            queue_name: "publish".to_string(),
            workers: 2,
            poll_interval: Duration::from_millis(500),
            completed_history: 100,
            failed_history: 500,
        }
    }
}

impl RedisQueueConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            url: std::env::var("REDIS_URL").unwrap_or(defaults.url),
            queue_name: std::env::var("PUBLISH_QUEUE_NAME").unwrap_or(defaults.queue_name),
            workers: std::env::var("PUBLISH_QUEUE_WORKERS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.workers),
            ..defaults
        }
    }
}

/// Redis-backed publish queue.
pub struct RedisPublishQueue {
    conn: ConnectionManager,
    config: RedisQueueConfig,
    observer: Arc<dyn QueueObserver>,
    counters: Arc<Counters>,
    running: Arc<RwLock<bool>>,
}

#[derive(Default)]
struct Counters {
    processing: AtomicUsize,
    completed: AtomicUsize,
    failed: AtomicUsize,
}

impl RedisPublishQueue {
    pub async fn new(config: RedisQueueConfig) -> Result<Self, QueueError> {
        Self::with_observer(config, Arc::new(NoopObserver)).await
    }

    pub async fn with_observer(
        config: RedisQueueConfig,
        observer: Arc<dyn QueueObserver>,
    ) -> Result<Self, QueueError> {
        let client =
            Client::open(config.url.as_str()).map_err(|e| QueueError::Backend(e.to_string()))?;

        // Use timeout to prevent hanging if Redis is unreachable.
        let conn = tokio::time::timeout(config.connect_timeout, ConnectionManager::new(client))
            .await
            .map_err(|_| QueueError::Backend("Connection timed out".to_string()))?
            .map_err(|e| QueueError::Backend(e.to_string()))?;

        tracing::info!(
            url = %config.url,
            queue = %config.queue_name,
            workers = config.workers,
            "Connected to Redis publish queue"
        );

        Ok(Self {
            conn,
            config,
            observer,
            counters: Arc::new(Counters::default()),
            running: Arc::new(RwLock::new(false)),
        })
    }

    pub async fn from_env() -> Result<Self, QueueError> {
        Self::new(RedisQueueConfig::from_env()).await
    }

    fn delayed_key(&self) -> String {
        format!("{}:delayed", self.config.queue_name)
    }

    fn jobs_key(&self) -> String {
        format!("{}:jobs", self.config.queue_name)
    }

    fn by_post_key(&self) -> String {
        format!("{}:by_post", self.config.queue_name)
    }

    fn cancelled_key(&self) -> String {
        format!("{}:cancelled", self.config.queue_name)
    }

    fn completed_key(&self) -> String {
        format!("{}:completed", self.config.queue_name)
    }

    fn failed_key(&self) -> String {
        format!("{}:failed", self.config.queue_name)
    }
}

fn backend(e: redis::RedisError) -> QueueError {
    QueueError::Backend(e.to_string())
}

struct WorkerContext {
    conn: ConnectionManager,
    keys: Keys,
    observer: Arc<dyn QueueObserver>,
    counters: Arc<Counters>,
    completed_bound: isize,
    failed_bound: isize,
}

#[derive(Clone)]
struct Keys {
    delayed: String,
    jobs: String,
    by_post: String,
    cancelled: String,
    completed: String,
    failed: String,
}

impl WorkerContext {
    /// Claim one due job. ZREM returning 1 means this worker won the race.
    async fn claim_due(&mut self) -> Result<Option<PublishJob>, QueueError> {
        let now_ms = Utc::now().timestamp_millis();
        let due: Vec<String> = self
            .conn
            .zrangebyscore_limit(&self.keys.delayed, "-inf", now_ms, 0, 1)
            .await
            .map_err(backend)?;
        let Some(job_id) = due.into_iter().next() else {
            return Ok(None);
        };

        let removed: i64 = self
            .conn
            .zrem(&self.keys.delayed, &job_id)
            .await
            .map_err(backend)?;
        if removed == 0 {
            // Another worker claimed it first.
            return Ok(None);
        }

        let payload: Option<String> = self
            .conn
            .hget(&self.keys.jobs, &job_id)
            .await
            .map_err(backend)?;
        let Some(payload) = payload else {
            tracing::warn!(job_id = %job_id, "Claimed job has no stored payload; dropping");
            return Ok(None);
        };

        serde_json::from_str(&payload)
            .map(Some)
            .map_err(|e| QueueError::Serialization(e.to_string()))
    }

    async fn persist(&mut self, job: &PublishJob) -> Result<(), QueueError> {
        let payload =
            serde_json::to_string(job).map_err(|e| QueueError::Serialization(e.to_string()))?;
        self.conn
            .hset::<_, _, _, ()>(&self.keys.jobs, job.id.to_string(), payload)
            .await
            .map_err(backend)
    }

    async fn archive(
        &mut self,
        key: &str,
        bound: isize,
        payload: String,
    ) -> Result<(), QueueError> {
        self.conn
            .lpush::<_, _, ()>(key, payload)
            .await
            .map_err(backend)?;
        self.conn
            .ltrim::<_, ()>(key, 0, bound - 1)
            .await
            .map_err(backend)
    }

    /// Drop all bookkeeping for a terminal job.
    async fn cleanup(&mut self, job: &PublishJob) -> Result<(), QueueError> {
        let job_id = job.id.to_string();
        let post_id = job.post_id.to_string();

        self.conn
            .hdel::<_, _, ()>(&self.keys.jobs, &job_id)
            .await
            .map_err(backend)?;
        self.conn
            .srem::<_, _, ()>(&self.keys.cancelled, &job_id)
            .await
            .map_err(backend)?;

        // Only release the post slot if a replacement has not taken it.
        let active: Option<String> = self
            .conn
            .hget(&self.keys.by_post, &post_id)
            .await
            .map_err(backend)?;
        if active.as_deref() == Some(job_id.as_str()) {
            self.conn
                .hdel::<_, _, ()>(&self.keys.by_post, &post_id)
                .await
                .map_err(backend)?;
        }
        Ok(())
    }

    async fn settle(&mut self, job: PublishJob, verdict: JobVerdict) -> Result<(), QueueError> {
        match verdict {
            JobVerdict::Completed => {
                self.observer.on_completed(&job);
                self.counters.completed.fetch_add(1, Ordering::Relaxed);
                let payload = serde_json::to_string(&job)
                    .map_err(|e| QueueError::Serialization(e.to_string()))?;
                let key = self.keys.completed.clone();
                self.archive(&key, self.completed_bound, payload).await?;
                self.cleanup(&job).await
            }
            JobVerdict::Retry(reason) => {
                let cancelled: bool = self
                    .conn
                    .sismember(&self.keys.cancelled, job.id.to_string())
                    .await
                    .map_err(backend)?;
                if cancelled {
                    let reason = format!("Cancelled; retry suppressed: {reason}");
                    return self.fail(job, reason).await;
                }
                if job.attempts >= job.max_attempts {
                    return self.fail(job, reason).await;
                }

                let delay = job.retry_delay();
                self.observer.on_retried(&job, &reason, delay);
                let mut job = job;
                job.due_at = Utc::now() + chrono::Duration::from_std(delay).unwrap_or_default();
                self.persist(&job).await?;
                self.conn
                    .zadd::<_, _, _, ()>(
                        &self.keys.delayed,
                        job.id.to_string(),
                        job.due_at.timestamp_millis(),
                    )
                    .await
                    .map_err(backend)
            }
            JobVerdict::Failed(reason) => self.fail(job, reason).await,
        }
    }

    async fn fail(&mut self, job: PublishJob, reason: String) -> Result<(), QueueError> {
        self.observer.on_failed(&job, &reason);
        self.counters.failed.fetch_add(1, Ordering::Relaxed);
        let payload = serde_json::json!({ "job": &job, "reason": reason }).to_string();
        let key = self.keys.failed.clone();
        self.archive(&key, self.failed_bound, payload).await?;
        self.cleanup(&job).await
    }
}

#[async_trait]
impl PublishQueue for RedisPublishQueue {
    async fn enqueue(&self, job: PublishJob) -> Result<Uuid, QueueError> {
        let mut conn = self.conn.clone();
        let job_id = job.id.to_string();
        let post_id = job.post_id.to_string();
        let payload =
            serde_json::to_string(&job).map_err(|e| QueueError::Enqueue(e.to_string()))?;

        // One active job per post: drop a still-pending predecessor.
        let previous: Option<String> = conn
            .hget(&self.by_post_key(), &post_id)
            .await
            .map_err(backend)?;
        if let Some(previous) = previous {
            let removed: i64 = conn
                .zrem(&self.delayed_key(), &previous)
                .await
                .map_err(backend)?;
            if removed > 0 {
                conn.hdel::<_, _, ()>(&self.jobs_key(), &previous)
                    .await
                    .map_err(backend)?;
                tracing::debug!(job_id = %previous, post_id = %post_id, "Pending job replaced");
            }
        }

        conn.hset::<_, _, _, ()>(&self.jobs_key(), &job_id, payload)
            .await
            .map_err(backend)?;
        conn.hset::<_, _, _, ()>(&self.by_post_key(), &post_id, &job_id)
            .await
            .map_err(backend)?;
        conn.zadd::<_, _, _, ()>(&self.delayed_key(), &job_id, job.due_at.timestamp_millis())
            .await
            .map_err(backend)?;

        self.observer.on_enqueued(&job);
        Ok(job.id)
    }

    async fn cancel_for_post(&self, post_id: Uuid) -> Result<bool, QueueError> {
        let mut conn = self.conn.clone();
        let post_key = post_id.to_string();

        let job_id: Option<String> = conn
            .hget(&self.by_post_key(), &post_key)
            .await
            .map_err(backend)?;
        let Some(job_id) = job_id else {
            return Ok(false);
        };

        let removed: i64 = conn
            .zrem(&self.delayed_key(), &job_id)
            .await
            .map_err(backend)?;
        if removed > 0 {
            conn.hdel::<_, _, ()>(&self.jobs_key(), &job_id)
                .await
                .map_err(backend)?;
            conn.hdel::<_, _, ()>(&self.by_post_key(), &post_key)
                .await
                .map_err(backend)?;
            tracing::debug!(job_id = %job_id, post_id = %post_id, "Pending job cancelled");
            return Ok(true);
        }

        // Already executing somewhere: suppress any further retries.
        conn.sadd::<_, _, ()>(&self.cancelled_key(), &job_id)
            .await
            .map_err(backend)?;
        tracing::debug!(job_id = %job_id, post_id = %post_id, "Executing job cancelled (advisory)");
        Ok(false)
    }

    async fn active_job(&self, post_id: Uuid) -> Result<Option<Uuid>, QueueError> {
        let mut conn = self.conn.clone();
        let job_id: Option<String> = conn
            .hget(&self.by_post_key(), post_id.to_string())
            .await
            .map_err(backend)?;
        Ok(job_id.and_then(|id| Uuid::parse_str(&id).ok()))
    }

    async fn start_worker(&self, handler: JobHandler) -> Result<(), QueueError> {
        *self.running.write().await = true;

        let keys = Keys {
            delayed: self.delayed_key(),
            jobs: self.jobs_key(),
            by_post: self.by_post_key(),
            cancelled: self.cancelled_key(),
            completed: self.completed_key(),
            failed: self.failed_key(),
        };

        for worker_id in 0..self.config.workers {
            let mut ctx = WorkerContext {
                conn: self.conn.clone(),
                keys: keys.clone(),
                observer: self.observer.clone(),
                counters: self.counters.clone(),
                completed_bound: self.config.completed_history,
                failed_bound: self.config.failed_history,
            };
            let handler = handler.clone();
            let running = self.running.clone();
            let poll_interval = self.config.poll_interval;
            let queue_name = self.config.queue_name.clone();

            tokio::spawn(async move {
                tracing::info!(worker_id, queue = %queue_name, "Publish queue worker started");

                loop {
                    if !*running.read().await {
                        tracing::info!(worker_id, "Worker stopping");
                        break;
                    }

                    let claimed = match ctx.claim_due().await {
                        Ok(claimed) => claimed,
                        Err(e) => {
                            tracing::error!(error = %e, "Redis poll error");
                            tokio::time::sleep(Duration::from_secs(1)).await;
                            continue;
                        }
                    };

                    let Some(mut job) = claimed else {
                        tokio::time::sleep(poll_interval).await;
                        continue;
                    };

                    job.attempts += 1;
                    // Persist the bumped attempt count so a crash mid-attempt
                    // cannot reset the retry budget.
                    if let Err(e) = ctx.persist(&job).await {
                        tracing::error!(error = %e, job_id = %job.id, "Failed to persist attempt");
                    }

                    ctx.counters.processing.fetch_add(1, Ordering::Relaxed);
                    ctx.observer.on_started(&job);

                    let verdict = handler(job.clone()).await;

                    ctx.counters.processing.fetch_sub(1, Ordering::Relaxed);
                    if let Err(e) = ctx.settle(job, verdict).await {
                        tracing::error!(error = %e, "Failed to settle job outcome");
                    }
                }
            });
        }

        Ok(())
    }

    async fn stats(&self) -> Result<QueueStats, QueueError> {
        let mut conn = self.conn.clone();
        let pending: usize = conn.zcard(&self.delayed_key()).await.map_err(backend)?;
        Ok(QueueStats {
            pending,
            processing: self.counters.processing.load(Ordering::Relaxed),
            completed: self.counters.completed.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use crosspost_core::domain::Platform;
    use tokio::sync::mpsc;

    async fn get_test_queue() -> Option<RedisPublishQueue> {
        let config = RedisQueueConfig {
            url: std::env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6389".to_string()),
            connect_timeout: Duration::from_secs(1),
            queue_name: format!("test_publish_{}", Uuid::new_v4().simple()),
            workers: 1,
            poll_interval: Duration::from_millis(100),
            ..Default::default()
        };

        RedisPublishQueue::new(config).await.ok()
    }

    #[tokio::test]
    async fn redis_round_trip_and_cancel() {
        let queue = match get_test_queue().await {
            Some(q) => q,
            None => return,
        };

        let (tx, mut rx) = mpsc::channel(4);
        queue
            .start_worker(Arc::new(move |job: PublishJob| {
                let tx = tx.clone();
                Box::pin(async move {
                    tx.send(job.id).await.unwrap();
                    JobVerdict::Completed
                })
            }))
            .await
            .unwrap();

        // A due job is delivered and archived.
        let job = PublishJob::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            vec![Platform::Facebook],
            ChronoDuration::zero(),
        );
        let id = queue.enqueue(job).await.unwrap();
        let delivered = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(delivered, id);

        // A far-future job can be cancelled before delivery.
        let scheduled = PublishJob::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            vec![Platform::Twitter],
            ChronoDuration::hours(1),
        );
        let post_id = scheduled.post_id;
        queue.enqueue(scheduled).await.unwrap();
        assert!(queue.active_job(post_id).await.unwrap().is_some());
        assert!(queue.cancel_for_post(post_id).await.unwrap());
        assert!(queue.active_job(post_id).await.unwrap().is_none());

        let stats = queue.stats().await.unwrap();
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.pending, 0);

        *queue.running.write().await = false;
    }
}

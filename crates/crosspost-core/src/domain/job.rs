use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Platform;

/// One queued unit of publish work.
///
/// The platform list is captured at enqueue time and never re-read from the
/// post, so edits racing an in-flight job only affect the next cycle. At most
/// one active job exists per post; re-scheduling replaces the pending job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishJob {
    pub id: Uuid,
    pub post_id: Uuid,
    pub workspace_id: Uuid,
    pub platforms: Vec<Platform>,
    pub requested_at: DateTime<Utc>,
    /// Earliest instant the job may be handed to a worker.
    pub due_at: DateTime<Utc>,
    pub attempts: u32,
    pub max_attempts: u32,
}

impl PublishJob {
    /// Retry policy: up to 3 attempts with exponential backoff.
    pub const MAX_ATTEMPTS: u32 = 3;
    /// Backoff base delay, doubled on every subsequent attempt.
    pub const RETRY_BASE_DELAY: std::time::Duration = std::time::Duration::from_secs(2);

    /// Create a job due after `delay` (zero for immediate publishing).
    pub fn new(post_id: Uuid, workspace_id: Uuid, platforms: Vec<Platform>, delay: Duration) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            post_id,
            workspace_id,
            platforms,
            requested_at: now,
            due_at: now + delay,
            attempts: 0,
            max_attempts: Self::MAX_ATTEMPTS,
        }
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.due_at <= now
    }

    pub fn attempts_exhausted(&self) -> bool {
        self.attempts >= self.max_attempts
    }

    /// Delay before the next retry: 2s, 4s, 8s, ...
    pub fn retry_delay(&self) -> std::time::Duration {
        let exponent = self.attempts.saturating_sub(1).min(16);
        Self::RETRY_BASE_DELAY * 2u32.pow(exponent)
    }
}

//! Scheduling service - the API-facing surface of the publishing subsystem.
//!
//! Owns every Draft/Scheduled lifecycle transition and the pairing between a
//! post and its single active publish job. Validation failures are rejected
//! here synchronously; nothing is enqueued for an invalid request.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::domain::{Platform, Post, PostStatus, PublishJob};
use crate::error::{RepoError, SchedulingError};
use crate::ports::{PostRepository, PublishQueue};

/// Input for creating a post.
#[derive(Debug, Clone)]
pub struct NewPost {
    pub workspace_id: Uuid,
    pub author_id: Uuid,
    pub content: String,
    pub platforms: Vec<Platform>,
    pub media_url: Option<String>,
    /// When present, the post is created directly in Scheduled.
    pub scheduled_at: Option<DateTime<Utc>>,
}

/// Partial update for an editable post. A `scheduled_at` here re-schedules;
/// clearing a schedule goes through `cancel_schedule` instead.
#[derive(Debug, Clone, Default)]
pub struct PostPatch {
    pub content: Option<String>,
    pub media_url: Option<String>,
    pub scheduled_at: Option<DateTime<Utc>>,
}

/// Post scheduling service.
pub struct PostScheduler {
    posts: Arc<dyn PostRepository>,
    queue: Arc<dyn PublishQueue>,
}

impl PostScheduler {
    pub fn new(posts: Arc<dyn PostRepository>, queue: Arc<dyn PublishQueue>) -> Self {
        Self { posts, queue }
    }

    /// Create a post in Draft, or directly in Scheduled with a queued job
    /// when `scheduled_at` is given.
    pub async fn create_post(&self, new: NewPost) -> Result<Post, SchedulingError> {
        if new.content.trim().is_empty() {
            return Err(SchedulingError::EmptyContent);
        }
        if new.platforms.is_empty() {
            return Err(SchedulingError::EmptyPlatforms);
        }
        if let Some(when) = new.scheduled_at {
            ensure_future(when)?;
        }

        let mut post = Post::new(new.workspace_id, new.author_id, new.content, new.platforms);
        post.media_url = new.media_url;
        if let Some(when) = new.scheduled_at {
            post.schedule(when)?;
        }

        let post = self.posts.save(post).await?;
        if let Some(when) = post.scheduled_at {
            if let Err(e) = self.replace_job(&post, when).await {
                self.revert_to_draft(&post).await;
                return Err(e);
            }
        }
        Ok(post)
    }

    /// Edit content/media and optionally re-schedule. Only Draft and
    /// Scheduled posts are editable; an in-flight job keeps the platform
    /// list it captured regardless.
    pub async fn update_post(&self, post_id: Uuid, patch: PostPatch) -> Result<Post, SchedulingError> {
        let mut post = self.load(post_id).await?;
        if !post.status.is_editable() {
            return Err(SchedulingError::NotEditable(post.status));
        }

        if let Some(content) = patch.content {
            if content.trim().is_empty() {
                return Err(SchedulingError::EmptyContent);
            }
            post.content = content;
        }
        if let Some(media_url) = patch.media_url {
            post.media_url = Some(media_url);
        }
        post.updated_at = Utc::now();

        match patch.scheduled_at {
            Some(when) => {
                ensure_future(when)?;
                post.schedule(when)?;
                let post = self.posts.save(post).await?;
                if let Err(e) = self.replace_job(&post, when).await {
                    self.revert_to_draft(&post).await;
                    return Err(e);
                }
                Ok(post)
            }
            None => Ok(self.posts.save(post).await?),
        }
    }

    /// Delete a post. A pending job is cancelled first; a post with an
    /// in-flight publish cannot be deleted until the cycle ends.
    pub async fn delete_post(&self, post_id: Uuid) -> Result<(), SchedulingError> {
        let post = self.load(post_id).await?;
        if post.status == PostStatus::Publishing {
            return Err(SchedulingError::NotEditable(post.status));
        }
        self.queue.cancel_for_post(post_id).await?;
        self.posts.delete(post_id).await?;
        Ok(())
    }

    /// Schedule (or re-schedule) a post for a strictly-future time.
    /// Returns the id of the queued job.
    pub async fn schedule(&self, post_id: Uuid, when: DateTime<Utc>) -> Result<Uuid, SchedulingError> {
        ensure_future(when)?;

        let mut post = self.load(post_id).await?;
        if post.status == PostStatus::Publishing {
            return Err(SchedulingError::AlreadyPublishing);
        }
        post.schedule(when)?;
        let post = self.posts.save(post).await?;
        match self.replace_job(&post, when).await {
            Ok(job_id) => Ok(job_id),
            Err(e) => {
                // Queue failure is fatal to this request; do not leave a
                // Scheduled post behind with no job to fire it.
                self.revert_to_draft(&post).await;
                Err(e)
            }
        }
    }

    /// Publish immediately. Rejected while any job is active for the post.
    pub async fn publish_now(&self, post_id: Uuid) -> Result<Uuid, SchedulingError> {
        let post = self.load(post_id).await?;
        if post.status == PostStatus::Publishing
            || self.queue.active_job(post_id).await?.is_some()
        {
            return Err(SchedulingError::AlreadyPublishing);
        }
        if !post.status.can_begin_publishing() && !post.status.is_terminal() {
            return Err(SchedulingError::InvalidTransition {
                from: post.status,
                to: PostStatus::Publishing,
            });
        }

        let previous = post.status;
        let post = match self
            .posts
            .transition(post_id, previous, PostStatus::Publishing)
            .await
        {
            Ok(post) => post,
            Err(RepoError::Conflict(_)) => return Err(SchedulingError::AlreadyPublishing),
            Err(e) => return Err(e.into()),
        };

        let job = PublishJob::new(
            post.id,
            post.workspace_id,
            post.platforms.clone(),
            Duration::zero(),
        );
        match self.queue.enqueue(job).await {
            Ok(job_id) => Ok(job_id),
            Err(e) => {
                // Queue failure is fatal to this request; put the post back.
                let _ = self
                    .posts
                    .transition(post_id, PostStatus::Publishing, previous)
                    .await;
                Err(e.into())
            }
        }
    }

    /// Cancel a pending schedule: the job is removed and the post reverts
    /// to Draft with its schedule cleared.
    pub async fn cancel_schedule(&self, post_id: Uuid) -> Result<Post, SchedulingError> {
        let mut post = self.load(post_id).await?;
        if post.status != PostStatus::Scheduled {
            return Err(SchedulingError::NoActiveSchedule);
        }
        self.queue.cancel_for_post(post_id).await?;
        post.cancel_schedule()?;
        Ok(self.posts.save(post).await?)
    }

    pub async fn get_post(&self, post_id: Uuid) -> Result<Post, SchedulingError> {
        self.load(post_id).await
    }

    pub async fn list_posts(
        &self,
        workspace_id: Uuid,
        status: Option<PostStatus>,
        limit: u64,
        offset: u64,
    ) -> Result<Vec<Post>, SchedulingError> {
        Ok(self
            .posts
            .list_by_workspace(workspace_id, status, limit, offset)
            .await?)
    }

    async fn load(&self, post_id: Uuid) -> Result<Post, SchedulingError> {
        self.posts
            .find_by_id(post_id)
            .await?
            .ok_or(SchedulingError::PostNotFound(post_id))
    }

    /// Cancel any pending job for the post and enqueue a fresh one due at
    /// `when`. One active job per post, always.
    async fn replace_job(&self, post: &Post, when: DateTime<Utc>) -> Result<Uuid, SchedulingError> {
        self.queue.cancel_for_post(post.id).await?;
        let delay = (when - Utc::now()).max(Duration::zero());
        let job = PublishJob::new(post.id, post.workspace_id, post.platforms.clone(), delay);
        Ok(self.queue.enqueue(job).await?)
    }

    /// Best-effort rollback after an enqueue failure.
    async fn revert_to_draft(&self, post: &Post) {
        let mut post = post.clone();
        if post.cancel_schedule().is_ok() {
            let _ = self.posts.save(post).await;
        }
    }
}

fn ensure_future(when: DateTime<Utc>) -> Result<(), SchedulingError> {
    if when <= Utc::now() {
        return Err(SchedulingError::InvalidSchedule);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::error::RepoError;
    use crate::ports::{JobHandler, QueueError, QueueStats};

    #[derive(Default)]
    struct FakeRepo {
        posts: Mutex<HashMap<Uuid, Post>>,
    }

    impl FakeRepo {
        fn insert(&self, post: Post) -> Uuid {
            let id = post.id;
            self.posts.lock().unwrap().insert(id, post);
            id
        }
    }

    #[async_trait]
    impl PostRepository for FakeRepo {
        async fn find_by_id(&self, id: Uuid) -> Result<Option<Post>, RepoError> {
            Ok(self.posts.lock().unwrap().get(&id).cloned())
        }

        async fn list_by_workspace(
            &self,
            workspace_id: Uuid,
            status: Option<PostStatus>,
            _limit: u64,
            _offset: u64,
        ) -> Result<Vec<Post>, RepoError> {
            Ok(self
                .posts
                .lock()
                .unwrap()
                .values()
                .filter(|p| p.workspace_id == workspace_id)
                .filter(|p| status.is_none_or(|s| p.status == s))
                .cloned()
                .collect())
        }

        async fn save(&self, post: Post) -> Result<Post, RepoError> {
            self.posts.lock().unwrap().insert(post.id, post.clone());
            Ok(post)
        }

        async fn delete(&self, id: Uuid) -> Result<(), RepoError> {
            self.posts
                .lock()
                .unwrap()
                .remove(&id)
                .map(|_| ())
                .ok_or(RepoError::NotFound)
        }

        async fn transition(
            &self,
            id: Uuid,
            expected: PostStatus,
            next: PostStatus,
        ) -> Result<Post, RepoError> {
            let mut posts = self.posts.lock().unwrap();
            let post = posts.get_mut(&id).ok_or(RepoError::NotFound)?;
            if post.status != expected {
                return Err(RepoError::Conflict(format!(
                    "expected {expected}, found {}",
                    post.status
                )));
            }
            post.status = next;
            Ok(post.clone())
        }
    }

    #[derive(Default)]
    struct FakeQueue {
        pending: Mutex<HashMap<Uuid, PublishJob>>,
        cancelled: Mutex<usize>,
    }

    impl FakeQueue {
        fn pending_for(&self, post_id: Uuid) -> Vec<PublishJob> {
            self.pending
                .lock()
                .unwrap()
                .values()
                .filter(|j| j.post_id == post_id)
                .cloned()
                .collect()
        }
    }

    #[async_trait]
    impl PublishQueue for FakeQueue {
        async fn enqueue(&self, job: PublishJob) -> Result<Uuid, QueueError> {
            let id = job.id;
            self.pending.lock().unwrap().insert(id, job);
            Ok(id)
        }

        async fn cancel_for_post(&self, post_id: Uuid) -> Result<bool, QueueError> {
            let mut pending = self.pending.lock().unwrap();
            let before = pending.len();
            pending.retain(|_, j| j.post_id != post_id);
            let removed = pending.len() < before;
            if removed {
                *self.cancelled.lock().unwrap() += 1;
            }
            Ok(removed)
        }

        async fn active_job(&self, post_id: Uuid) -> Result<Option<Uuid>, QueueError> {
            Ok(self
                .pending
                .lock()
                .unwrap()
                .values()
                .find(|j| j.post_id == post_id)
                .map(|j| j.id))
        }

        async fn start_worker(&self, _handler: JobHandler) -> Result<(), QueueError> {
            Ok(())
        }

        async fn stats(&self) -> Result<QueueStats, QueueError> {
            Ok(QueueStats::default())
        }
    }

    fn scheduler() -> (Arc<FakeRepo>, Arc<FakeQueue>, PostScheduler) {
        let repo = Arc::new(FakeRepo::default());
        let queue = Arc::new(FakeQueue::default());
        let scheduler = PostScheduler::new(repo.clone(), queue.clone());
        (repo, queue, scheduler)
    }

    fn new_post() -> NewPost {
        NewPost {
            workspace_id: Uuid::new_v4(),
            author_id: Uuid::new_v4(),
            content: "launch day!".to_owned(),
            platforms: vec![Platform::Facebook, Platform::Twitter],
            media_url: None,
            scheduled_at: None,
        }
    }

    #[tokio::test]
    async fn past_schedule_is_rejected_and_nothing_enqueued() {
        let (_, queue, scheduler) = scheduler();
        let post = scheduler.create_post(new_post()).await.unwrap();

        let result = scheduler
            .schedule(post.id, Utc::now() - Duration::minutes(10))
            .await;

        assert!(matches!(result, Err(SchedulingError::InvalidSchedule)));
        assert!(queue.pending.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn create_with_future_time_schedules_and_enqueues() {
        let (_, queue, scheduler) = scheduler();
        let mut new = new_post();
        let when = Utc::now() + Duration::minutes(10);
        new.scheduled_at = Some(when);

        let post = scheduler.create_post(new).await.unwrap();

        assert_eq!(post.status, PostStatus::Scheduled);
        assert_eq!(post.scheduled_at, Some(when));
        let jobs = queue.pending_for(post.id);
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].platforms, post.platforms);
        assert!(jobs[0].due_at > Utc::now() + Duration::minutes(9));
    }

    #[tokio::test]
    async fn rescheduling_replaces_the_pending_job() {
        let (_, queue, scheduler) = scheduler();
        let post = scheduler.create_post(new_post()).await.unwrap();

        let first = scheduler
            .schedule(post.id, Utc::now() + Duration::hours(1))
            .await
            .unwrap();
        let second = scheduler
            .schedule(post.id, Utc::now() + Duration::hours(2))
            .await
            .unwrap();

        assert_ne!(first, second);
        let jobs = queue.pending_for(post.id);
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].id, second);
    }

    #[tokio::test]
    async fn publish_now_rejected_while_a_job_is_active() {
        let (_, _, scheduler) = scheduler();
        let mut new = new_post();
        new.scheduled_at = Some(Utc::now() + Duration::hours(1));
        let post = scheduler.create_post(new).await.unwrap();

        let result = scheduler.publish_now(post.id).await;
        assert!(matches!(result, Err(SchedulingError::AlreadyPublishing)));
    }

    #[tokio::test]
    async fn publish_now_moves_post_to_publishing_with_immediate_job() {
        let (repo, queue, scheduler) = scheduler();
        let post = scheduler.create_post(new_post()).await.unwrap();

        let job_id = scheduler.publish_now(post.id).await.unwrap();

        let stored = repo.find_by_id(post.id).await.unwrap().unwrap();
        assert_eq!(stored.status, PostStatus::Publishing);
        let jobs = queue.pending_for(post.id);
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].id, job_id);
        assert!(jobs[0].is_due(Utc::now()));
    }

    #[tokio::test]
    async fn cancel_schedule_removes_job_and_reverts_to_draft() {
        let (_, queue, scheduler) = scheduler();
        let mut new = new_post();
        new.scheduled_at = Some(Utc::now() + Duration::hours(1));
        let post = scheduler.create_post(new).await.unwrap();

        let post = scheduler.cancel_schedule(post.id).await.unwrap();

        assert_eq!(post.status, PostStatus::Draft);
        assert_eq!(post.scheduled_at, None);
        assert!(queue.pending_for(post.id).is_empty());
    }

    #[tokio::test]
    async fn cancel_schedule_without_schedule_is_an_error() {
        let (_, _, scheduler) = scheduler();
        let post = scheduler.create_post(new_post()).await.unwrap();
        assert!(matches!(
            scheduler.cancel_schedule(post.id).await,
            Err(SchedulingError::NoActiveSchedule)
        ));
    }

    #[tokio::test]
    async fn empty_platform_list_is_rejected() {
        let (_, _, scheduler) = scheduler();
        let mut new = new_post();
        new.platforms.clear();
        assert!(matches!(
            scheduler.create_post(new).await,
            Err(SchedulingError::EmptyPlatforms)
        ));
    }

    #[tokio::test]
    async fn delete_cancels_pending_job_but_rejects_in_flight() {
        let (repo, queue, scheduler) = scheduler();
        let mut new = new_post();
        new.scheduled_at = Some(Utc::now() + Duration::hours(1));
        let post = scheduler.create_post(new).await.unwrap();

        scheduler.delete_post(post.id).await.unwrap();
        assert!(queue.pending_for(post.id).is_empty());
        assert!(repo.find_by_id(post.id).await.unwrap().is_none());

        let mut publishing = Post::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            "in flight".to_owned(),
            vec![Platform::Facebook],
        );
        publishing.begin_publishing().unwrap();
        let id = repo.insert(publishing);
        assert!(matches!(
            scheduler.delete_post(id).await,
            Err(SchedulingError::NotEditable(PostStatus::Publishing))
        ));
    }

    #[tokio::test]
    async fn update_rejected_outside_editable_states() {
        let (repo, _, scheduler) = scheduler();
        let mut post = Post::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            "done".to_owned(),
            vec![Platform::Facebook],
        );
        post.begin_publishing().unwrap();
        post.complete(PostStatus::Published).unwrap();
        let id = repo.insert(post);

        let result = scheduler
            .update_post(
                id,
                PostPatch {
                    content: Some("edited".to_owned()),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(result, Err(SchedulingError::NotEditable(_))));
    }
}

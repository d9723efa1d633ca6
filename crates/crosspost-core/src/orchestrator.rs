//! Publish orchestrator - the worker side of the publishing subsystem.
//!
//! Consumes one due job at a time, fans out to the platform publisher
//! sequentially, and drives the post to its terminal status. Platform
//! failures are captured as results and never escape past this boundary;
//! only the orchestrator's own faults (repository/storage errors) are
//! reported back to the queue for a job-level retry.

use std::sync::Arc;

use uuid::Uuid;

use crate::domain::{PlatformPublishResult, Post, PostStatus, PublishJob};
use crate::error::RepoError;
use crate::ports::{
    CredentialStore, JobVerdict, PlatformPublisher, PostRepository, PublishRequest,
};

/// Aggregate per-platform outcomes into the post's terminal status.
///
/// All succeeded -> Published; all failed -> Failed; mixed ->
/// PartiallyPublished (at least one platform carries the content, so the
/// cycle counts as a publish success).
pub fn terminal_status(results: &[PlatformPublishResult]) -> PostStatus {
    let succeeded = results.iter().filter(|r| r.success).count();
    if results.is_empty() || succeeded == 0 {
        PostStatus::Failed
    } else if succeeded == results.len() {
        PostStatus::Published
    } else {
        PostStatus::PartiallyPublished
    }
}

/// Worker that executes publish jobs handed over by the queue.
pub struct PublishOrchestrator {
    posts: Arc<dyn PostRepository>,
    credentials: Arc<dyn CredentialStore>,
    publisher: Arc<dyn PlatformPublisher>,
}

impl PublishOrchestrator {
    pub fn new(
        posts: Arc<dyn PostRepository>,
        credentials: Arc<dyn CredentialStore>,
        publisher: Arc<dyn PlatformPublisher>,
    ) -> Self {
        Self {
            posts,
            credentials,
            publisher,
        }
    }

    /// Process one due job. The returned verdict feeds the queue's retry
    /// policy: `Retry` for internal faults with attempts remaining, `Failed`
    /// once the ceiling is hit (the post is force-failed alongside).
    pub async fn process(&self, job: PublishJob) -> JobVerdict {
        match self.execute(&job).await {
            Ok(verdict) => verdict,
            Err(fault) => {
                if job.attempts_exhausted() {
                    self.force_fail(job.post_id, &fault).await;
                    JobVerdict::Failed(fault.to_string())
                } else {
                    JobVerdict::Retry(fault.to_string())
                }
            }
        }
    }

    async fn execute(&self, job: &PublishJob) -> Result<JobVerdict, RepoError> {
        let Some(post) = self.posts.find_by_id(job.post_id).await? else {
            // Post deleted since enqueue; nothing to do.
            return Ok(JobVerdict::Completed);
        };

        // Idempotency guard: a stale duplicate delivery for an already
        // finished cycle must not publish anything twice.
        if post.status.is_terminal() {
            return Ok(JobVerdict::Completed);
        }
        if !post.status.can_begin_publishing() {
            return Ok(JobVerdict::Completed);
        }

        let mut post = self
            .posts
            .transition(job.post_id, post.status, PostStatus::Publishing)
            .await?;

        let results = self.publish_all(job, &post).await;
        let terminal = terminal_status(&results);

        for result in results {
            post.record_result(result);
        }
        post.complete(terminal)
            .map_err(|e| RepoError::Conflict(e.to_string()))?;
        self.posts.save(post).await?;

        Ok(JobVerdict::Completed)
    }

    /// Invoke the adapter once per captured platform, sequentially. One
    /// platform's failure never aborts the remaining attempts.
    async fn publish_all(&self, job: &PublishJob, post: &Post) -> Vec<PlatformPublishResult> {
        let mut results = Vec::with_capacity(job.platforms.len());

        for &platform in &job.platforms {
            let credential = match self
                .credentials
                .access_token(job.workspace_id, platform)
                .await
            {
                Ok(credential) => credential,
                Err(e) => {
                    results.push(PlatformPublishResult::failed(platform, e.to_string()));
                    continue;
                }
            };

            let request = PublishRequest {
                platform,
                content: post.content.clone(),
                credential,
                media_url: post.media_url.clone(),
            };

            let result = match self.publisher.publish(&request).await {
                Ok(platform_post_id) => {
                    PlatformPublishResult::succeeded(platform, platform_post_id)
                }
                Err(e) => PlatformPublishResult::failed(platform, e.to_string()),
            };
            results.push(result);
        }

        results
    }

    /// Last-attempt fault path: mark the post Failed with the fault recorded
    /// so it does not linger in Publishing forever. Best effort.
    async fn force_fail(&self, post_id: Uuid, fault: &RepoError) {
        let Ok(Some(mut post)) = self.posts.find_by_id(post_id).await else {
            return;
        };
        if post.status.is_terminal() {
            return;
        }
        // A job that faulted before its Publishing transition leaves the
        // post in Scheduled; route through Publishing to reach Failed.
        if !post.status.can_transition_to(PostStatus::Failed) {
            let _ = post.begin_publishing();
        }
        if post.complete(PostStatus::Failed).is_ok() {
            post.error = Some(fault.to_string());
            let _ = self.posts.save(post).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use chrono::Duration;

    use super::*;
    use crate::domain::Platform;
    use crate::ports::{CredentialError, PlatformCredential, PublishError};

    #[derive(Default)]
    struct FakeRepo {
        posts: Mutex<HashMap<Uuid, Post>>,
        fail_saves: bool,
    }

    impl FakeRepo {
        fn failing() -> Self {
            Self {
                fail_saves: true,
                ..Default::default()
            }
        }

        fn insert(&self, post: Post) -> Uuid {
            let id = post.id;
            self.posts.lock().unwrap().insert(id, post);
            id
        }

        fn get(&self, id: Uuid) -> Post {
            self.posts.lock().unwrap().get(&id).cloned().unwrap()
        }
    }

    #[async_trait]
    impl PostRepository for FakeRepo {
        async fn find_by_id(&self, id: Uuid) -> Result<Option<Post>, RepoError> {
            Ok(self.posts.lock().unwrap().get(&id).cloned())
        }

        async fn list_by_workspace(
            &self,
            _workspace_id: Uuid,
            _status: Option<PostStatus>,
            _limit: u64,
            _offset: u64,
        ) -> Result<Vec<Post>, RepoError> {
            unimplemented!("not used by the orchestrator")
        }

        async fn save(&self, post: Post) -> Result<Post, RepoError> {
            // Failing mode still lets the force-fail write through, so the
            // exhaustion path is observable.
            if self.fail_saves && post.status != PostStatus::Failed {
                return Err(RepoError::Connection("storage offline".to_owned()));
            }
            self.posts.lock().unwrap().insert(post.id, post.clone());
            Ok(post)
        }

        async fn delete(&self, id: Uuid) -> Result<(), RepoError> {
            self.posts.lock().unwrap().remove(&id);
            Ok(())
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

    struct FakeCredentials {
        missing: Vec<Platform>,
    }

    impl FakeCredentials {
        fn all() -> Self {
            Self { missing: vec![] }
        }

        fn missing(platforms: Vec<Platform>) -> Self {
            Self { missing: platforms }
        }
    }

    #[async_trait]
    impl CredentialStore for FakeCredentials {
        async fn access_token(
            &self,
            workspace_id: Uuid,
            platform: Platform,
        ) -> Result<PlatformCredential, CredentialError> {
            if self.missing.contains(&platform) {
                return Err(CredentialError::NotConnected {
                    workspace_id,
                    platform,
                });
            }
            Ok(PlatformCredential {
                access_token: "token".to_owned(),
                account_ref: None,
            })
        }
    }

    /// Publisher scripted per platform; counts invocations.
    struct ScriptedPublisher {
        outcomes: HashMap<Platform, Result<String, String>>,
        calls: AtomicUsize,
    }

    impl ScriptedPublisher {
        fn new(outcomes: Vec<(Platform, Result<String, String>)>) -> Self {
            Self {
                outcomes: outcomes.into_iter().collect(),
                calls: AtomicUsize::new(0),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PlatformPublisher for ScriptedPublisher {
        async fn publish(&self, request: &PublishRequest) -> Result<String, PublishError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.outcomes.get(&request.platform) {
                Some(Ok(id)) => Ok(id.clone()),
                Some(Err(msg)) => Err(PublishError::Auth(msg.clone())),
                None => Err(PublishError::Unsupported(request.platform)),
            }
        }
    }

    fn post_with(platforms: Vec<Platform>) -> Post {
        Post::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            "ship it".to_owned(),
            platforms,
        )
    }

    fn job_for(post: &Post) -> PublishJob {
        let mut job = PublishJob::new(
            post.id,
            post.workspace_id,
            post.platforms.clone(),
            Duration::zero(),
        );
        job.attempts = 1;
        job
    }

    #[tokio::test]
    async fn all_successes_publish_the_post() {
        let repo = Arc::new(FakeRepo::default());
        let post = post_with(vec![Platform::Facebook, Platform::Twitter]);
        let job = job_for(&post);
        let id = repo.insert(post);

        let publisher = Arc::new(ScriptedPublisher::new(vec![
            (Platform::Facebook, Ok("fb_1".to_owned())),
            (Platform::Twitter, Ok("tw_1".to_owned())),
        ]));
        let orchestrator =
            PublishOrchestrator::new(repo.clone(), Arc::new(FakeCredentials::all()), publisher);

        assert_eq!(orchestrator.process(job).await, JobVerdict::Completed);

        let post = repo.get(id);
        assert_eq!(post.status, PostStatus::Published);
        assert!(post.published_at.is_some());
        assert_eq!(post.results.len(), 2);
        assert!(post.results.iter().all(|r| r.success));
    }

    #[tokio::test]
    async fn all_failures_fail_the_post() {
        let repo = Arc::new(FakeRepo::default());
        let post = post_with(vec![Platform::Facebook, Platform::Twitter]);
        let job = job_for(&post);
        let id = repo.insert(post);

        let publisher = Arc::new(ScriptedPublisher::new(vec![
            (Platform::Facebook, Err("expired".to_owned())),
            (Platform::Twitter, Err("expired".to_owned())),
        ]));
        let orchestrator =
            PublishOrchestrator::new(repo.clone(), Arc::new(FakeCredentials::all()), publisher);

        assert_eq!(orchestrator.process(job).await, JobVerdict::Completed);

        let post = repo.get(id);
        assert_eq!(post.status, PostStatus::Failed);
        assert!(post.failed_at.is_some());
        assert!(post.published_at.is_none());
    }

    #[tokio::test]
    async fn mixed_outcomes_partially_publish_with_both_results() {
        let repo = Arc::new(FakeRepo::default());
        let post = post_with(vec![Platform::Facebook, Platform::Twitter]);
        let job = job_for(&post);
        let id = repo.insert(post);

        let publisher = Arc::new(ScriptedPublisher::new(vec![
            (Platform::Facebook, Ok("fb_9".to_owned())),
            (Platform::Twitter, Err("token revoked".to_owned())),
        ]));
        let orchestrator =
            PublishOrchestrator::new(repo.clone(), Arc::new(FakeCredentials::all()), publisher);

        assert_eq!(orchestrator.process(job).await, JobVerdict::Completed);

        let post = repo.get(id);
        assert_eq!(post.status, PostStatus::PartiallyPublished);
        assert!(post.published_at.is_some());
        assert_eq!(post.results.len(), 2);
        assert_eq!(post.results[0].platform, Platform::Facebook);
        assert!(post.results[0].success);
        assert_eq!(post.results[0].platform_post_id.as_deref(), Some("fb_9"));
        assert_eq!(post.results[1].platform, Platform::Twitter);
        assert!(!post.results[1].success);
        assert!(
            post.results[1]
                .error
                .as_deref()
                .unwrap()
                .contains("token revoked")
        );
    }

    #[tokio::test]
    async fn terminal_post_is_a_no_op_with_zero_platform_calls() {
        let repo = Arc::new(FakeRepo::default());
        let mut post = post_with(vec![Platform::Facebook]);
        let job = job_for(&post);
        post.begin_publishing().unwrap();
        post.complete(PostStatus::Published).unwrap();
        let id = repo.insert(post);

        let publisher = Arc::new(ScriptedPublisher::new(vec![(
            Platform::Facebook,
            Ok("fb_dup".to_owned()),
        )]));
        let orchestrator = PublishOrchestrator::new(
            repo.clone(),
            Arc::new(FakeCredentials::all()),
            publisher.clone(),
        );

        assert_eq!(orchestrator.process(job).await, JobVerdict::Completed);
        assert_eq!(publisher.call_count(), 0);
        assert_eq!(repo.get(id).results.len(), 0);
    }

    #[tokio::test]
    async fn missing_post_is_a_no_op_success() {
        let repo = Arc::new(FakeRepo::default());
        let orphan = post_with(vec![Platform::Facebook]);
        let job = job_for(&orphan);

        let publisher = Arc::new(ScriptedPublisher::new(vec![]));
        let orchestrator = PublishOrchestrator::new(
            repo,
            Arc::new(FakeCredentials::all()),
            publisher.clone(),
        );

        assert_eq!(orchestrator.process(job).await, JobVerdict::Completed);
        assert_eq!(publisher.call_count(), 0);
    }

    #[tokio::test]
    async fn missing_credential_records_failure_without_aborting_others() {
        let repo = Arc::new(FakeRepo::default());
        let post = post_with(vec![Platform::Twitter, Platform::Facebook]);
        let job = job_for(&post);
        let id = repo.insert(post);

        let publisher = Arc::new(ScriptedPublisher::new(vec![(
            Platform::Facebook,
            Ok("fb_2".to_owned()),
        )]));
        let orchestrator = PublishOrchestrator::new(
            repo.clone(),
            Arc::new(FakeCredentials::missing(vec![Platform::Twitter])),
            publisher.clone(),
        );

        assert_eq!(orchestrator.process(job).await, JobVerdict::Completed);

        // Only facebook reached the adapter; twitter failed at credential
        // resolution but did not block facebook.
        assert_eq!(publisher.call_count(), 1);
        let post = repo.get(id);
        assert_eq!(post.status, PostStatus::PartiallyPublished);
        assert!(!post.results[0].success);
        assert!(post.results[1].success);
    }

    #[tokio::test]
    async fn internal_fault_retries_until_attempts_remain() {
        let repo = Arc::new(FakeRepo::failing());
        let post = post_with(vec![Platform::Facebook]);
        let mut job = job_for(&post);
        job.attempts = 1;
        repo.insert(post);

        let publisher = Arc::new(ScriptedPublisher::new(vec![(
            Platform::Facebook,
            Ok("fb_3".to_owned()),
        )]));
        let orchestrator =
            PublishOrchestrator::new(repo, Arc::new(FakeCredentials::all()), publisher);

        assert!(matches!(
            orchestrator.process(job).await,
            JobVerdict::Retry(_)
        ));
    }

    #[tokio::test]
    async fn internal_fault_on_final_attempt_fails_job_and_post() {
        let repo = Arc::new(FakeRepo::failing());
        let post = post_with(vec![Platform::Facebook]);
        let mut job = job_for(&post);
        job.attempts = job.max_attempts;
        let id = repo.insert(post);

        let publisher = Arc::new(ScriptedPublisher::new(vec![(
            Platform::Facebook,
            Ok("fb_4".to_owned()),
        )]));
        let orchestrator =
            PublishOrchestrator::new(repo.clone(), Arc::new(FakeCredentials::all()), publisher);

        assert!(matches!(
            orchestrator.process(job).await,
            JobVerdict::Failed(_)
        ));

        let post = repo.get(id);
        assert_eq!(post.status, PostStatus::Failed);
        assert!(post.failed_at.is_some());
        assert!(post.error.as_deref().unwrap().contains("storage offline"));
    }

    #[test]
    fn aggregation_rules() {
        let ok = PlatformPublishResult::succeeded(Platform::Facebook, "1".into());
        let err = PlatformPublishResult::failed(Platform::Twitter, "nope");

        assert_eq!(
            terminal_status(&[ok.clone(), ok.clone()]),
            PostStatus::Published
        );
        assert_eq!(
            terminal_status(&[err.clone(), err.clone()]),
            PostStatus::Failed
        );
        assert_eq!(terminal_status(&[ok, err]), PostStatus::PartiallyPublished);
        assert_eq!(terminal_status(&[]), PostStatus::Failed);
    }
}

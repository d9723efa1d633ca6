//! In-memory post repository.
//!
//! Reference implementation of the repository port, honoring the same
//! atomic compare-and-swap status contract as the PostgreSQL version. Used
//! when no database is configured; data is lost on restart.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crosspost_core::domain::{Post, PostStatus};
use crosspost_core::error::RepoError;
use crosspost_core::ports::PostRepository;

/// In-memory post store behind a single mutex; the lock serializes every
/// status transition, which is exactly the CAS contract.
pub struct InMemoryPostRepository {
    posts: Mutex<HashMap<Uuid, Post>>,
}

impl InMemoryPostRepository {
    pub fn new() -> Self {
        Self {
            posts: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryPostRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PostRepository for InMemoryPostRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Post>, RepoError> {
        Ok(self.posts.lock().unwrap().get(&id).cloned())
    }

    async fn list_by_workspace(
        &self,
        workspace_id: Uuid,
        status: Option<PostStatus>,
        limit: u64,
        offset: u64,
    ) -> Result<Vec<Post>, RepoError> {
        let posts = self.posts.lock().unwrap();
        let mut matching: Vec<Post> = posts
            .values()
            .filter(|p| p.workspace_id == workspace_id)
            .filter(|p| status.is_none_or(|s| p.status == s))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(matching
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
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
                "status is {}, expected {}",
                post.status, expected
            )));
        }
        post.status = next;
        post.updated_at = Utc::now();
        Ok(post.clone())
    }
}

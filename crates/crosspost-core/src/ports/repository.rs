use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{Post, PostStatus};
use crate::error::RepoError;

/// Post repository.
///
/// `transition` is the concurrency seam: it must compare-and-swap the status
/// column so a user edit and an in-flight job completion cannot lose updates
/// against each other.
#[async_trait]
pub trait PostRepository: Send + Sync {
    /// Find a post by its unique ID.
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Post>, RepoError>;

    /// Workspace-scoped listing, newest first, optionally filtered by status.
    async fn list_by_workspace(
        &self,
        workspace_id: Uuid,
        status: Option<PostStatus>,
        limit: u64,
        offset: u64,
    ) -> Result<Vec<Post>, RepoError>;

    /// Save a post (create or update).
    async fn save(&self, post: Post) -> Result<Post, RepoError>;

    /// Delete a post by its ID.
    async fn delete(&self, id: Uuid) -> Result<(), RepoError>;

    /// Atomically move a post from `expected` to `next` status.
    ///
    /// Returns the updated post, or `RepoError::Conflict` when the stored
    /// status no longer matches `expected`.
    async fn transition(
        &self,
        id: Uuid,
        expected: PostStatus,
        next: PostStatus,
    ) -> Result<Post, RepoError>;
}

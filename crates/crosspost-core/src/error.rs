//! Domain-level error types.

use thiserror::Error;
use uuid::Uuid;

use crate::domain::PostStatus;
use crate::ports::QueueError;

/// Scheduling and lifecycle errors - business rule failures surfaced at the
/// API boundary. These are never enqueued; a request that fails here has no
/// side effects beyond what the variant says.
#[derive(Debug, Error)]
pub enum SchedulingError {
    #[error("Post not found: {0}")]
    PostNotFound(Uuid),

    #[error("Scheduled time must be strictly in the future")]
    InvalidSchedule,

    #[error("A publish job is already active for this post")]
    AlreadyPublishing,

    #[error("At least one target platform is required")]
    EmptyPlatforms,

    #[error("Post content must not be empty")]
    EmptyContent,

    #[error("Post is not editable in status {0}")]
    NotEditable(PostStatus),

    #[error("Post has no active schedule")]
    NoActiveSchedule,

    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition { from: PostStatus, to: PostStatus },

    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// Repository-level errors.
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("Database connection failed: {0}")]
    Connection(String),

    #[error("Query execution failed: {0}")]
    Query(String),

    #[error("Entity not found")]
    NotFound,

    #[error("Concurrent modification: {0}")]
    Conflict(String),

    #[error("Constraint violation: {0}")]
    Constraint(String),
}

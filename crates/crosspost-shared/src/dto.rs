//! Data Transfer Objects - request/response types for the posts API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Request to create a post. Platforms are lowercase platform names
/// (`facebook`, `instagram`, ...); an unknown name is rejected up front.
/// A `scheduled_at` in the future creates the post directly in Scheduled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePostRequest {
    pub content: String,
    pub platforms: Vec<String>,
    #[serde(default)]
    pub media_url: Option<String>,
    #[serde(default)]
    pub scheduled_at: Option<DateTime<Utc>>,
}

/// Partial update of an editable post.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdatePostRequest {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub media_url: Option<String>,
    #[serde(default)]
    pub scheduled_at: Option<DateTime<Utc>>,
}

/// Request to schedule a post for a future time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulePostRequest {
    pub scheduled_at: DateTime<Utc>,
}

/// Listing filters for `GET /api/posts`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListPostsQuery {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub limit: Option<u64>,
    #[serde(default)]
    pub offset: Option<u64>,
}

/// One per-platform publish outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformResultResponse {
    pub platform: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform_post_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub attempted_at: DateTime<Utc>,
}

/// A post's full public representation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostResponse {
    pub id: String,
    pub workspace_id: String,
    pub author_id: String,
    pub content: String,
    pub platforms: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_url: Option<String>,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduled_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub results: Vec<PlatformResultResponse>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Returned by schedule/publish-now: the queued job's identifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobAccepted {
    pub job_id: String,
}

/// Publish status surface: the post's status plus per-platform results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostStatusResponse {
    pub id: String,
    pub status: String,
    pub results: Vec<PlatformResultResponse>,
}

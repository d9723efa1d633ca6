use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Platform;

/// Outcome of one platform attempt within a publish job execution.
///
/// Written only by the orchestrator and immutable once recorded. The error
/// detail preserves the raw platform message for diagnostics; it is not
/// sanitized for end-user display.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformPublishResult {
    pub platform: Platform,
    pub success: bool,
    /// Platform-assigned identifier of the published content.
    pub platform_post_id: Option<String>,
    pub error: Option<String>,
    pub attempted_at: DateTime<Utc>,
}

impl PlatformPublishResult {
    pub fn succeeded(platform: Platform, platform_post_id: String) -> Self {
        Self {
            platform,
            success: true,
            platform_post_id: Some(platform_post_id),
            error: None,
            attempted_at: Utc::now(),
        }
    }

    pub fn failed(platform: Platform, error: impl Into<String>) -> Self {
        Self {
            platform,
            success: false,
            platform_post_id: None,
            error: Some(error.into()),
            attempted_at: Utc::now(),
        }
    }
}

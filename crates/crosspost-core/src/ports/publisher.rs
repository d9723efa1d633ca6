//! Platform publisher port - uniform interface to one external platform.

use async_trait::async_trait;

use super::PlatformCredential;
use crate::domain::Platform;

/// Everything an adapter needs for one publish attempt. The credential is
/// resolved by the caller; content constraints are validated upstream.
#[derive(Debug, Clone)]
pub struct PublishRequest {
    pub platform: Platform,
    pub content: String,
    pub credential: PlatformCredential,
    /// Media attachment, required by image-first platforms.
    pub media_url: Option<String>,
}

/// Uniform publisher over all supported platforms.
///
/// One invocation performs exactly one external call sequence. A multi-step
/// platform flow (Instagram's container create + publish) is a single
/// logical operation: any step failing fails the whole call.
#[async_trait]
pub trait PlatformPublisher: Send + Sync {
    /// Publish the content, returning the platform-assigned post id.
    async fn publish(&self, request: &PublishRequest) -> Result<String, PublishError>;
}

/// Typed publish failure. The variant decides retry semantics downstream:
/// only `Transient` is worth retrying, and none of these trigger a
/// job-level retry on their own.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    /// Credential rejected or expired; requires user re-authentication.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Timeout, rate limit or upstream outage.
    #[error("Transient failure: {0}")]
    Transient(String),

    /// The platform rejected the content itself.
    #[error("Content rejected: {0}")]
    Permanent(String),

    /// No live integration for this platform - a configuration error,
    /// never a retryable fault.
    #[error("Platform {0} has no live integration")]
    Unsupported(Platform),
}

impl PublishError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

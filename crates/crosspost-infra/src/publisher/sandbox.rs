//! Sandbox publisher - fabricates platform post ids without network I/O.
//!
//! This is the fallback when no live platform credentials are configured.
//! Note: nothing actually reaches a platform in this mode.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;

use crosspost_core::ports::{PlatformPublisher, PublishError, PublishRequest};

/// Publisher that pretends every platform call succeeded.
pub struct SandboxPublisher {
    sequence: AtomicU64,
}

impl SandboxPublisher {
    pub fn new() -> Self {
        Self {
            sequence: AtomicU64::new(1),
        }
    }
}

impl Default for SandboxPublisher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PlatformPublisher for SandboxPublisher {
    async fn publish(&self, request: &PublishRequest) -> Result<String, PublishError> {
        let n = self.sequence.fetch_add(1, Ordering::Relaxed);
        let id = format!("{}_sandbox_{}", request.platform, n);
        tracing::info!(
            platform = %request.platform,
            platform_post_id = %id,
            "Sandbox publish (no network call made)"
        );
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crosspost_core::domain::Platform;
    use crosspost_core::ports::PlatformCredential;

    #[tokio::test]
    async fn every_platform_succeeds_with_unique_ids() {
        let publisher = SandboxPublisher::new();
        let mut seen = std::collections::HashSet::new();

        for platform in Platform::ALL {
            let request = PublishRequest {
                platform,
                content: "sandbox".to_owned(),
                credential: PlatformCredential {
                    access_token: "unused".to_owned(),
                    account_ref: None,
                },
                media_url: None,
            };
            let id = publisher.publish(&request).await.unwrap();
            assert!(id.starts_with(platform.as_str()));
            assert!(seen.insert(id));
        }
    }
}

//! Credential store port - resolves platform access tokens per workspace.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::Platform;

/// A resolved, currently-valid platform credential.
#[derive(Debug, Clone)]
pub struct PlatformCredential {
    pub access_token: String,
    /// Platform account handle the token is bound to: Facebook page id,
    /// Instagram business account id, LinkedIn person URN.
    pub account_ref: Option<String>,
}

/// Credential store. Refresh-on-expiry is the store's responsibility; the
/// orchestrator only ever sees tokens it can use immediately.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn access_token(
        &self,
        workspace_id: Uuid,
        platform: Platform,
    ) -> Result<PlatformCredential, CredentialError>;
}

/// Credential resolution errors.
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("No {platform} account connected for workspace {workspace_id}")]
    NotConnected {
        workspace_id: Uuid,
        platform: Platform,
    },

    #[error("Credential expired and could not be refreshed: {0}")]
    Expired(String),

    #[error("Credential backend error: {0}")]
    Backend(String),
}

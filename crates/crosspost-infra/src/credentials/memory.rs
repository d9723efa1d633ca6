//! In-memory credential store.
//!
//! Holds per-workspace platform tokens in process memory, with optional
//! process-wide defaults seeded from the environment. The OAuth connection
//! flow that would populate a real store lives outside this system; any
//! store that resolves currently-valid tokens satisfies the port.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crosspost_core::domain::Platform;
use crosspost_core::ports::{CredentialError, CredentialStore, PlatformCredential};

/// In-memory credential store with env-seeded defaults.
pub struct InMemoryCredentialStore {
    by_workspace: RwLock<HashMap<(Uuid, Platform), PlatformCredential>>,
    /// Fallback credentials applied to every workspace (development mode).
    defaults: HashMap<Platform, PlatformCredential>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self {
            by_workspace: RwLock::new(HashMap::new()),
            defaults: HashMap::new(),
        }
    }

    /// Seed process-wide default tokens from the environment.
    ///
    /// Format: `CROSSPOST_TOKEN_<PLATFORM>=<access-token>[,<account-ref>]`
    /// Example: `CROSSPOST_TOKEN_FACEBOOK=EAAB...,1234567890` (page id).
    pub fn from_env() -> Self {
        let mut defaults = HashMap::new();
        for platform in Platform::ALL {
            let key = format!("CROSSPOST_TOKEN_{}", platform.as_str().to_uppercase());
            if let Ok(value) = std::env::var(&key) {
                let (token, account_ref) = match value.split_once(',') {
                    Some((token, account)) => (token.to_string(), Some(account.to_string())),
                    None => (value, None),
                };
                defaults.insert(
                    platform,
                    PlatformCredential {
                        access_token: token,
                        account_ref,
                    },
                );
                tracing::info!(platform = %platform, "Default platform credential loaded");
            }
        }
        Self {
            by_workspace: RwLock::new(HashMap::new()),
            defaults,
        }
    }

    /// Store a credential for one workspace + platform pair.
    pub async fn connect(
        &self,
        workspace_id: Uuid,
        platform: Platform,
        credential: PlatformCredential,
    ) {
        self.by_workspace
            .write()
            .await
            .insert((workspace_id, platform), credential);
    }

    /// Remove a workspace's credential, e.g. after the user disconnects.
    pub async fn disconnect(&self, workspace_id: Uuid, platform: Platform) {
        self.by_workspace
            .write()
            .await
            .remove(&(workspace_id, platform));
    }
}

impl Default for InMemoryCredentialStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn access_token(
        &self,
        workspace_id: Uuid,
        platform: Platform,
    ) -> Result<PlatformCredential, CredentialError> {
        if let Some(credential) = self
            .by_workspace
            .read()
            .await
            .get(&(workspace_id, platform))
        {
            return Ok(credential.clone());
        }
        if let Some(credential) = self.defaults.get(&platform) {
            return Ok(credential.clone());
        }
        Err(CredentialError::NotConnected {
            workspace_id,
            platform,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn resolves_workspace_credential() {
        let store = InMemoryCredentialStore::new();
        let workspace = Uuid::new_v4();
        store
            .connect(
                workspace,
                Platform::Twitter,
                PlatformCredential {
                    access_token: "tw-token".to_owned(),
                    account_ref: None,
                },
            )
            .await;

        let credential = store
            .access_token(workspace, Platform::Twitter)
            .await
            .unwrap();
        assert_eq!(credential.access_token, "tw-token");
    }

    #[tokio::test]
    async fn unconnected_platform_is_an_error() {
        let store = InMemoryCredentialStore::new();
        let result = store
            .access_token(Uuid::new_v4(), Platform::LinkedIn)
            .await;
        assert!(matches!(result, Err(CredentialError::NotConnected { .. })));
    }

    #[tokio::test]
    async fn disconnect_removes_credential() {
        let store = InMemoryCredentialStore::new();
        let workspace = Uuid::new_v4();
        store
            .connect(
                workspace,
                Platform::Facebook,
                PlatformCredential {
                    access_token: "fb-token".to_owned(),
                    account_ref: Some("page-1".to_owned()),
                },
            )
            .await;
        store.disconnect(workspace, Platform::Facebook).await;

        assert!(
            store
                .access_token(workspace, Platform::Facebook)
                .await
                .is_err()
        );
    }
}

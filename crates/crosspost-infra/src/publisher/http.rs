//! HTTP platform publisher.
//!
//! One adapter covering the live platform integrations: Facebook page feed,
//! Instagram two-step container publishing, Twitter v2 tweets and LinkedIn
//! UGC shares. TikTok and YouTube are declared platforms without a live
//! integration and come back as `PublishError::Unsupported`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::{Value, json};

use crosspost_core::domain::Platform;
use crosspost_core::ports::{PlatformPublisher, PublishError, PublishRequest};

/// HTTP publisher configuration.
#[derive(Debug, Clone)]
pub struct HttpPublisherConfig {
    /// Per-request timeout; expiry is treated as a transient failure.
    pub timeout: Duration,
    pub graph_api_base: String,
    pub twitter_api_base: String,
    pub linkedin_api_base: String,
}

impl Default for HttpPublisherConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            graph_api_base: "https://graph.facebook.com/v18.0".to_string(),
            twitter_api_base: "https://api.twitter.com/2".to_string(),
            linkedin_api_base: "https://api.linkedin.com/v2".to_string(),
        }
    }
}

impl HttpPublisherConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            timeout: std::env::var("PUBLISHER_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            graph_api_base: std::env::var("GRAPH_API_BASE").unwrap_or(defaults.graph_api_base),
            twitter_api_base: std::env::var("TWITTER_API_BASE")
                .unwrap_or(defaults.twitter_api_base),
            linkedin_api_base: std::env::var("LINKEDIN_API_BASE")
                .unwrap_or(defaults.linkedin_api_base),
        }
    }
}

/// Publisher that talks to the real platform APIs.
pub struct HttpPlatformPublisher {
    client: reqwest::Client,
    config: HttpPublisherConfig,
}

impl HttpPlatformPublisher {
    pub fn new(config: HttpPublisherConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    /// POST `{graph}/{page-id|me}/feed` with the message and token.
    async fn publish_facebook(&self, request: &PublishRequest) -> Result<String, PublishError> {
        let target = request.credential.account_ref.as_deref().unwrap_or("me");
        let url = format!("{}/{}/feed", self.config.graph_api_base, target);

        let body = json!({
            "message": request.content,
            "access_token": request.credential.access_token,
        });

        let value = self.post_json(request.platform, &url, None, &body).await?;
        extract_id(&value, "id")
    }

    /// Instagram's two-step flow: create a media container, then publish it.
    /// The pair is one logical operation - a failure in either step fails
    /// the whole call, and no result is recorded for the half-done state.
    async fn publish_instagram(&self, request: &PublishRequest) -> Result<String, PublishError> {
        let account = request.credential.account_ref.as_deref().ok_or_else(|| {
            PublishError::Auth("No Instagram business account linked to this credential".into())
        })?;
        let image_url = request.media_url.as_deref().ok_or_else(|| {
            PublishError::Permanent("Instagram posts require a media attachment".into())
        })?;

        // Step 1: create the media container.
        let container_url = format!("{}/{}/media", self.config.graph_api_base, account);
        let container_body = json!({
            "image_url": image_url,
            "caption": request.content,
            "access_token": request.credential.access_token,
        });
        let container = self
            .post_json(request.platform, &container_url, None, &container_body)
            .await?;
        let creation_id = extract_id(&container, "id")?;

        // Step 2: publish the container.
        let publish_url = format!("{}/{}/media_publish", self.config.graph_api_base, account);
        let publish_body = json!({
            "creation_id": creation_id,
            "access_token": request.credential.access_token,
        });
        let published = self
            .post_json(request.platform, &publish_url, None, &publish_body)
            .await?;
        extract_id(&published, "id")
    }

    /// POST `{twitter}/tweets` with a bearer token.
    async fn publish_twitter(&self, request: &PublishRequest) -> Result<String, PublishError> {
        let url = format!("{}/tweets", self.config.twitter_api_base);
        let body = json!({ "text": request.content });

        let value = self
            .post_json(
                request.platform,
                &url,
                Some(&request.credential.access_token),
                &body,
            )
            .await?;
        value
            .pointer("/data/id")
            .and_then(Value::as_str)
            .map(str::to_owned)
            .ok_or_else(|| malformed(&value))
    }

    /// POST `{linkedin}/ugcPosts` as a UGC text share.
    async fn publish_linkedin(&self, request: &PublishRequest) -> Result<String, PublishError> {
        let author = request.credential.account_ref.as_deref().ok_or_else(|| {
            PublishError::Auth("No LinkedIn member URN linked to this credential".into())
        })?;
        let url = format!("{}/ugcPosts", self.config.linkedin_api_base);

        let body = json!({
            "author": author,
            "lifecycleState": "PUBLISHED",
            "specificContent": {
                "com.linkedin.ugc.ShareContent": {
                    "shareCommentary": { "text": request.content },
                    "shareMediaCategory": "NONE",
                }
            },
            "visibility": {
                "com.linkedin.ugc.MemberNetworkVisibility": "PUBLIC",
            },
        });

        let value = self
            .post_json(
                request.platform,
                &url,
                Some(&request.credential.access_token),
                &body,
            )
            .await?;
        extract_id(&value, "id")
    }

    /// Issue one POST and map transport/status failures into the publish
    /// error taxonomy.
    async fn post_json(
        &self,
        platform: Platform,
        url: &str,
        bearer: Option<&str>,
        body: &Value,
    ) -> Result<Value, PublishError> {
        let mut builder = self.client.post(url).timeout(self.config.timeout).json(body);
        if let Some(token) = bearer {
            builder = builder.bearer_auth(token);
        }

        let response = builder.send().await.map_err(transport_error)?;
        let status = response.status();
        let text = response.text().await.map_err(transport_error)?;

        if !status.is_success() {
            tracing::warn!(platform = %platform, %status, "Platform API rejected publish call");
            return Err(classify_status(status, &text));
        }

        serde_json::from_str(&text)
            .map_err(|e| PublishError::Permanent(format!("Malformed platform response: {e}")))
    }
}

#[async_trait]
impl PlatformPublisher for HttpPlatformPublisher {
    async fn publish(&self, request: &PublishRequest) -> Result<String, PublishError> {
        match request.platform {
            Platform::Facebook => self.publish_facebook(request).await,
            Platform::Instagram => self.publish_instagram(request).await,
            Platform::Twitter => self.publish_twitter(request).await,
            Platform::LinkedIn => self.publish_linkedin(request).await,
            Platform::TikTok | Platform::YouTube => {
                Err(PublishError::Unsupported(request.platform))
            }
        }
    }
}

/// Map an HTTP status to the error taxonomy: credential problems are Auth,
/// throttling and upstream outages are Transient, anything else the platform
/// said no to is Permanent.
fn classify_status(status: StatusCode, body: &str) -> PublishError {
    let detail = format!("{status}: {}", truncate(body, 512));
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => PublishError::Auth(detail),
        StatusCode::REQUEST_TIMEOUT | StatusCode::TOO_MANY_REQUESTS => {
            PublishError::Transient(detail)
        }
        s if s.is_server_error() => PublishError::Transient(detail),
        _ => PublishError::Permanent(detail),
    }
}

fn transport_error(e: reqwest::Error) -> PublishError {
    PublishError::Transient(e.to_string())
}

fn extract_id(value: &Value, key: &str) -> Result<String, PublishError> {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(str::to_owned)
        .ok_or_else(|| malformed(value))
}

fn malformed(value: &Value) -> PublishError {
    PublishError::Permanent(format!(
        "Platform response missing post id: {}",
        truncate(&value.to_string(), 512)
    ))
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

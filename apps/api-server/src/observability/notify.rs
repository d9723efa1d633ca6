//! Terminal publish outcome notifications.
//!
//! A queue observer that forwards completed/failed job outcomes to a
//! configured channel (webhook or console). Best-effort and non-blocking:
//! outcomes are pushed onto a bounded channel and dispatched by a background
//! task; when the channel is full the outcome is dropped with a warning
//! rather than stalling the queue.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

use crosspost_core::domain::PublishJob;
use crosspost_core::ports::QueueObserver;

/// A terminal job outcome, as delivered to the sink.
#[derive(Debug, Clone, serde::Serialize)]
pub struct JobOutcome {
    pub job_id: String,
    pub post_id: String,
    pub succeeded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub finished_at: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Failed to deliver outcome: {0}")]
    Delivery(String),
}

/// Sink for terminal outcomes - implement this for different backends.
#[async_trait]
pub trait OutcomeSender: Send + Sync {
    async fn send(&self, outcome: JobOutcome) -> Result<(), NotifyError>;
}

/// Console sink - logs outcomes (for development).
pub struct ConsoleOutcomeSender;

#[async_trait]
impl OutcomeSender for ConsoleOutcomeSender {
    async fn send(&self, outcome: JobOutcome) -> Result<(), NotifyError> {
        if outcome.succeeded {
            tracing::info!(
                post_id = %outcome.post_id,
                job_id = %outcome.job_id,
                "Publish outcome: completed"
            );
        } else {
            tracing::warn!(
                post_id = %outcome.post_id,
                job_id = %outcome.job_id,
                reason = outcome.reason.as_deref().unwrap_or("unknown"),
                "Publish outcome: failed"
            );
        }
        Ok(())
    }
}

/// Webhook sink - POSTs outcomes as JSON (Slack, dashboard, etc.).
pub struct WebhookOutcomeSender {
    url: String,
    client: reqwest::Client,
}

impl WebhookOutcomeSender {
    pub fn new(url: String) -> Self {
        Self {
            url,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl OutcomeSender for WebhookOutcomeSender {
    async fn send(&self, outcome: JobOutcome) -> Result<(), NotifyError> {
        self.client
            .post(&self.url)
            .json(&outcome)
            .send()
            .await
            .map_err(|e| NotifyError::Delivery(e.to_string()))?;
        Ok(())
    }
}

/// Queue observer that fans terminal outcomes out to the configured sink.
pub struct OutcomeNotifier {
    tx: mpsc::Sender<JobOutcome>,
}

impl OutcomeNotifier {
    pub fn new(sender: Arc<dyn OutcomeSender>) -> Self {
        let (tx, mut rx) = mpsc::channel::<JobOutcome>(100);

        tokio::spawn(async move {
            while let Some(outcome) = rx.recv().await {
                if let Err(e) = sender.send(outcome).await {
                    tracing::warn!("Outcome notification failed: {}", e);
                }
            }
        });

        Self { tx }
    }

    /// Webhook sink when `NOTIFY_WEBHOOK_URL` is set, console otherwise.
    pub fn from_env() -> Self {
        match std::env::var("NOTIFY_WEBHOOK_URL") {
            Ok(url) => {
                tracing::info!("Outcome webhook configured");
                Self::new(Arc::new(WebhookOutcomeSender::new(url)))
            }
            Err(_) => Self::new(Arc::new(ConsoleOutcomeSender)),
        }
    }

    fn push(&self, outcome: JobOutcome) {
        if self.tx.try_send(outcome).is_err() {
            tracing::warn!("Outcome channel full; notification dropped");
        }
    }
}

impl QueueObserver for OutcomeNotifier {
    fn on_completed(&self, job: &PublishJob) {
        self.push(JobOutcome {
            job_id: job.id.to_string(),
            post_id: job.post_id.to_string(),
            succeeded: true,
            reason: None,
            finished_at: Utc::now(),
        });
    }

    fn on_failed(&self, job: &PublishJob, reason: &str) {
        self.push(JobOutcome {
            job_id: job.id.to_string(),
            post_id: job.post_id.to_string(),
            succeeded: false,
            reason: Some(reason.to_string()),
            finished_at: Utc::now(),
        });
    }
}

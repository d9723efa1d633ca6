//! Application state - shared across all handlers.
//!
//! Wires the core services to concrete infrastructure, falling back to the
//! in-memory implementations whenever a durable backend is not configured
//! or unreachable, so the server always boots in development.

use std::sync::Arc;

use crosspost_core::ports::{
    CredentialStore, PlatformPublisher, PostRepository, PublishQueue, QueueObserver,
};
use crosspost_core::{PostScheduler, PublishOrchestrator};
use crosspost_infra::{
    FanoutObserver, HttpPlatformPublisher, HttpPublisherConfig, InMemoryCredentialStore,
    InMemoryPostRepository, InMemoryPublishQueue, InMemoryQueueConfig, SandboxPublisher,
    TracingQueueObserver,
};

use crate::config::{AppConfig, PublisherMode};
use crate::observability::OutcomeNotifier;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub scheduler: Arc<PostScheduler>,
    pub orchestrator: Arc<PublishOrchestrator>,
    pub queue: Arc<dyn PublishQueue>,
}

impl AppState {
    /// Build the application state with appropriate implementations.
    pub async fn new(config: &AppConfig) -> Self {
        let posts = Self::build_repository(config).await;

        let credentials: Arc<dyn CredentialStore> = Arc::new(InMemoryCredentialStore::from_env());

        let publisher: Arc<dyn PlatformPublisher> = match config.publisher_mode {
            PublisherMode::Live => {
                Arc::new(HttpPlatformPublisher::new(HttpPublisherConfig::from_env()))
            }
            PublisherMode::Sandbox => {
                tracing::warn!(
                    "PUBLISHER_MODE is sandbox - platform calls are simulated, nothing is published"
                );
                Arc::new(SandboxPublisher::new())
            }
        };

        let observer: Arc<dyn QueueObserver> = Arc::new(FanoutObserver::new(vec![
            Arc::new(TracingQueueObserver),
            Arc::new(OutcomeNotifier::from_env()),
        ]));
        let queue = Self::build_queue(config, observer).await;

        let scheduler = Arc::new(PostScheduler::new(posts.clone(), queue.clone()));
        let orchestrator = Arc::new(PublishOrchestrator::new(posts, credentials, publisher));

        tracing::info!("Application state initialized");

        Self {
            scheduler,
            orchestrator,
            queue,
        }
    }

    #[cfg(feature = "postgres")]
    async fn build_repository(config: &AppConfig) -> Arc<dyn PostRepository> {
        use crosspost_infra::PostgresPostRepository;
        use crosspost_infra::database::{self, DatabaseConfig};

        if let Some(settings) = &config.database {
            let db_config = DatabaseConfig {
                url: settings.url.clone(),
                max_connections: settings.max_connections,
                min_connections: settings.min_connections,
            };
            match database::connect(&db_config).await {
                Ok(conn) => return Arc::new(PostgresPostRepository::new(conn)),
                Err(e) => {
                    tracing::error!(
                        "Failed to connect to database: {}. Using in-memory fallback.",
                        e
                    );
                }
            }
        } else {
            tracing::warn!("DATABASE_URL not set. Posts are stored in memory only.");
        }
        Arc::new(InMemoryPostRepository::new())
    }

    #[cfg(not(feature = "postgres"))]
    async fn build_repository(_config: &AppConfig) -> Arc<dyn PostRepository> {
        tracing::info!("Running without postgres feature - using in-memory post repository");
        Arc::new(InMemoryPostRepository::new())
    }

    #[cfg(feature = "redis")]
    async fn build_queue(
        config: &AppConfig,
        observer: Arc<dyn QueueObserver>,
    ) -> Arc<dyn PublishQueue> {
        use crosspost_infra::{RedisPublishQueue, RedisQueueConfig};

        if config.redis_url.is_some() {
            match RedisPublishQueue::with_observer(RedisQueueConfig::from_env(), observer.clone())
                .await
            {
                Ok(queue) => return Arc::new(queue),
                Err(e) => {
                    tracing::error!(
                        "Failed to connect to Redis: {}. Scheduled posts will not survive restarts.",
                        e
                    );
                }
            }
        } else {
            tracing::warn!("REDIS_URL not set. Scheduled posts will not survive restarts.");
        }
        Arc::new(InMemoryPublishQueue::with_observer(
            InMemoryQueueConfig::from_env(),
            observer,
        ))
    }

    #[cfg(not(feature = "redis"))]
    async fn build_queue(
        _config: &AppConfig,
        observer: Arc<dyn QueueObserver>,
    ) -> Arc<dyn PublishQueue> {
        tracing::info!("Running without redis feature - using in-memory publish queue");
        Arc::new(InMemoryPublishQueue::with_observer(
            InMemoryQueueConfig::from_env(),
            observer,
        ))
    }
}

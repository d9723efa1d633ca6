//! # Crosspost Infrastructure
//!
//! Concrete implementations of the ports defined in `crosspost-core`.
//! This crate contains the publish queue backends, the platform publisher
//! adapters, credential storage and post persistence.
//!
//! ## Feature Flags
//!
//! - `full` (default) - All features enabled
//! - `minimal` - No external dependencies, in-memory only
//! - `postgres` - PostgreSQL post storage via SeaORM
//! - `redis` - Durable Redis-backed publish queue

pub mod credentials;
pub mod observer;
pub mod publisher;
pub mod queue;
pub mod repository;

#[cfg(feature = "postgres")]
pub mod database;

// Re-exports - In-Memory
pub use credentials::InMemoryCredentialStore;
pub use observer::{FanoutObserver, TracingQueueObserver};
pub use publisher::{HttpPlatformPublisher, HttpPublisherConfig, SandboxPublisher};
pub use queue::{InMemoryPublishQueue, InMemoryQueueConfig};
pub use repository::InMemoryPostRepository;

// Re-exports - PostgreSQL
#[cfg(feature = "postgres")]
pub use database::{DatabaseConfig, PostgresPostRepository};

// Re-exports - Redis
#[cfg(feature = "redis")]
pub use queue::{RedisPublishQueue, RedisQueueConfig};

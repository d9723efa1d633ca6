//! Ports - trait definitions for external dependencies.
//! These are the "interfaces" that infrastructure must implement.

mod credentials;
mod observer;
mod publisher;
mod queue;
mod repository;

pub use credentials::{CredentialError, CredentialStore, PlatformCredential};
pub use observer::{NoopObserver, QueueObserver};
pub use publisher::{PlatformPublisher, PublishError, PublishRequest};
pub use queue::{JobHandler, JobVerdict, PublishQueue, QueueError, QueueStats};
pub use repository::PostRepository;

//! Publish queue implementations.

mod memory;

pub use memory::{InMemoryPublishQueue, InMemoryQueueConfig};

#[cfg(feature = "redis")]
mod redis;
#[cfg(feature = "redis")]
pub use self::redis::{RedisPublishQueue, RedisQueueConfig};

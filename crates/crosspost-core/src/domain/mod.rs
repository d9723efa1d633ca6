//! Domain entities - the core business objects.

mod job;
mod platform;
mod post;
mod result;

pub use job::PublishJob;
pub use platform::Platform;
pub use post::{Post, PostStatus};
pub use result::PlatformPublishResult;

//! SeaORM entities for post persistence.

pub mod post;
pub mod post_result;

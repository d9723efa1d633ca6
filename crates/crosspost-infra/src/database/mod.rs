//! PostgreSQL persistence via SeaORM. Enabled with the `postgres` feature.

mod connections;
pub mod entity;
mod postgres_repo;

pub use connections::{DatabaseConfig, connect};
pub use postgres_repo::PostgresPostRepository;

#[cfg(test)]
mod tests;

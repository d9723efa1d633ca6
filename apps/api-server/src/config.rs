//! Application configuration loaded from environment variables.

use std::env;

/// How outbound platform calls are made.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublisherMode {
    /// Real platform API calls. Requires connected credentials.
    Live,
    /// Fabricated post ids, no network calls. The development default.
    Sandbox,
}

/// Primary database settings.
#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database: Option<DatabaseSettings>,
    pub redis_url: Option<String>,
    pub publisher_mode: PublisherMode,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let database = env::var("DATABASE_URL").ok().map(|url| DatabaseSettings {
            url,
            max_connections: env::var("DB_MAX_CONNECTIONS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(50),
            min_connections: env::var("DB_MIN_CONNECTIONS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5),
        });

        let publisher_mode = match env::var("PUBLISHER_MODE").as_deref() {
            Ok("live") => PublisherMode::Live,
            _ => PublisherMode::Sandbox,
        };

        Self {
            host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            database,
            redis_url: env::var("REDIS_URL").ok(),
            publisher_mode,
        }
    }
}

//! Health check endpoint.

use actix_web::{HttpResponse, web};
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub timestamp: String,
    pub queue: QueueHealth,
}

#[derive(Serialize)]
pub struct QueueHealth {
    pub pending: usize,
    pub processing: usize,
    pub completed: usize,
    pub failed: usize,
}

/// Health check endpoint - returns server status and queue depth.
///
/// GET /api/health
pub async fn health_check(state: web::Data<AppState>) -> HttpResponse {
    let queue = match state.queue.stats().await {
        Ok(stats) => QueueHealth {
            pending: stats.pending,
            processing: stats.processing,
            completed: stats.completed,
            failed: stats.failed,
        },
        Err(e) => {
            tracing::warn!("Queue stats unavailable: {}", e);
            QueueHealth {
                pending: 0,
                processing: 0,
                completed: 0,
                failed: 0,
            }
        }
    };

    let response = HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        timestamp: chrono::Utc::now().to_rfc3339(),
        queue,
    };

    HttpResponse::Ok().json(response)
}

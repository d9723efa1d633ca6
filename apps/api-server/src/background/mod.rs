//! Background publish worker wiring.

use std::sync::Arc;

use crosspost_core::ports::JobHandler;

use crate::state::AppState;

/// Attach the orchestrator to the queue and start consuming due jobs.
pub async fn start_publish_worker(state: &AppState) {
    let orchestrator = state.orchestrator.clone();
    let handler: JobHandler = Arc::new(move |job| {
        let orchestrator = orchestrator.clone();
        Box::pin(async move { orchestrator.process(job).await })
    });

    if let Err(e) = state.queue.start_worker(handler).await {
        tracing::error!("Failed to start publish workers: {}", e);
    }
}

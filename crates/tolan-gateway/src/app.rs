use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tokio::sync::mpsc;

use tolan_engine::Engine;

use crate::dispatch::InboundEvent;

/// Shared state for the Axum handlers: the engine (for dedup at intake) and
/// the dispatch queue.
pub struct AppState {
    pub engine: Arc<Engine>,
    pub events_tx: mpsc::UnboundedSender<InboundEvent>,
}

/// Assemble the router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/feishu/events", post(crate::http::events::events_handler))
        .route("/health", get(crate::http::health::health_handler))
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

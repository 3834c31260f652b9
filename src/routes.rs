use std::sync::Arc;

use axum::{routing::get, Json, Router};
use tower_http::trace::{DefaultMakeSpan, TraceLayer};
use tracing::Level;

use crate::handlers;
use crate::openapi::{get_openapi_spec, health_handler};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api-docs/openapi.json", get(|| async { Json(get_openapi_spec()) }))
        .fallback(handlers::control::control)
        .layer(TraceLayer::new_for_http().make_span_with(DefaultMakeSpan::new().level(Level::INFO)))
        .with_state(state)
}

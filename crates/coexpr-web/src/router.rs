//! Axum router: maps all URL paths to handlers.

use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

use crate::handlers::{
    compare::api_compare,
    groups::{api_groups, api_groups_export},
    health,
    pairs::api_pairs,
};
use crate::sse::pairs_stream;
use crate::state::{AppState, SharedState};

/// Build and return the full Axum router.
pub fn build_router(state: AppState) -> Router {
    let shared: SharedState = Arc::new(state);

    Router::new()
        .route("/health", get(health))

        // SSE streaming
        .route("/api/pairs/stream", get(pairs_stream))

        // API endpoints
        .route("/api/pairs",         get(api_pairs))
        .route("/api/compare",       get(api_compare))
        .route("/api/groups",        get(api_groups))
        .route("/api/groups/export", get(api_groups_export))

        // Middleware
        .layer(CorsLayer::permissive())
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(shared)
}

//! HTTP handlers for all web routes.

pub mod pairs;
pub mod compare;
pub mod groups;

/// GET /health
pub async fn health() -> &'static str {
    "ok"
}

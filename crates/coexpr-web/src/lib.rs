//! coexpr-web: HTTP surface for the co-expression engine.
//! Provides:
//!   - Ranked pair pages (JSON) and their progress stream (SSE)
//!   - Single-axis vector comparison
//!   - Hierarchical expression groups (JSON and CSV export)

pub mod router;
pub mod handlers;
pub mod state;
pub mod sse;
pub mod error;

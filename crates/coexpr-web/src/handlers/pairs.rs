//! Ranked pair pages.

use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;

use coexpr_engine::batch::process;
use coexpr_engine::pair_provider::PairRequest;

use crate::error::ApiError;
use crate::state::SharedState;

/// Query string shared by the JSON and SSE pair endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct PairQuery {
    pub mode: Option<String>,
    pub gene: Option<String>,
    pub genes1: Option<String>,
    pub genes2: Option<String>,
    pub page: Option<usize>,
    pub page_size: Option<usize>,
}

impl PairQuery {
    pub fn request(&self) -> PairRequest {
        PairRequest {
            mode: self.mode.clone(),
            gene: self.gene.clone(),
            genes1: self.genes1.clone(),
            genes2: self.genes2.clone(),
        }
    }
}

/// GET /api/pairs: one ranked page without progress events
pub async fn api_pairs(
    State(state): State<SharedState>,
    Query(query): Query<PairQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let pairs = query.request().resolve(state.pairs.as_ref()).await?;
    let outcome = process(
        &pairs,
        query.page.unwrap_or(1),
        query.page_size.unwrap_or(state.config.batch.page_size),
        state.store.as_ref(),
        &state.config.similarity,
        None,
    )
    .await?;
    Ok(Json(outcome))
}

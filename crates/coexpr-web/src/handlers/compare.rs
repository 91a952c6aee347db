//! Single-axis comparison of two entities' aligned vectors.

use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};

use coexpr_common::entities::Axis;
use coexpr_common::error::CoexprError;
use coexpr_engine::observation_provider::ObservationSource;
use coexpr_engine::similarity::SimilarityMetrics;
use coexpr_engine::vector::{self, AlignedVectors};

use crate::error::ApiError;
use crate::state::SharedState;

#[derive(Debug, Deserialize)]
pub struct CompareQuery {
    pub entity1: Option<String>,
    pub entity2: Option<String>,
    pub axis: Option<String>,
    /// Optional comma-separated category allowlist
    pub categories: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CompareResponse {
    pub entity1: String,
    pub entity2: String,
    pub axis: Axis,
    pub vectors: AlignedVectors,
    pub metrics: SimilarityMetrics,
}

/// GET /api/compare: aligned vectors and metrics on one axis
pub async fn api_compare(
    State(state): State<SharedState>,
    Query(query): Query<CompareQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let (entity1, entity2) = required_entities(query.entity1.as_deref(), query.entity2.as_deref())?;
    let axis: Axis = query.axis.as_deref().unwrap_or("tissue").parse()?;
    let allowlist: Option<Vec<String>> = query.categories.as_deref().map(|c| {
        c.split(',').map(str::trim).filter(|s| !s.is_empty()).map(String::from).collect()
    });

    let mut records = state.store.query(&entity1, axis, allowlist.as_deref()).await?;
    records.extend(state.store.query(&entity2, axis, allowlist.as_deref()).await?);

    let vectors = vector::build(&records, &entity1, &entity2, axis, allowlist.as_deref())?;
    let metrics = vectors.similarity(&state.config.similarity);

    Ok(Json(CompareResponse { entity1, entity2, axis, vectors, metrics }))
}

/// Both entity parameters, trimmed; `InvalidInput` if either is absent.
pub fn required_entities(e1: Option<&str>, e2: Option<&str>) -> Result<(String, String), CoexprError> {
    let clean = |e: Option<&str>| e.map(str::trim).filter(|s| !s.is_empty()).map(String::from);
    match (clean(e1), clean(e2)) {
        (Some(a), Some(b)) => Ok((a, b)),
        _ => Err(CoexprError::InvalidInput("entity1 and entity2 are required".to_string())),
    }
}

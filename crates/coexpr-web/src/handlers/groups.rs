//! Hierarchical expression groups (tissue → cell type by default).

use axum::{
    extract::{Query, State},
    http::header,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};

use coexpr_common::entities::{Axis, ObservedExpression};
use coexpr_common::error::CoexprError;
use coexpr_engine::aggregate::{self, DisplayGroup, GroupedExpression};
use coexpr_engine::observation_provider::ObservationSource;

use crate::error::ApiError;
use crate::handlers::compare::required_entities;
use crate::state::SharedState;

#[derive(Debug, Deserialize)]
pub struct GroupQuery {
    pub entity1: Option<String>,
    pub entity2: Option<String>,
    pub primary: Option<String>,
    pub secondary: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct GroupResponse {
    pub entity1: String,
    pub entity2: String,
    pub primary: Axis,
    pub secondary: Axis,
    pub groups: Vec<DisplayGroup>,
}

struct Grouping {
    entity1: String,
    entity2: String,
    primary: Axis,
    secondary: Axis,
    groups: GroupedExpression,
}

async fn build_groups(state: &SharedState, query: &GroupQuery) -> Result<Grouping, CoexprError> {
    let (entity1, entity2) = required_entities(query.entity1.as_deref(), query.entity2.as_deref())?;
    let primary: Axis = query.primary.as_deref().unwrap_or("tissue").parse()?;
    let secondary: Axis = query.secondary.as_deref().unwrap_or("cell_type").parse()?;
    if primary == secondary {
        return Err(CoexprError::InvalidInput("primary and secondary axes must differ".to_string()));
    }

    let mut records: Vec<ObservedExpression> = state.store.query(&entity1, primary, None).await?;
    records.extend(state.store.query(&entity2, primary, None).await?);
    let groups = aggregate::group(&records, &entity1, &entity2, primary, secondary);

    Ok(Grouping { entity1, entity2, primary, secondary, groups })
}

/// GET /api/groups: nested groups with display labels
pub async fn api_groups(
    State(state): State<SharedState>,
    Query(query): Query<GroupQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let g = build_groups(&state, &query).await?;
    Ok(Json(GroupResponse {
        groups: g.groups.to_display(),
        entity1: g.entity1,
        entity2: g.entity2,
        primary: g.primary,
        secondary: g.secondary,
    }))
}

/// GET /api/groups/export: the same groups as CSV
pub async fn api_groups_export(
    State(state): State<SharedState>,
    Query(query): Query<GroupQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let g = build_groups(&state, &query).await?;
    let mut buf = Vec::new();
    aggregate::write_csv(&g.groups, &mut buf, g.primary, g.secondary, &g.entity1, &g.entity2)?;
    let filename = format!("attachment; filename=\"{}\"", export_filename(&g.entity1, &g.entity2));
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, filename),
        ],
        buf,
    ))
}

/// `{entity1}_{entity2}.csv` restricted to `[A-Za-z0-9_-]`.
fn export_filename(entity1: &str, entity2: &str) -> String {
    let clean = |s: &str| -> String {
        s.chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect()
    };
    format!("{}_{}.csv", clean(entity1), clean(entity2))
}

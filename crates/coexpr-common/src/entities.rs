//! Core expression entity types shared by the engine and the web surface.
//! All of these are request-scoped: built from freshly supplied data and dropped
//! once a response has been produced.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoexprError;

/// Category key → intensity, ordered by raw key.
pub type CategoryProfile = BTreeMap<String, f64>;

// ---------------------------------------------------------------------------
// Observation
// ---------------------------------------------------------------------------

/// One raw (entity, tissue, cell type, cluster) intensity observation.
/// Several records may share the same entity/tissue/cell type when a cell type
/// was split into multiple clusters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservedExpression {
    pub entity_id: String,
    pub entity_display_name: String,
    pub tissue_category: String,
    pub cell_category: String,
    #[serde(default)]
    pub cluster_label: String,
    /// nTPM-equivalent, expected ≥ 0
    pub intensity: f64,
}

impl ObservedExpression {
    /// Case-insensitive match against the canonical id or the display name.
    pub fn matches_entity(&self, query: &str) -> bool {
        let q = query.trim();
        !q.is_empty()
            && (self.entity_id.eq_ignore_ascii_case(q)
                || self.entity_display_name.eq_ignore_ascii_case(q))
    }

    /// Raw category key of this record on the given axis.
    pub fn category(&self, axis: Axis) -> &str {
        match axis {
            Axis::Tissue => &self.tissue_category,
            Axis::CellType => &self.cell_category,
            Axis::Cluster => &self.cluster_label,
        }
    }
}

// ---------------------------------------------------------------------------
// Axis
// ---------------------------------------------------------------------------

/// Categorical dimension an observation can be keyed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Axis {
    Tissue,
    CellType,
    Cluster,
}

impl Axis {
    pub fn as_str(&self) -> &'static str {
        match self {
            Axis::Tissue => "tissue",
            Axis::CellType => "cell_type",
            Axis::Cluster => "cluster",
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Axis {
    type Err = CoexprError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tissue" => Ok(Axis::Tissue),
            "cell_type" | "cell" | "celltype" => Ok(Axis::CellType),
            "cluster" => Ok(Axis::Cluster),
            other => Err(CoexprError::InvalidInput(format!("unknown axis '{other}'"))),
        }
    }
}

// ---------------------------------------------------------------------------
// Pair / Profile
// ---------------------------------------------------------------------------

/// An ordered association between two entities compared for co-expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityPair {
    pub p1_id: String,
    pub p1_name: String,
    pub p2_id: String,
    pub p2_name: String,
}

impl EntityPair {
    pub fn new(p1_id: impl Into<String>, p1_name: impl Into<String>, p2_id: impl Into<String>, p2_name: impl Into<String>) -> Self {
        Self {
            p1_id: p1_id.into(),
            p1_name: p1_name.into(),
            p2_id: p2_id.into(),
            p2_name: p2_name.into(),
        }
    }

    /// Pair whose display names are just the identifiers.
    pub fn from_ids(p1: &str, p2: &str) -> Self {
        Self::new(p1, p1, p2, p2)
    }

    /// Label used in pair-scoped error messages.
    pub fn label(&self) -> String {
        format!("{}–{}", self.p1_id, self.p2_id)
    }
}

/// Expression profile of a single entity across both axes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityProfile {
    pub id: String,
    pub display_name: String,
    pub tissue: CategoryProfile,
    pub cell: CategoryProfile,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> ObservedExpression {
        ObservedExpression {
            entity_id: "ENSG00000138798".into(),
            entity_display_name: "EGF".into(),
            tissue_category: "small_intestine".into(),
            cell_category: "enterocytes".into(),
            cluster_label: "c-3".into(),
            intensity: 12.5,
        }
    }

    #[test]
    fn test_matches_id_or_name_case_insensitive() {
        let r = record();
        assert!(r.matches_entity("egf"));
        assert!(r.matches_entity("ensg00000138798"));
        assert!(!r.matches_entity("EGFR"));
        assert!(!r.matches_entity("  "));
    }

    #[test]
    fn test_axis_parse() {
        assert_eq!("cell".parse::<Axis>().unwrap(), Axis::CellType);
        assert_eq!("Tissue".parse::<Axis>().unwrap(), Axis::Tissue);
        assert!("organ".parse::<Axis>().is_err());
    }

    #[test]
    fn test_category_by_axis() {
        let r = record();
        assert_eq!(r.category(Axis::Tissue), "small_intestine");
        assert_eq!(r.category(Axis::CellType), "enterocytes");
        assert_eq!(r.category(Axis::Cluster), "c-3");
    }
}

//! Vector builder: aligns two entities' observations over one shared,
//! lexicographically ordered category set.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use serde::Serialize;
use tracing::debug;

use coexpr_common::config::SimilarityConfig;
use coexpr_common::entities::{Axis, CategoryProfile, ObservedExpression};
use coexpr_common::error::{CoexprError, Result};

use crate::similarity::{self, SimilarityMetrics};

/// Two category vectors sharing the same index → category mapping.
/// Construction guarantees all three sequences have equal length.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AlignedVectors {
    categories: Vec<String>,
    v1: Vec<f64>,
    v2: Vec<f64>,
}

impl AlignedVectors {
    pub fn new(categories: Vec<String>, v1: Vec<f64>, v2: Vec<f64>) -> Result<Self> {
        if v1.len() != v2.len() {
            return Err(CoexprError::LengthMismatch { left: v1.len(), right: v2.len() });
        }
        if categories.len() != v1.len() {
            return Err(CoexprError::LengthMismatch { left: categories.len(), right: v1.len() });
        }
        Ok(Self { categories, v1, v2 })
    }

    pub fn categories(&self) -> &[String] { &self.categories }
    pub fn v1(&self) -> &[f64] { &self.v1 }
    pub fn v2(&self) -> &[f64] { &self.v2 }
    pub fn len(&self) -> usize { self.v1.len() }
    pub fn is_empty(&self) -> bool { self.v1.is_empty() }

    /// `self` followed by `other`, position by position.
    pub fn concat(&self, other: &AlignedVectors) -> AlignedVectors {
        let mut out = self.clone();
        out.categories.extend(other.categories.iter().cloned());
        out.v1.extend_from_slice(&other.v1);
        out.v2.extend_from_slice(&other.v2);
        out
    }

    pub fn similarity(&self, cfg: &SimilarityConfig) -> SimilarityMetrics {
        // lengths are equal by construction
        similarity::compute(&self.v1, &self.v2, cfg).unwrap_or_default()
    }
}

/// Build aligned vectors for two entities from raw observations on one axis.
///
/// Entities are matched case-insensitively by id or display name. The category
/// set is the union of both entities' categories, optionally restricted to
/// `allowlist`, minus categories where both intensities are zero.
/// Returns `NotFound` if no record matches either entity.
pub fn build(
    records: &[ObservedExpression],
    entity1: &str,
    entity2: &str,
    axis: Axis,
    allowlist: Option<&[String]>,
) -> Result<AlignedVectors> {
    let p1 = reduce(records, entity1, axis)
        .ok_or_else(|| CoexprError::NotFound(entity1.to_string()))?;
    let p2 = reduce(records, entity2, axis)
        .ok_or_else(|| CoexprError::NotFound(entity2.to_string()))?;
    align(&p1, &p2, allowlist)
}

/// Align two category → intensity maps. Missing categories count as zero.
pub fn align(
    p1: &CategoryProfile,
    p2: &CategoryProfile,
    allowlist: Option<&[String]>,
) -> Result<AlignedVectors> {
    let allowed: Option<HashSet<String>> =
        allowlist.map(|list| list.iter().map(|c| c.to_lowercase()).collect());

    let categories: Vec<String> = p1
        .keys()
        .chain(p2.keys())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .filter(|c| allowed.as_ref().map_or(true, |set| set.contains(&c.to_lowercase())))
        .filter(|c| value(p1, c) != 0.0 || value(p2, c) != 0.0)
        .cloned()
        .collect();

    let v1 = categories.iter().map(|c| value(p1, c)).collect();
    let v2 = categories.iter().map(|c| value(p2, c)).collect();
    AlignedVectors::new(categories, v1, v2)
}

/// Collapse one entity's records on `axis` into a category profile, averaging
/// duplicate categories (e.g. several clusters of one cell type).
/// Returns `None` if no record matches the entity at all.
pub fn reduce(records: &[ObservedExpression], entity: &str, axis: Axis) -> Option<CategoryProfile> {
    let mut matched = false;
    let mut acc: BTreeMap<String, (f64, usize)> = BTreeMap::new();

    for r in records.iter().filter(|r| r.matches_entity(entity)) {
        matched = true;
        let category = r.category(axis);
        if category.is_empty() || !r.intensity.is_finite() || r.intensity < 0.0 {
            debug!(entity, category, intensity = r.intensity, "Skipping unusable observation");
            continue;
        }
        let slot = acc.entry(category.to_string()).or_insert((0.0, 0));
        slot.0 += r.intensity;
        slot.1 += 1;
    }

    matched.then(|| {
        acc.into_iter()
            .map(|(c, (sum, n))| (c, sum / n as f64))
            .collect()
    })
}

fn value(profile: &CategoryProfile, category: &str) -> f64 {
    profile.get(category).copied().unwrap_or(0.0)
}

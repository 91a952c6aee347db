//! Candidate pair sources.
//!
//! Pairs come either from a curated relation set (e.g. known ligand/receptor
//! interactions) or, in compare mode, from the cartesian product of two
//! user-supplied identifier lists.

use std::io::Read;
use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use coexpr_common::entities::EntityPair;
use coexpr_common::error::{CoexprError, Result};

/// Trait for looking up curated pairs.
#[async_trait]
pub trait PairSource: Send + Sync {
    /// Pairs in which either side matches `query` (id or name, case-insensitive).
    async fn pairs_for(&self, query: &str) -> Result<Vec<EntityPair>>;
}

// ── Curated pairs ────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct CuratedRow {
    ligand: String,
    #[serde(default)]
    ligand_name: Option<String>,
    receptor: String,
    #[serde(default)]
    receptor_name: Option<String>,
}

/// Curated relation set held in memory.
///
/// CSV header: `ligand,ligand_name,receptor,receptor_name` (names optional).
#[derive(Debug, Clone, Default)]
pub struct CuratedPairs {
    pairs: Vec<EntityPair>,
}

impl CuratedPairs {
    pub fn new(pairs: Vec<EntityPair>) -> Self {
        Self { pairs }
    }

    pub fn from_csv_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)
            .map_err(|e| CoexprError::Source(format!("cannot open {}: {e}", path.display())))?;
        let source = Self::from_reader(file)?;
        info!("Loaded {} curated pairs from {:?}", source.len(), path);
        Ok(source)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::Reader::from_reader(reader);
        let mut pairs = Vec::new();
        for row in rdr.deserialize::<CuratedRow>() {
            let row = row?;
            let ligand_name = row.ligand_name.filter(|n| !n.is_empty()).unwrap_or_else(|| row.ligand.clone());
            let receptor_name = row.receptor_name.filter(|n| !n.is_empty()).unwrap_or_else(|| row.receptor.clone());
            pairs.push(EntityPair::new(row.ligand, ligand_name, row.receptor, receptor_name));
        }
        Ok(Self { pairs })
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

#[async_trait]
impl PairSource for CuratedPairs {
    async fn pairs_for(&self, query: &str) -> Result<Vec<EntityPair>> {
        let q = query.trim();
        Ok(self
            .pairs
            .iter()
            .filter(|p| {
                [&p.p1_id, &p.p1_name, &p.p2_id, &p.p2_name]
                    .iter()
                    .any(|s| s.eq_ignore_ascii_case(q))
            })
            .cloned()
            .collect())
    }
}

// ── Compare mode ─────────────────────────────────────────────────────────────

/// Cartesian product of two comma-separated identifier lists, in input order.
pub fn compare_pairs(list1: &str, list2: &str) -> Result<Vec<EntityPair>> {
    let first = split_ids(list1);
    let second = split_ids(list2);
    if first.is_empty() || second.is_empty() {
        return Err(CoexprError::InvalidInput(
            "compare mode needs two non-empty identifier lists".to_string(),
        ));
    }
    Ok(first
        .iter()
        .flat_map(|a| second.iter().map(move |b| EntityPair::from_ids(a, b)))
        .collect())
}

fn split_ids(list: &str) -> Vec<&str> {
    list.split(',').map(str::trim).filter(|s| !s.is_empty()).collect()
}

// ── Request resolution ───────────────────────────────────────────────────────

/// Which pairs a request asks for.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PairRequest {
    /// `curated` (default) or `compare`
    pub mode: Option<String>,
    /// Identifier queried against the curated set
    pub gene: Option<String>,
    /// Compare mode: first comma-separated list
    pub genes1: Option<String>,
    /// Compare mode: second comma-separated list
    pub genes2: Option<String>,
}

impl PairRequest {
    /// Resolve the full candidate list. Missing parameters are `InvalidInput`;
    /// a failing pair source surfaces as `Source`.
    pub async fn resolve(&self, source: &dyn PairSource) -> Result<Vec<EntityPair>> {
        match self.mode.as_deref().map(str::trim) {
            Some("compare") => {
                let (Some(g1), Some(g2)) = (self.genes1.as_deref(), self.genes2.as_deref()) else {
                    return Err(CoexprError::InvalidInput(
                        "compare mode requires genes1 and genes2".to_string(),
                    ));
                };
                compare_pairs(g1, g2)
            }
            None | Some("") | Some("curated") => {
                let gene = self
                    .gene
                    .as_deref()
                    .map(str::trim)
                    .filter(|g| !g.is_empty())
                    .ok_or_else(|| CoexprError::InvalidInput("missing gene identifier".to_string()))?;
                source.pairs_for(gene).await.map_err(|e| match e {
                    CoexprError::InvalidInput(_) | CoexprError::Source(_) => e,
                    other => CoexprError::Source(other.to_string()),
                })
            }
            Some(other) => Err(CoexprError::InvalidInput(format!("unknown mode '{other}'"))),
        }
    }
}

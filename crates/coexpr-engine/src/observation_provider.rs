//! Observation query access.
//!
//! Provides an abstraction over the store of raw expression observations so the
//! engine never depends on how they are persisted.

use std::io::Read;
use std::path::Path;

use async_trait::async_trait;
use tracing::info;

use coexpr_common::entities::{Axis, ObservedExpression};
use coexpr_common::error::{CoexprError, Result};

/// Trait for querying raw observations of one entity.
#[async_trait]
pub trait ObservationSource: Send + Sync {
    /// Observations of `entity` (matched case-insensitively by id or display
    /// name) that carry a category on `axis`, optionally restricted to the
    /// categories in `filter`.
    ///
    /// Returns `NotFound` if the entity matches no observation at all.
    async fn query(
        &self,
        entity: &str,
        axis: Axis,
        filter: Option<&[String]>,
    ) -> Result<Vec<ObservedExpression>>;
}

// ── In-memory store ──────────────────────────────────────────────────────────

/// Observations held in memory, typically loaded once from CSV at startup.
///
/// Expected header:
/// `entity_id,entity_display_name,tissue_category,cell_category,cluster_label,intensity`
#[derive(Debug, Clone, Default)]
pub struct ObservationStore {
    records: Vec<ObservedExpression>,
}

impl ObservationStore {
    pub fn new(records: Vec<ObservedExpression>) -> Self {
        Self { records }
    }

    /// Load observations from a CSV file.
    pub fn from_csv_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)
            .map_err(|e| CoexprError::Source(format!("cannot open {}: {e}", path.display())))?;
        let store = Self::from_reader(file)?;
        info!("Loaded {} observations from {:?}", store.len(), path);
        Ok(store)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::Reader::from_reader(reader);
        let records = rdr
            .deserialize::<ObservedExpression>()
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(Self { records })
    }

    pub fn records(&self) -> &[ObservedExpression] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// All records of one entity, in load order.
    pub fn records_for(&self, entity: &str) -> Vec<ObservedExpression> {
        self.records
            .iter()
            .filter(|r| r.matches_entity(entity))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl ObservationSource for ObservationStore {
    async fn query(
        &self,
        entity: &str,
        axis: Axis,
        filter: Option<&[String]>,
    ) -> Result<Vec<ObservedExpression>> {
        let matched = self.records_for(entity);
        if matched.is_empty() {
            return Err(CoexprError::NotFound(entity.to_string()));
        }
        Ok(matched
            .into_iter()
            .filter(|r| !r.category(axis).is_empty())
            .filter(|r| {
                filter.map_or(true, |allowed| {
                    allowed.iter().any(|c| c.eq_ignore_ascii_case(r.category(axis)))
                })
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CSV: &str = "\
entity_id,entity_display_name,tissue_category,cell_category,cluster_label,intensity
ENSG00000105974,CAV1,lung,alveolar_cells_type_1,c-4,310.5
ENSG00000105974,CAV1,adipose_tissue,adipocytes,c-1,220.0
ENSG00000105974,CAV1,skin,,,12.0
ENSG00000141736,ERBB2,breast,glandular_cells,c-2,88.2
";

    #[test]
    fn test_from_reader() {
        let store = ObservationStore::from_reader(CSV.as_bytes()).unwrap();
        assert_eq!(store.len(), 4);
        assert_eq!(store.records()[2].cell_category, "");
    }

    #[tokio::test]
    async fn test_query_by_name_and_axis() {
        let store = ObservationStore::from_reader(CSV.as_bytes()).unwrap();
        let tissue = store.query("cav1", Axis::Tissue, None).await.unwrap();
        assert_eq!(tissue.len(), 3);

        // the skin record has no cell category
        let cell = store.query("CAV1", Axis::CellType, None).await.unwrap();
        assert_eq!(cell.len(), 2);
    }

    #[tokio::test]
    async fn test_query_with_filter() {
        let store = ObservationStore::from_reader(CSV.as_bytes()).unwrap();
        let filter = vec!["LUNG".to_string()];
        let rows = store.query("ENSG00000105974", Axis::Tissue, Some(&filter)).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].tissue_category, "lung");
    }

    #[tokio::test]
    async fn test_query_unknown_entity() {
        let store = ObservationStore::from_reader(CSV.as_bytes()).unwrap();
        let err = store.query("PDGFB", Axis::Tissue, None).await.unwrap_err();
        assert!(matches!(err, CoexprError::NotFound(_)));
    }

    #[test]
    fn test_from_csv_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("observations.csv");
        std::fs::write(&path, CSV).unwrap();
        let store = ObservationStore::from_csv_path(&path).unwrap();
        assert_eq!(store.records_for("erbb2").len(), 1);
    }

    #[test]
    fn test_missing_file_is_source_error() {
        let err = ObservationStore::from_csv_path("/nonexistent/observations.csv").unwrap_err();
        assert!(matches!(err, CoexprError::Source(_)));
    }
}

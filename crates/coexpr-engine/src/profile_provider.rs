//! Trait for expression profile access.
//!
//! The batch processor fetches one profile per entity through this trait.
//! Rate limiting and caching, if any, belong to the implementation.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use coexpr_common::entities::{Axis, CategoryProfile, EntityProfile};
use coexpr_common::error::{CoexprError, Result};

use crate::observation_provider::ObservationStore;
use crate::vector::reduce;

/// Trait for fetching an entity's tissue and cell-type profile.
#[async_trait]
pub trait ProfileFetcher: Send + Sync {
    /// Returns `NotFound` if the identifier matches nothing, or
    /// `FetchFailure` for transient collaborator errors.
    async fn fetch(&self, entity: &str) -> Result<EntityProfile>;
}

// ── Store-backed implementation ─────────────────────────────────────────────

#[async_trait]
impl ProfileFetcher for ObservationStore {
    async fn fetch(&self, entity: &str) -> Result<EntityProfile> {
        let records = self.records_for(entity);
        let first = records
            .first()
            .ok_or_else(|| CoexprError::NotFound(entity.to_string()))?;

        Ok(EntityProfile {
            id: first.entity_id.clone(),
            display_name: first.entity_display_name.clone(),
            tissue: reduce(&records, entity, Axis::Tissue).unwrap_or_default(),
            cell: reduce(&records, entity, Axis::CellType).unwrap_or_default(),
        })
    }
}

// ── Mock Implementation for Testing ────────────────────────────────────────

/// Mock fetcher with hardcoded profiles and failures.
#[derive(Default)]
pub struct MockProfileFetcher {
    profiles: HashMap<String, EntityProfile>,
    failures: HashMap<String, String>,
    calls: AtomicUsize,
}

impl MockProfileFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a profile from (category, intensity) lists.
    pub fn with(mut self, id: &str, tissue: &[(&str, f64)], cell: &[(&str, f64)]) -> Self {
        let to_map = |items: &[(&str, f64)]| -> CategoryProfile {
            items.iter().map(|(c, v)| (c.to_string(), *v)).collect()
        };
        self.profiles.insert(
            id.to_lowercase(),
            EntityProfile {
                id: id.to_string(),
                display_name: id.to_string(),
                tissue: to_map(tissue),
                cell: to_map(cell),
            },
        );
        self
    }

    /// Make fetching `id` fail with a transient error.
    pub fn failing(mut self, id: &str, reason: &str) -> Self {
        self.failures.insert(id.to_lowercase(), reason.to_string());
        self
    }

    /// Number of `fetch` calls made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProfileFetcher for MockProfileFetcher {
    async fn fetch(&self, entity: &str) -> Result<EntityProfile> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let key = entity.to_lowercase();
        if let Some(reason) = self.failures.get(&key) {
            return Err(CoexprError::FetchFailure {
                entity: entity.to_string(),
                reason: reason.clone(),
            });
        }
        self.profiles
            .get(&key)
            .cloned()
            .ok_or_else(|| CoexprError::NotFound(entity.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coexpr_common::entities::ObservedExpression;

    fn obs(tissue: &str, cell: &str, intensity: f64) -> ObservedExpression {
        ObservedExpression {
            entity_id: "ENSG00000113721".into(),
            entity_display_name: "PDGFRB".into(),
            tissue_category: tissue.into(),
            cell_category: cell.into(),
            cluster_label: String::new(),
            intensity,
        }
    }

    #[tokio::test]
    async fn test_store_profile() {
        let store = ObservationStore::new(vec![
            obs("placenta", "fibroblasts", 30.0),
            obs("placenta", "smooth_muscle_cells", 50.0),
            obs("heart_muscle", "fibroblasts", 10.0),
        ]);
        let profile = store.fetch("pdgfrb").await.unwrap();
        assert_eq!(profile.id, "ENSG00000113721");
        assert_eq!(profile.display_name, "PDGFRB");
        assert_eq!(profile.tissue.get("placenta"), Some(&40.0));
        assert_eq!(profile.cell.get("fibroblasts"), Some(&20.0));
        assert!(matches!(store.fetch("PDGFB").await, Err(CoexprError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_mock_provider() {
        let mock = MockProfileFetcher::new()
            .with("EGF", &[("kidney", 4.0)], &[("proximal_tubule", 7.0)])
            .failing("EGFR", "HTTP 503");

        let egf = mock.fetch("egf").await.unwrap();
        assert_eq!(egf.tissue.get("kidney"), Some(&4.0));
        assert!(matches!(mock.fetch("EGFR").await, Err(CoexprError::FetchFailure { .. })));
        assert!(matches!(mock.fetch("TGFA").await, Err(CoexprError::NotFound(_))));
        assert_eq!(mock.calls(), 3);
    }
}

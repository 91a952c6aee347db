//! Shared application state for the web server.

use std::sync::Arc;

use tracing::warn;

use coexpr_common::config::CoexprConfig;
use coexpr_common::error::{CoexprError, Result};
use coexpr_engine::observation_provider::ObservationStore;
use coexpr_engine::pair_provider::CuratedPairs;

/// Read-only state injected into every handler. Requests never mutate it.
pub struct AppState {
    pub store: Arc<ObservationStore>,
    pub pairs: Arc<CuratedPairs>,
    pub config: CoexprConfig,
}

impl AppState {
    pub fn new(store: ObservationStore, pairs: CuratedPairs, config: CoexprConfig) -> Self {
        Self {
            store: Arc::new(store),
            pairs: Arc::new(pairs),
            config,
        }
    }

    /// Load observations and curated pairs from the configured paths.
    /// A missing pairs file only disables curated mode.
    pub fn load(config: CoexprConfig) -> Result<Self> {
        let store = ObservationStore::from_csv_path(&config.data.observations_path)?;
        let pairs = match CuratedPairs::from_csv_path(&config.data.pairs_path) {
            Ok(p) => p,
            Err(CoexprError::Source(msg)) => {
                warn!("Curated pairs unavailable, only compare mode will work: {msg}");
                CuratedPairs::default()
            }
            Err(e) => return Err(e),
        };
        Ok(Self::new(store, pairs, config))
    }
}

pub type SharedState = Arc<AppState>;

//! Runtime configuration for the co-expression engine and its web surface.
//!
//! Loaded from YAML or JSON. The `COEXPR_CONFIG` environment variable names the
//! file; when unset, defaults are used.

use serde::{Deserialize, Serialize};

use crate::error::{CoexprError, Result};

/// Environment variable naming the configuration file.
pub const CONFIG_ENV: &str = "COEXPR_CONFIG";

/// Complete configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CoexprConfig {
    /// Metric computation policies
    #[serde(default)]
    pub similarity: SimilarityConfig,

    /// Pagination of pair batches
    #[serde(default)]
    pub batch: BatchConfig,

    /// Input data files
    #[serde(default)]
    pub data: DataConfig,

    /// HTTP server
    #[serde(default)]
    pub server: ServerConfig,
}

// ── Similarity ───────────────────────────────────────────────────────────────

/// Threshold policy used to turn a vector into active/inactive positions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Binarization {
    #[default]
    Median,
    Mean,
}

/// How the combined (tissue + cell) metrics are derived.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CombineStrategy {
    /// One engine call on the concatenated tissue ++ cell vectors.
    #[default]
    Concatenate,
    /// Legacy: mean of the per-axis metrics.
    Average,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimilarityConfig {
    #[serde(default)]
    pub binarization: Binarization,

    /// Number of highest positions compared for top-k agreement
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    #[serde(default)]
    pub combine: CombineStrategy,
}

fn default_top_k() -> usize { 10 }

impl Default for SimilarityConfig {
    fn default() -> Self {
        Self {
            binarization: Binarization::default(),
            top_k: default_top_k(),
            combine: CombineStrategy::default(),
        }
    }
}

// ── Batch ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Pairs processed per page; bounds memory and external call bursts
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

fn default_page_size() -> usize { 50 }

impl Default for BatchConfig {
    fn default() -> Self {
        Self { page_size: default_page_size() }
    }
}

// ── Data / Server ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    /// CSV of observations (one `ObservedExpression` per row)
    #[serde(default = "default_observations_path")]
    pub observations_path: String,

    /// CSV of curated ligand/receptor pairs
    #[serde(default = "default_pairs_path")]
    pub pairs_path: String,
}

fn default_observations_path() -> String { "data/observations.csv".to_string() }
fn default_pairs_path() -> String { "data/pairs.csv".to_string() }

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            observations_path: default_observations_path(),
            pairs_path: default_pairs_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

fn default_bind() -> String { "127.0.0.1:3001".to_string() }

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind: default_bind() }
    }
}

// ── Loading ──────────────────────────────────────────────────────────────────

impl CoexprConfig {
    /// Load from YAML file
    pub fn from_yaml(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content)
            .map_err(|e| CoexprError::Config(format!("{path}: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from JSON file
    pub fn from_json(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from the file named by `COEXPR_CONFIG`, picking the format by extension.
    /// Falls back to defaults when the variable is unset.
    pub fn load() -> Result<Self> {
        match std::env::var(CONFIG_ENV) {
            Ok(path) if path.ends_with(".json") => Self::from_json(&path),
            Ok(path) => Self::from_yaml(&path),
            Err(_) => {
                tracing::debug!("{CONFIG_ENV} not set, using default configuration");
                Ok(Self::default())
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch.page_size == 0 {
            return Err(CoexprError::Config("batch.page_size must be at least 1".into()));
        }
        if self.similarity.top_k == 0 {
            return Err(CoexprError::Config("similarity.top_k must be at least 1".into()));
        }
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = CoexprConfig::default();
        assert_eq!(config.similarity.binarization, Binarization::Median);
        assert_eq!(config.similarity.combine, CombineStrategy::Concatenate);
        assert_eq!(config.similarity.top_k, 10);
        assert_eq!(config.batch.page_size, 50);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let yaml = "similarity:\n  binarization: mean\n  combine: average\n";
        let config: CoexprConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.similarity.binarization, Binarization::Mean);
        assert_eq!(config.similarity.combine, CombineStrategy::Average);
        assert_eq!(config.similarity.top_k, 10);
        assert_eq!(config.batch.page_size, 50);
    }

    #[test]
    fn test_from_yaml_rejects_zero_page_size() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "batch:\n  page_size: 0").unwrap();
        let err = CoexprConfig::from_yaml(file.path().to_str().unwrap()).unwrap_err();
        assert!(matches!(err, CoexprError::Config(_)));
    }

    #[test]
    fn test_from_json() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, r#"{{"batch": {{"page_size": 20}}, "server": {{"bind": "0.0.0.0:8080"}}}}"#).unwrap();
        let config = CoexprConfig::from_json(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.batch.page_size, 20);
        assert_eq!(config.server.bind, "0.0.0.0:8080");
    }
}

//! coexpr-engine: Co-expression feature engine and categorical aggregation.
//!
//! Turns raw (entity, category, intensity) observations into aligned vectors,
//! derives similarity metrics, combines tissue and cell-type axes into one
//! feature bundle, and ranks pages of candidate pairs.

pub mod vector;
pub mod similarity;
pub mod combine;
pub mod aggregate;
pub mod batch;
pub mod observation_provider;
pub mod profile_provider;
pub mod pair_provider;

pub use batch::{PageOutcome, PairResult, ProgressEvent};
pub use combine::FeatureBundle;
pub use similarity::SimilarityMetrics;
pub use vector::AlignedVectors;

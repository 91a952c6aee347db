//! coexpr-common: Shared types, errors, and configuration used across all coexpr crates.

pub mod error;
pub mod entities;
pub mod config;

// Re-export commonly used types
pub use config::{BatchConfig, Binarization, CoexprConfig, CombineStrategy, SimilarityConfig};
pub use entities::{Axis, EntityPair, EntityProfile, ObservedExpression};
pub use error::{CoexprError, Result};

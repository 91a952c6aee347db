//! Feature combiner: per-axis metrics plus one combined view.

use serde::{Deserialize, Serialize};

use coexpr_common::config::{CombineStrategy, SimilarityConfig};

use crate::similarity::SimilarityMetrics;
use crate::vector::AlignedVectors;

/// Tissue, cell-type and combined similarity for one pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureBundle {
    pub tissue: SimilarityMetrics,
    pub cell: SimilarityMetrics,
    pub combined: SimilarityMetrics,
}

/// Compute the feature bundle for one pair.
///
/// With [`CombineStrategy::Concatenate`] the combined metrics come from a single
/// engine call on `tissue ++ cell`. [`CombineStrategy::Average`] keeps the older
/// per-axis mean for reproducibility.
pub fn combine(tissue: &AlignedVectors, cell: &AlignedVectors, cfg: &SimilarityConfig) -> FeatureBundle {
    let tissue_m = tissue.similarity(cfg);
    let cell_m = cell.similarity(cfg);

    let combined = match cfg.combine {
        CombineStrategy::Concatenate => tissue.concat(cell).similarity(cfg),
        CombineStrategy::Average => average(&tissue_m, &cell_m),
    };

    FeatureBundle { tissue: tissue_m, cell: cell_m, combined }
}

/// Float fields are averaged; counts are summed.
fn average(a: &SimilarityMetrics, b: &SimilarityMetrics) -> SimilarityMetrics {
    SimilarityMetrics {
        pearson_corr: (a.pearson_corr + b.pearson_corr) / 2.0,
        cosine_sim: (a.cosine_sim + b.cosine_sim) / 2.0,
        jaccard_index: (a.jaccard_index + b.jaccard_index) / 2.0,
        l2_norm_diff: (a.l2_norm_diff + b.l2_norm_diff) / 2.0,
        overlap_count: a.overlap_count + b.overlap_count,
        shared_top_k_count: a.shared_top_k_count + b.shared_top_k_count,
    }
}

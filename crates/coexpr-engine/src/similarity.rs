//! Similarity engine: descriptive metrics between two aligned category vectors.
//!
//! Every function here is pure. Degenerate inputs (empty vectors, zero
//! variance, zero norm) resolve to documented fallback values and never
//! produce NaN or an error.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use coexpr_common::config::{Binarization, SimilarityConfig};
use coexpr_common::error::{CoexprError, Result};

/// Six descriptive metrics between two vectors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SimilarityMetrics {
    /// In [-1, 1]; 0 when either vector has zero variance
    pub pearson_corr: f64,
    /// In [-1, 1]; 0 when either norm is zero
    pub cosine_sim: f64,
    /// In [0, 1]; 0 when neither vector has an active position
    pub jaccard_index: f64,
    /// Euclidean distance
    pub l2_norm_diff: f64,
    /// Positions active in both vectors
    pub overlap_count: usize,
    /// Positions shared between the two top-k index sets
    pub shared_top_k_count: usize,
}

/// Compute all metrics for `v1` and `v2`.
///
/// Both slices must share the same category ordering; a length mismatch is
/// rejected. Zero-length input yields all-zero metrics.
pub fn compute(v1: &[f64], v2: &[f64], cfg: &SimilarityConfig) -> Result<SimilarityMetrics> {
    if v1.len() != v2.len() {
        return Err(CoexprError::LengthMismatch { left: v1.len(), right: v2.len() });
    }
    if v1.is_empty() {
        return Ok(SimilarityMetrics::default());
    }

    let active1 = binarize(v1, cfg.binarization);
    let active2 = binarize(v2, cfg.binarization);
    let (intersection, union) = active1
        .iter()
        .zip(active2.iter())
        .fold((0usize, 0usize), |(i, u), (&a, &b)| {
            (i + (a && b) as usize, u + (a || b) as usize)
        });
    let jaccard = if union == 0 { 0.0 } else { intersection as f64 / union as f64 };

    let top1: BTreeSet<usize> = top_k_indices(v1, cfg.top_k).into_iter().collect();
    let top2: BTreeSet<usize> = top_k_indices(v2, cfg.top_k).into_iter().collect();

    Ok(SimilarityMetrics {
        pearson_corr: sanitize(pearson(v1, v2)),
        cosine_sim: sanitize(cosine(v1, v2)),
        jaccard_index: sanitize(jaccard),
        l2_norm_diff: sanitize(l2_distance(v1, v2)),
        overlap_count: intersection,
        shared_top_k_count: top1.intersection(&top2).count(),
    })
}

/// Pearson correlation from centered covariance.
/// Returns 0.0 for empty input or when either vector has zero variance.
pub fn pearson(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len().min(b.len());
    // centering a flat vector can leave rounding residue, so check the data
    if n == 0 || is_flat(&a[..n]) || is_flat(&b[..n]) {
        return 0.0;
    }
    let mean_a = a[..n].iter().sum::<f64>() / n as f64;
    let mean_b = b[..n].iter().sum::<f64>() / n as f64;

    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for (x, y) in a.iter().zip(b.iter()) {
        let dx = x - mean_a;
        let dy = y - mean_b;
        cov += dx * dy;
        var_a += dx * dx;
        var_b += dy * dy;
    }

    if var_a == 0.0 || var_b == 0.0 {
        return 0.0;
    }
    (cov / (var_a.sqrt() * var_b.sqrt())).clamp(-1.0, 1.0)
}

/// Cosine similarity. Returns 0.0 when either norm is zero.
pub fn cosine(a: &[f64], b: &[f64]) -> f64 {
    let dot: f64 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f64>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a * norm_b)).clamp(-1.0, 1.0)
}

/// Euclidean distance.
pub fn l2_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f64>()
        .sqrt()
}

/// Activation threshold of a vector under the given policy.
pub fn threshold(v: &[f64], strategy: Binarization) -> f64 {
    if v.is_empty() {
        return 0.0;
    }
    match strategy {
        Binarization::Mean => v.iter().sum::<f64>() / v.len() as f64,
        Binarization::Median => {
            let mut sorted = v.to_vec();
            sorted.sort_by(|a, b| a.total_cmp(b));
            let mid = sorted.len() / 2;
            if sorted.len() % 2 == 0 {
                (sorted[mid - 1] + sorted[mid]) / 2.0
            } else {
                sorted[mid]
            }
        }
    }
}

/// A position is active when it strictly exceeds the vector's own threshold.
pub fn binarize(v: &[f64], strategy: Binarization) -> Vec<bool> {
    let t = threshold(v, strategy);
    v.iter().map(|&x| x > t).collect()
}

/// Indices of the `k` largest values, ties broken by ascending index.
/// `k` is clamped to the vector length.
pub fn top_k_indices(v: &[f64], k: usize) -> Vec<usize> {
    let mut idx: Vec<usize> = (0..v.len()).collect();
    idx.sort_by(|&i, &j| v[j].total_cmp(&v[i]).then(i.cmp(&j)));
    idx.truncate(k.min(v.len()));
    idx
}

/// Every element equal to the first one.
fn is_flat(v: &[f64]) -> bool {
    v.iter().all(|x| *x == v[0])
}

fn sanitize(x: f64) -> f64 {
    if x.is_finite() { x } else { 0.0 }
}

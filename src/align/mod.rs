//! Entity-to-documentation alignment
//!
//! This module computes the scored mapping between code entities and doc
//! anchors:
//! - `similarity` scores one entity against one (doc, anchor) candidate
//! - `mapper` runs the full per-project pass and assigns relation bands
//!
//! The scoring formula and band thresholds below are an externally-visible
//! numeric contract (downstream confidence displays are computed from
//! them) and must not drift.

pub mod mapper;
pub mod similarity;

pub use mapper::Mapper;
pub use similarity::{Candidate, ScoreBreakdown, SimilarityScorer};

/// Weight of the embedding term in the final score
pub const EMBEDDING_WEIGHT: f64 = 0.6;
/// Weight of the heuristic term in the final score
pub const HEURISTIC_WEIGHT: f64 = 0.4;
/// Embedding term used when either side has no embedding
pub const NEUTRAL_EMBEDDING: f64 = 0.5;

/// Minimum score for a `describes` mapping
pub const DESCRIBES_MIN: f64 = 0.80;
/// Minimum score for a `references` mapping
pub const REFERENCES_MIN: f64 = 0.55;
/// Minimum score for a `mentions` mapping; below this no row is emitted
pub const MENTIONS_MIN: f64 = 0.35;

/// Heuristic sub-weights; name overlap dominates
pub const NAME_WEIGHT: f64 = 0.6;
pub const PATH_WEIGHT: f64 = 0.2;
pub const KIND_WEIGHT: f64 = 0.2;

/// Compute cosine similarity between two vectors
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f64 = a.iter().zip(b.iter()).map(|(x, y)| (*x as f64) * (*y as f64)).sum();
    let norm_a: f64 = a.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    let norm_b: f64 = b.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_similarity() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 0.001);

        let c = vec![0.0, 1.0, 0.0];
        assert!((cosine_similarity(&a, &c) - 0.0).abs() < 0.001);

        let d = vec![-1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &d) - (-1.0)).abs() < 0.001);
    }

    #[test]
    fn test_cosine_mismatched_lengths() {
        let a = vec![1.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        assert_eq!(cosine_similarity(&a, &b), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
    }

    #[test]
    fn test_weights_sum_to_one() {
        assert!((EMBEDDING_WEIGHT + HEURISTIC_WEIGHT - 1.0).abs() < f64::EPSILON);
        assert!((NAME_WEIGHT + PATH_WEIGHT + KIND_WEIGHT - 1.0).abs() < f64::EPSILON);
    }
}

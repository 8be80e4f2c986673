//! Similarity scoring for fuzzy name matching.
//!
//! Both names are normalized with [`normalize_name`] and compared with the
//! normalized Levenshtein ratio, which is symmetric and yields 1.0 for
//! identical inputs.

use crate::normalize::normalize_name;

// ============================================================================
// Score Thresholds
// ============================================================================

/// A fuzzy match requires a score strictly greater than this.
pub const MATCH_THRESHOLD: f64 = 0.9;

/// Strict greater-than: a score of exactly 0.9 is not a match.
pub fn is_match(score: f64) -> bool {
    score > MATCH_THRESHOLD
}

// ============================================================================
// Similarity
// ============================================================================

/// Similarity of two already-normalized names (0.0 to 1.0).
pub fn normalized_similarity(a_norm: &str, b_norm: &str) -> f64 {
    if a_norm == b_norm {
        return 1.0;
    }
    strsim::normalized_levenshtein(a_norm, b_norm)
}

/// Similarity of two raw display names (0.0 to 1.0).
pub fn similarity(a: &str, b: &str) -> f64 {
    normalized_similarity(&normalize_name(a), &normalize_name(b))
}

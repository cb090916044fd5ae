//! Fold matching and ranking for fuzzy filename comparison.
//!
//! A fold match asks whether every character of the record name appears, in
//! order, in the file stem after case and diacritic folding. The rank of a
//! fold match is the Levenshtein distance between the two folded strings;
//! lower is closer.

use crate::normalize::fold_diacritics;

// ============================================================================
// Thresholds
// ============================================================================

/// Fold-match rank below which a fuzzy candidate is accepted outright.
/// Chosen empirically on tango catalogs; tunable via `MatchOptions`.
pub const DEFAULT_FUZZY_RANK_THRESHOLD: usize = 30;

// ============================================================================
// Fold Matching
// ============================================================================

/// Levenshtein distance of the folded strings when the folded `needle` is a
/// subsequence of the folded `haystack`; `None` otherwise.
pub fn fold_rank(needle: &str, haystack: &str) -> Option<usize> {
    let needle = fold_diacritics(needle);
    let haystack = fold_diacritics(haystack);
    is_subsequence(&needle, &haystack).then(|| strsim::levenshtein(&needle, &haystack))
}

fn is_subsequence(needle: &str, haystack: &str) -> bool {
    let mut remaining = haystack.chars();
    needle.chars().all(|c| remaining.any(|h| h == c))
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fold_requires_in_order_characters() {
        assert!(fold_rank("Adios", "adiós muchachos").is_some());
        assert!(fold_rank("amc", "Adios Muchachos").is_some());
        assert!(fold_rank("muchachos adios", "adios muchachos").is_none());
        assert_eq!(fold_rank("", "abc"), Some(3));
    }

    #[test]
    fn test_fold_rank() {
        assert_eq!(fold_rank("Poema", "poema"), Some(0));
        assert_eq!(fold_rank("Poema", "Poema - Canaro"), Some(9));
        assert_eq!(fold_rank("Poema", "Milonga"), None);
    }

    #[test]
    fn test_rank_grows_with_noise() {
        let short = fold_rank("Sin Rumbo", "Sin Rumbo 1938").unwrap();
        let long = fold_rank("Sin Rumbo", "Sin Rumbo - Orquesta Tipica Victor - 1938 remaster").unwrap();
        assert!(short < DEFAULT_FUZZY_RANK_THRESHOLD);
        assert!(long >= DEFAULT_FUZZY_RANK_THRESHOLD);
    }
}

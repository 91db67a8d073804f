//! String similarity utilities for keyword filtering
//!
//! Two measures are used by the extraction pipeline:
//! - normalized Levenshtein similarity, for rejecting near-duplicates of
//!   the original query, and
//! - Jaccard character-set overlap, for bucketing how related a scraped
//!   keyword is to the query.
//!
//! Both operate on `char`s, not bytes, so Hangul and other multi-byte
//! text behaves correctly.

use std::collections::HashSet;

/// Classic dynamic-programming edit distance over characters.
///
/// Two-row formulation; O(len1 * len2) time, O(len2) space.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr: Vec<usize> = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

/// Normalized edit-distance similarity in `[0.0, 1.0]`.
///
/// `1 - distance / max(len1, len2)`. Identical strings yield 1.0.
/// Empty strings are special-cased: both empty is 1.0, one empty is 0.0.
pub fn similarity(a: &str, b: &str) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let len = a.chars().count().max(b.chars().count());
    1.0 - levenshtein(a, b) as f64 / len as f64
}

/// Jaccard overlap of the character sets of two strings, in `[0.0, 1.0]`.
///
/// Order-insensitive; cheap proxy for "shares the query's vocabulary".
/// Both-empty is 1.0 (identical sets), one-empty is 0.0.
pub fn jaccard_chars(a: &str, b: &str) -> f64 {
    let set_a: HashSet<char> = a.chars().collect();
    let set_b: HashSet<char> = b.chars().collect();

    if set_a.is_empty() && set_b.is_empty() {
        return 1.0;
    }

    let intersection = set_a.intersection(&set_b).count();
    let union = set_a.union(&set_b).count();
    if union == 0 {
        return 0.0;
    }

    intersection as f64 / union as f64
}

//! Keyword extraction pipeline: normalize, validate, tag, dedup, cap
//!
//! Pure functions over element texts, so the defensive heuristics are
//! testable without a browser. Rejected keywords are dropped silently;
//! extraction never fails, it only yields fewer keywords.

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashSet;

use crate::config::ScrapeConfig;
use crate::matcher;

use super::types::{
    Competition, KeywordCategory, ScrapedKeyword, SimilarityBucket, JACCARD_HIGH, JACCARD_MEDIUM,
};

lazy_static! {
    /// Hangul (syllables + jamo), alphanumerics, spaces and a few joining marks
    static ref ALLOWED_CHARS: Regex =
        Regex::new(r"^[0-9A-Za-z가-힣ㄱ-ㅎㅏ-ㅣ\s\-_.&%+#]+$").expect("valid charset regex");

    /// Anything that looks like a URL rather than a keyword
    static ref URL_LIKE: Regex =
        Regex::new(r"(?i)(https?://|www\.|\.(com|net|org|io|co\.kr|kr)(/|$))")
            .expect("valid url regex");
}

/// Collapse whitespace runs to single spaces and strip control characters.
pub fn normalize_text(raw: &str) -> String {
    raw.chars()
        .map(|c| if c.is_whitespace() { ' ' } else { c })
        .filter(|c| !c.is_control())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Validation gate for one normalized candidate.
///
/// Rejects: empty text, the query itself, length outside the configured
/// bounds, disallowed characters, URL-looking strings, blacklist matches
/// (case-insensitive substring), and near-duplicates of the query by
/// normalized edit distance.
pub fn is_valid_keyword(text: &str, query: &str, config: &ScrapeConfig) -> bool {
    if text.is_empty() {
        return false;
    }

    let len = text.chars().count();
    if len < config.min_keyword_length || len > config.max_keyword_length {
        return false;
    }

    if !ALLOWED_CHARS.is_match(text) {
        return false;
    }

    if URL_LIKE.is_match(text) {
        return false;
    }

    let lowered = text.to_lowercase();
    if config
        .blacklist
        .iter()
        .any(|term| lowered.contains(&term.to_lowercase()))
    {
        return false;
    }

    // The query itself and its near-duplicates carry no signal
    if matcher::similarity(text, query) >= config.query_similarity_threshold {
        return false;
    }

    true
}

/// Heuristic competition bucket from keyword shape.
///
/// Very short terms, digits and special characters correlate with
/// commercial or navigational queries; length is the fallback signal.
pub fn competition_for(text: &str) -> Competition {
    let len = text.chars().count();
    let has_digit = text.chars().any(|c| c.is_ascii_digit());
    let has_special = text
        .chars()
        .any(|c| !c.is_alphanumeric() && !c.is_whitespace());

    if len <= 2 || has_digit || has_special {
        Competition::High
    } else if len <= 4 {
        Competition::Medium
    } else {
        Competition::Low
    }
}

/// Jaccard character-overlap bucket relative to the query.
pub fn similarity_bucket(text: &str, query: &str) -> SimilarityBucket {
    let overlap = matcher::jaccard_chars(text, query);
    if overlap >= JACCARD_HIGH {
        SimilarityBucket::High
    } else if overlap >= JACCARD_MEDIUM {
        SimilarityBucket::Medium
    } else {
        SimilarityBucket::Low
    }
}

/// Run the full pipeline over raw element texts for one category.
///
/// Output is unique by normalized text and capped at
/// `max_keywords_per_category`, in page order.
pub fn build_keywords(
    raw_texts: &[String],
    query: &str,
    category: KeywordCategory,
    config: &ScrapeConfig,
) -> Vec<ScrapedKeyword> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut keywords = Vec::new();

    for raw in raw_texts {
        if keywords.len() >= config.max_keywords_per_category {
            break;
        }

        let text = normalize_text(raw);
        if !is_valid_keyword(&text, query, config) {
            continue;
        }
        if !seen.insert(text.clone()) {
            continue;
        }

        keywords.push(ScrapedKeyword {
            competition: Some(competition_for(&text)),
            similarity: Some(similarity_bucket(&text, query)),
            keyword: text,
            category,
            search_volume: None,
            source: config.source_tag.clone(),
        });
    }

    keywords
}

/// Deduplicate a union of per-category keywords by normalized text,
/// keeping the first occurrence (caller-specified category order).
pub fn dedup_union(keywords: Vec<ScrapedKeyword>) -> Vec<ScrapedKeyword> {
    let mut seen: HashSet<String> = HashSet::new();
    keywords
        .into_iter()
        .filter(|kw| seen.insert(kw.keyword.clone()))
        .collect()
}

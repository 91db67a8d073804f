//! Data structures and selector tables for keyword scraping
//!
//! Selector candidates are data, not code: each category carries an ordered
//! list of CSS selectors that is probed front to back until one matches.
//! When Naver ships a new markup variant, the fix is one more table entry.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// =============================================================================
// Constants
// =============================================================================

/// Default cap on keywords kept per category
pub const MAX_KEYWORDS_PER_TYPE: usize = 10;

/// Minimum accepted keyword length in characters
pub const MIN_KEYWORD_LENGTH: usize = 2;

/// Maximum accepted keyword length in characters
pub const MAX_KEYWORD_LENGTH: usize = 40;

/// Reject keywords whose normalized edit-distance similarity to the query
/// is at or above this value (near-duplicates of the query itself)
pub const QUERY_SIMILARITY_REJECT_THRESHOLD: f64 = 0.85;

/// Jaccard overlap at or above this is bucketed `high`
pub const JACCARD_HIGH: f64 = 0.7;

/// Jaccard overlap at or above this is bucketed `medium`
pub const JACCARD_MEDIUM: f64 = 0.4;

/// Terms that mark UI chrome rather than keyword content.
/// Matched case-insensitively, substring or exact.
pub const DEFAULT_BLACKLIST: &[&str] = &[
    "로그인",
    "전체보기",
    "더보기",
    "광고",
    "도움말",
    "신고",
    "naver",
    "네이버",
    "javascript",
];

/// Ordered selector candidates for the trending-keywords region.
/// Mobile Naver has shipped at least three variants of this block.
pub const TRENDING_SELECTORS: &[&str] = &[
    ".keyword_challenge_area .keyword_item .text",
    ".api_group_trend .list_trend .item_text",
    ".trending_keywords .keyword",
];

/// Ordered selector candidates for smartblock keyword chips
pub const SMARTBLOCK_SELECTORS: &[&str] = &[
    ".fds-comps-keyword-chip-text",
    ".sds-comps-keyword-chip .chip_text",
    ".api_smart_block .keyword_txt",
];

/// Ordered selector candidates for the related-search strip
pub const RELATED_SEARCH_SELECTORS: &[&str] = &[
    ".related_srch .lst_related_srch .item .tit",
    ".sp_related .lst_relate .item a",
    ".api_rel_keyword .keyword",
];

/// Ordered selector candidates for autosuggest entries
pub const AUTOSUGGEST_SELECTORS: &[&str] = &[
    ".atcmp_lst .item_atcmp .kwd_txt",
    ".autocomplete_list .item .keyword",
    "#atcmp ul li .tit",
];

// =============================================================================
// Categories and buckets
// =============================================================================

/// A class of scraped keyword signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeywordCategory {
    Trending,
    Smartblock,
    RelatedSearch,
    Autosuggest,
}

impl KeywordCategory {
    /// All categories in the default scraping order
    pub const ALL: [KeywordCategory; 4] = [
        KeywordCategory::Trending,
        KeywordCategory::Smartblock,
        KeywordCategory::RelatedSearch,
        KeywordCategory::Autosuggest,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Trending => "trending",
            Self::Smartblock => "smartblock",
            Self::RelatedSearch => "related_search",
            Self::Autosuggest => "autosuggest",
        }
    }

    /// Compiled-in selector candidates for this category
    pub fn default_selectors(self) -> &'static [&'static str] {
        match self {
            Self::Trending => TRENDING_SELECTORS,
            Self::Smartblock => SMARTBLOCK_SELECTORS,
            Self::RelatedSearch => RELATED_SEARCH_SELECTORS,
            Self::Autosuggest => AUTOSUGGEST_SELECTORS,
        }
    }
}

impl fmt::Display for KeywordCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Heuristic competition bucket for a keyword
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Competition {
    Low,
    Medium,
    High,
}

/// How closely a scraped keyword overlaps the original query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SimilarityBucket {
    Low,
    Medium,
    High,
}

// =============================================================================
// Scrape results
// =============================================================================

/// One keyword extracted from a page region
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapedKeyword {
    /// Normalized keyword text
    pub keyword: String,
    /// Region the keyword came from
    pub category: KeywordCategory,
    /// Monthly search volume, when a later enrichment step filled it in
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_volume: Option<u64>,
    /// Heuristic competition bucket
    #[serde(skip_serializing_if = "Option::is_none")]
    pub competition: Option<Competition>,
    /// Jaccard similarity bucket relative to the query
    #[serde(skip_serializing_if = "Option::is_none")]
    pub similarity: Option<SimilarityBucket>,
    /// Where the keyword was observed, e.g. `"naver_mobile_search"`
    pub source: String,
}

/// Outcome of scraping one category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScrapeStatus {
    /// Region found, at least one keyword extracted
    Success,
    /// Region legitimately absent - not an error
    NoContent,
    /// Navigation or DOM fault; scraping continued with the next category
    Error,
}

/// Per-category scrape outcome
///
/// Invariant: `status == Success` implies `count > 0`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapingResult {
    pub keywords: Vec<ScrapedKeyword>,
    pub message: String,
    pub status: ScrapeStatus,
    pub count: usize,
    /// Physical result pages consulted (multi-page categories only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pages: Option<Vec<u8>>,
}

impl ScrapingResult {
    pub fn success(keywords: Vec<ScrapedKeyword>, message: impl Into<String>) -> Self {
        let count = keywords.len();
        Self {
            keywords,
            message: message.into(),
            status: ScrapeStatus::Success,
            count,
            pages: None,
        }
    }

    pub fn no_content(message: impl Into<String>) -> Self {
        Self {
            keywords: Vec::new(),
            message: message.into(),
            status: ScrapeStatus::NoContent,
            count: 0,
            pages: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            keywords: Vec::new(),
            message: message.into(),
            status: ScrapeStatus::Error,
            count: 0,
            pages: None,
        }
    }

    pub fn with_pages(mut self, pages: Vec<u8>) -> Self {
        self.pages = Some(pages);
        self
    }
}

/// Summary entry for one category inside a [`KeywordHarvest`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryOutcome {
    pub status: ScrapeStatus,
    pub message: String,
    pub count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pages: Option<Vec<u8>>,
}

impl From<&ScrapingResult> for CategoryOutcome {
    fn from(result: &ScrapingResult) -> Self {
        Self {
            status: result.status,
            message: result.message.clone(),
            count: result.count,
            pages: result.pages.clone(),
        }
    }
}

/// Combined outcome of `scrape_all_keywords`: deduplicated union of all
/// category keywords plus a per-category outcome map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeywordHarvest {
    pub query: String,
    /// Union of all categories, unique by normalized text
    pub keywords: Vec<ScrapedKeyword>,
    pub categories: BTreeMap<KeywordCategory, CategoryOutcome>,
}

impl KeywordHarvest {
    pub fn total_count(&self) -> usize {
        self.keywords.len()
    }
}

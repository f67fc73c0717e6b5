//! Thematic text analysis for Ekimae stations.
//!
//! Reads a station's encyclopedia article (Japanese first, English and
//! Chinese through its language links) and derives:
//! - a short summary per language
//! - seasonal flags (sakura, koyo, ajisai, ume)
//! - weighted thematic tags from a keyword dictionary
//! - a generated title and tagline, with a fallback chain
//!
//! [`ThematicAnalyzer::analyze`] never fails; degraded inputs give degraded
//! but well-formed output.

pub mod analyzer;
pub mod dictionary;
pub mod generation;
pub mod wiki;

pub use analyzer::{PRIMARY_LANG, SUMMARY_CHARS, ThematicAnalyzer, summarize};
pub use dictionary::{THEMES, ThemeEntry, count_occurrences, detect_seasonal_flags, extract_tags};
pub use generation::{
    CopyRequest, GeneratedCopy, OpenRouterGenerator, Prompt, TextGenerator, build_prompt,
    parse_generated_copy, strip_code_fences,
};
pub use wiki::{Article, EncyclopediaClient, MediaWikiClient};

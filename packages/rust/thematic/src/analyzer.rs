//! Per-station thematic analysis.

use std::sync::LazyLock;

use regex::Regex;
use tracing::{info, instrument, warn};

use ekimae_shared::{LocalizedText, StationProfile, ThematicAnalysis, WeightedTag};

use crate::dictionary::{THEMES, ThemeEntry, detect_seasonal_flags, extract_tags};
use crate::generation::{
    CopyRequest, TextGenerator, build_prompt, fallback_tagline, fallback_title,
    parse_generated_copy,
};
use crate::wiki::{Article, EncyclopediaClient};

/// Language of the primary article.
pub const PRIMARY_LANG: &str = "ja";

/// Characters kept from each article body.
pub const SUMMARY_CHARS: usize = 150;

pub const FALLBACK_SUMMARY_JA: &str = "この駅の概要はまだありません。";
pub const FALLBACK_SUMMARY_EN: &str = "No English summary available.";
pub const FALLBACK_SUMMARY_ZH: &str = "暂无中文简介。";

/// First [`SUMMARY_CHARS`] characters of `text` with line breaks collapsed.
pub fn summarize(text: &str) -> String {
    static BREAKS_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\s*\n\s*").expect("valid regex"));

    let collapsed = BREAKS_RE.replace_all(text.trim(), " ");
    let snippet: String = collapsed.chars().take(SUMMARY_CHARS).collect();
    snippet.trim_end().to_string()
}

fn with_description(summary: String, profile: Option<&StationProfile>) -> String {
    match profile.map(|p| p.description.trim()) {
        Some(description) if !description.is_empty() => format!("{description} {summary}"),
        _ => summary,
    }
}

fn fallback_summary() -> LocalizedText {
    LocalizedText::new(FALLBACK_SUMMARY_JA, FALLBACK_SUMMARY_EN, FALLBACK_SUMMARY_ZH)
}

/// Turns an encyclopedia article into a [`ThematicAnalysis`].
///
/// Generation is optional: without a generator every station gets the
/// fallback title and tagline.
pub struct ThematicAnalyzer<W, G> {
    wiki: W,
    generator: Option<G>,
    dictionary: &'static [ThemeEntry],
}

impl<W: EncyclopediaClient, G: TextGenerator> ThematicAnalyzer<W, G> {
    pub fn new(wiki: W, generator: Option<G>) -> Self {
        Self {
            wiki,
            generator,
            dictionary: THEMES,
        }
    }

    #[cfg(test)]
    fn with_dictionary(mut self, dictionary: &'static [ThemeEntry]) -> Self {
        self.dictionary = dictionary;
        self
    }

    /// Analyze the article titled `title`.
    ///
    /// Never fails: a missing or unreachable primary article yields the
    /// profile-derived analysis, or an empty one without a profile.
    #[instrument(skip_all, fields(title = %title, profiled = profile.is_some()))]
    pub async fn analyze(&self, title: &str, profile: Option<&StationProfile>) -> ThematicAnalysis {
        let article = match self.wiki.fetch_article(PRIMARY_LANG, title).await {
            Ok(Some(article)) => article,
            Ok(None) => {
                warn!("primary article not found, using degraded analysis");
                return self.degraded(profile);
            }
            Err(e) => {
                warn!(error = %e, "primary article fetch failed, using degraded analysis");
                return self.degraded(profile);
            }
        };

        let seasonal_flags = detect_seasonal_flags(&article.extract);
        let mandatory = profile.map(|p| p.mandatory_tags.as_slice()).unwrap_or(&[]);
        let tags = extract_tags(&article.extract, self.dictionary, mandatory);

        let summary = LocalizedText {
            ja: with_description(summarize(&article.extract), profile),
            en: self
                .secondary_summary(&article, "en")
                .await
                .unwrap_or_else(|| FALLBACK_SUMMARY_EN.to_string()),
            zh: self
                .secondary_summary(&article, "zh")
                .await
                .unwrap_or_else(|| FALLBACK_SUMMARY_ZH.to_string()),
        };

        let request = CopyRequest {
            station_title: &article.title,
            summary: &summary,
            tags: &tags,
            seasonal_flags: &seasonal_flags,
            profile,
        };
        let (title_text, tagline) = self.generate_copy(&request).await;

        info!(
            flags = seasonal_flags.len(),
            tags = tags.len(),
            "analysis complete"
        );

        ThematicAnalysis {
            summary,
            title: title_text,
            tagline,
            seasonal_flags,
            tags,
        }
    }

    /// Summary of the linked article in `lang`, if one can be fetched.
    async fn secondary_summary(&self, article: &Article, lang: &str) -> Option<String> {
        let linked = article.title_in(lang)?;
        match self.wiki.fetch_article(lang, linked).await {
            Ok(Some(found)) => Some(summarize(&found.extract)),
            Ok(None) => None,
            Err(e) => {
                warn!(lang, title = linked, error = %e, "linked article fetch failed");
                None
            }
        }
    }

    async fn generate_copy(&self, request: &CopyRequest<'_>) -> (LocalizedText, LocalizedText) {
        let fallback = || (fallback_title(request.profile), fallback_tagline());

        let Some(generator) = &self.generator else {
            return fallback();
        };

        let prompt = build_prompt(request);
        let reply = match generator.generate(&prompt).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(error = %e, "copy generation failed, using fallback");
                return fallback();
            }
        };

        match parse_generated_copy(&reply) {
            Ok(copy) => (copy.title, copy.tagline),
            Err(e) => {
                warn!(error = %e, "unusable generator reply, using fallback");
                fallback()
            }
        }
    }

    fn degraded(&self, profile: Option<&StationProfile>) -> ThematicAnalysis {
        let Some(profile) = profile else {
            return ThematicAnalysis {
                summary: fallback_summary(),
                title: fallback_title(None),
                tagline: fallback_tagline(),
                seasonal_flags: Vec::new(),
                tags: Vec::new(),
            };
        };

        let mut summary = fallback_summary();
        if !profile.description.trim().is_empty() {
            summary.ja = profile.description.trim().to_string();
        }

        let tags: Vec<WeightedTag> = extract_tags("", self.dictionary, &profile.mandatory_tags);

        ThematicAnalysis {
            summary,
            title: fallback_title(Some(profile)),
            tagline: fallback_tagline(),
            seasonal_flags: Vec::new(),
            tags,
        }
    }
}

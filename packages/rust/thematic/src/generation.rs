//! Title and tagline generation.
//!
//! The analyzer builds a [`Prompt`], hands it to a [`TextGenerator`], and
//! parses the reply with [`parse_generated_copy`]. Anything that goes wrong
//! on that path ends in the fallback chain ([`fallback_title`],
//! [`fallback_tagline`]).

use std::future::Future;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use ekimae_shared::{
    AppConfig, EkimaeError, LocalizedText, Result, SeasonalFlag, StationProfile, WeightedTag,
};

/// User-Agent string for generation requests.
const USER_AGENT: &str = concat!("Ekimae/", env!("CARGO_PKG_VERSION"));

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Tags listed in the prompt.
const PROMPT_TAG_LIMIT: usize = 8;

const SYSTEM_INSTRUCTION: &str = "You write short, evocative copy for a Tokyo station guide. \
Base everything on the facts provided. Respond with a single JSON object and nothing else.";

/// Generic title used when nothing better is available.
pub fn generic_title() -> LocalizedText {
    LocalizedText::new("東京の駅めぐり", "Explore Tokyo by Station", "探索东京车站")
}

/// Generic tagline used whenever generation is unavailable.
pub fn fallback_tagline() -> LocalizedText {
    LocalizedText::new(
        "駅から始まる、小さな旅。",
        "A short journey that starts at the station.",
        "从车站出发的小旅行。",
    )
}

/// Title fallback: the profile's first core vibe, else [`generic_title`].
pub fn fallback_title(profile: Option<&StationProfile>) -> LocalizedText {
    profile
        .and_then(|p| p.core_vibes.iter().find(|v| !v.trim().is_empty()))
        .map(|vibe| LocalizedText::uniform(vibe.trim()))
        .unwrap_or_else(generic_title)
}

// ---------------------------------------------------------------------------
// Prompt
// ---------------------------------------------------------------------------

/// Facts about a station given to the generator.
#[derive(Debug, Clone, Copy)]
pub struct CopyRequest<'a> {
    pub station_title: &'a str,
    pub summary: &'a LocalizedText,
    pub tags: &'a [WeightedTag],
    pub seasonal_flags: &'a [SeasonalFlag],
    pub profile: Option<&'a StationProfile>,
}

/// A system instruction plus user prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

pub fn build_prompt(request: &CopyRequest<'_>) -> Prompt {
    let mut user = String::new();

    user.push_str(&format!("Station: {}\n", request.station_title));
    user.push_str(&format!("Summary (ja): {}\n", request.summary.ja));
    user.push_str(&format!("Summary (en): {}\n", request.summary.en));

    if !request.tags.is_empty() {
        let tags: Vec<String> = request
            .tags
            .iter()
            .take(PROMPT_TAG_LIMIT)
            .map(|t| format!("{} ({})", t.tag, t.weight))
            .collect();
        user.push_str(&format!("Themes: {}\n", tags.join(", ")));
    }

    if !request.seasonal_flags.is_empty() {
        let flags: Vec<&str> = request.seasonal_flags.iter().map(|f| f.as_str()).collect();
        user.push_str(&format!("Seasonal highlights: {}\n", flags.join(", ")));
    }

    if let Some(profile) = request.profile {
        if !profile.core_vibes.is_empty() {
            user.push_str(&format!("Core vibes: {}\n", profile.core_vibes.join(", ")));
        }
        if !profile.description.is_empty() {
            user.push_str(&format!("Persona: {}\n", profile.description));
        }
    }

    user.push_str(
        "\nWrite a title (ja/zh at most 12 characters, en at most 5 words) and a one-sentence \
         tagline in Japanese, English and Simplified Chinese. Reply with exactly this JSON shape:\n\
         {\"title\":{\"ja\":\"\",\"en\":\"\",\"zh\":\"\"},\"tagline\":{\"ja\":\"\",\"en\":\"\",\"zh\":\"\"}}",
    );

    Prompt {
        system: SYSTEM_INSTRUCTION.to_string(),
        user,
    }
}

// ---------------------------------------------------------------------------
// Reply parsing
// ---------------------------------------------------------------------------

/// Parsed generator reply.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GeneratedCopy {
    pub title: LocalizedText,
    pub tagline: LocalizedText,
}

/// Remove a surrounding Markdown code fence, if any.
pub fn strip_code_fences(text: &str) -> &str {
    static FENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?s)^```[A-Za-z0-9_-]*\s*(.*?)\s*```$").expect("valid regex")
    });

    let trimmed = text.trim();
    match FENCE_RE.captures(trimmed).and_then(|c| c.get(1)) {
        Some(inner) => inner.as_str(),
        None => trimmed,
    }
}

/// Parse and validate a generator reply. Every field must be non-blank.
pub fn parse_generated_copy(text: &str) -> Result<GeneratedCopy> {
    let body = strip_code_fences(text);
    let mut copy: GeneratedCopy = serde_json::from_str(body)
        .map_err(|e| EkimaeError::Generation(format!("reply is not the expected JSON: {e}")))?;

    for (field, value) in [
        ("title.ja", &mut copy.title.ja),
        ("title.en", &mut copy.title.en),
        ("title.zh", &mut copy.title.zh),
        ("tagline.ja", &mut copy.tagline.ja),
        ("tagline.en", &mut copy.tagline.en),
        ("tagline.zh", &mut copy.tagline.zh),
    ] {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(EkimaeError::Generation(format!("reply has empty {field}")));
        }
        *value = trimmed.to_string();
    }

    Ok(copy)
}

// ---------------------------------------------------------------------------
// Generator seam
// ---------------------------------------------------------------------------

/// Turns a prompt into reply text.
pub trait TextGenerator: Send + Sync {
    fn generate(&self, prompt: &Prompt) -> impl Future<Output = Result<String>> + Send;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

/// OpenAI-compatible chat-completion client (OpenRouter by default).
#[derive(Debug, Clone)]
pub struct OpenRouterGenerator {
    client: Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl OpenRouterGenerator {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| EkimaeError::Network(format!("failed to build HTTP client: {e}")))?;
        let base_url: String = base_url.into();
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.into(),
            api_key: api_key.into(),
        })
    }

    /// Build from `[generation]`, reading the key from its env var.
    ///
    /// Returns `Ok(None)` when generation is disabled.
    pub fn from_config(config: &AppConfig) -> Result<Option<Self>> {
        let generation = &config.generation;
        if !generation.enabled {
            return Ok(None);
        }
        let api_key = std::env::var(&generation.api_key_env).map_err(|_| {
            EkimaeError::config(format!("{} is not set", generation.api_key_env))
        })?;
        Self::new(&generation.base_url, &generation.model, api_key).map(Some)
    }
}

impl TextGenerator for OpenRouterGenerator {
    async fn generate(&self, prompt: &Prompt) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);
        let request = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: &prompt.system,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt.user,
                },
            ],
            temperature: 0.7,
        };

        debug!(model = %self.model, prompt_chars = prompt.user.chars().count(), "requesting copy");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| EkimaeError::Generation(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let snippet: String = body.chars().take(200).collect();
            return Err(EkimaeError::Generation(format!(
                "HTTP {}: {snippet}",
                status.as_u16()
            )));
        }

        let payload: ChatResponse = response
            .json()
            .await
            .map_err(|e| EkimaeError::Generation(format!("invalid completion payload: {e}")))?;

        payload
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| EkimaeError::Generation("empty completion".into()))
    }
}

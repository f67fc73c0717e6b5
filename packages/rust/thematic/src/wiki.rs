//! Encyclopedia article lookup (MediaWiki API).

use std::collections::HashMap;
use std::future::Future;

use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use ekimae_shared::{EkimaeError, Result, WikiSettings};

/// User-Agent string for encyclopedia requests.
const USER_AGENT: &str = concat!("Ekimae/", env!("CARGO_PKG_VERSION"));

/// Plain-text article body plus its cross-language titles.
#[derive(Debug, Clone, PartialEq)]
pub struct Article {
    pub title: String,
    pub extract: String,
    /// Language code to article title in that language.
    pub langlinks: HashMap<String, String>,
}

impl Article {
    /// Title of the same article in `lang`, if linked.
    pub fn title_in(&self, lang: &str) -> Option<&str> {
        self.langlinks.get(lang).map(String::as_str)
    }
}

/// Looks up encyclopedia articles.
pub trait EncyclopediaClient: Send + Sync {
    /// Fetch `title` from the `lang` edition.
    ///
    /// `Ok(None)` means the article does not exist or has no text;
    /// errors are reserved for transport and decoding failures.
    fn fetch_article(
        &self,
        lang: &str,
        title: &str,
    ) -> impl Future<Output = Result<Option<Article>>> + Send;
}

// ---------------------------------------------------------------------------
// MediaWiki response payload
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct QueryResponse {
    query: Option<QueryBody>,
}

#[derive(Debug, Deserialize)]
struct QueryBody {
    #[serde(default)]
    pages: HashMap<String, WikiPage>,
}

#[derive(Debug, Deserialize)]
struct WikiPage {
    #[serde(default)]
    title: String,
    #[serde(default)]
    extract: Option<String>,
    #[serde(default)]
    missing: Option<serde_json::Value>,
    #[serde(default)]
    langlinks: Vec<LangLink>,
}

#[derive(Debug, Deserialize)]
struct LangLink {
    lang: String,
    #[serde(rename = "*")]
    title: String,
}

/// Pull the single page out of a `prop=extracts|langlinks` response.
pub(crate) fn parse_article(body: &str) -> Result<Option<Article>> {
    let response: QueryResponse = serde_json::from_str(body)
        .map_err(|e| EkimaeError::parse(format!("encyclopedia response: {e}")))?;

    let Some(query) = response.query else {
        return Ok(None);
    };

    let page = query
        .pages
        .into_iter()
        .find(|(id, page)| id.as_str() != "-1" && page.missing.is_none())
        .map(|(_, page)| page);

    let Some(page) = page else {
        return Ok(None);
    };

    let extract = page.extract.unwrap_or_default();
    if extract.trim().is_empty() {
        return Ok(None);
    }

    Ok(Some(Article {
        title: page.title,
        extract,
        langlinks: page
            .langlinks
            .into_iter()
            .map(|link| (link.lang, link.title))
            .collect(),
    }))
}

/// [`EncyclopediaClient`] over the MediaWiki action API.
#[derive(Debug, Clone)]
pub struct MediaWikiClient {
    client: Client,
    /// API URL with a `{lang}` placeholder.
    api_url_template: String,
}

impl MediaWikiClient {
    pub fn new(settings: &WikiSettings) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(settings.timeout)
            .build()
            .map_err(|e| EkimaeError::Network(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            api_url_template: settings.api_url_template.clone(),
        })
    }

    fn api_url(&self, lang: &str) -> String {
        self.api_url_template.replace("{lang}", lang)
    }
}

impl EncyclopediaClient for MediaWikiClient {
    async fn fetch_article(&self, lang: &str, title: &str) -> Result<Option<Article>> {
        let url = self.api_url(lang);
        debug!(lang, title, %url, "fetching article");

        let response = self
            .client
            .get(&url)
            .query(&[
                ("action", "query"),
                ("format", "json"),
                ("prop", "extracts|langlinks"),
                ("explaintext", "1"),
                ("redirects", "1"),
                ("lllimit", "500"),
                ("titles", title),
            ])
            .send()
            .await
            .map_err(|e| EkimaeError::Network(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(EkimaeError::Network(format!("{url}: HTTP {}", status.as_u16())));
        }

        let body = response
            .text()
            .await
            .map_err(|e| EkimaeError::Network(format!("{url}: body read failed: {e}")))?;

        parse_article(&body)
    }
}

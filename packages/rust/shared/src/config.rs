//! Application configuration for Ekimae.
//!
//! User config lives at `~/.ekimae/ekimae.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{EkimaeError, Result};
use crate::types::Category;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "ekimae.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".ekimae";

// ---------------------------------------------------------------------------
// Config structs (matching ekimae.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub defaults: DefaultsConfig,

    #[serde(default)]
    pub sources: SourcesConfig,

    #[serde(default)]
    pub overpass: OverpassConfig,

    #[serde(default)]
    pub wikipedia: WikipediaConfig,

    #[serde(default)]
    pub generation: GenerationConfig,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Resumable output log (JSON array of cluster results).
    #[serde(default = "default_output_log")]
    pub output_log: String,

    /// Stations closer than this to a cluster primary join its cluster.
    #[serde(default = "default_cluster_threshold")]
    pub cluster_threshold_m: f64,

    /// POI search radius around each cluster center.
    #[serde(default = "default_poi_radius")]
    pub poi_radius_m: u32,

    /// Category labels queried for every cluster.
    #[serde(default = "default_categories")]
    pub categories: Vec<String>,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            output_log: default_output_log(),
            cluster_threshold_m: default_cluster_threshold(),
            poi_radius_m: default_poi_radius(),
            categories: default_categories(),
        }
    }
}

fn default_output_log() -> String {
    "var/enrichment_log.json".into()
}
fn default_cluster_threshold() -> f64 {
    500.0
}
fn default_poi_radius() -> u32 {
    800
}
fn default_categories() -> Vec<String> {
    Category::ALL.iter().map(|c| c.as_str().to_string()).collect()
}

/// `[sources]` section: static station lists and the profile file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcesConfig {
    /// Curated, high-confidence stations. These win primacy ties.
    #[serde(default = "default_core_stations")]
    pub core_stations: String,

    #[serde(default = "default_extended_stations")]
    pub extended_stations: String,

    /// Ward-scanned stations, only loaded when requested.
    #[serde(default = "default_ward_scan_stations")]
    pub ward_scan_stations: String,

    #[serde(default = "default_profiles")]
    pub profiles: String,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            core_stations: default_core_stations(),
            extended_stations: default_extended_stations(),
            ward_scan_stations: default_ward_scan_stations(),
            profiles: default_profiles(),
        }
    }
}

fn default_core_stations() -> String {
    "data/stations_core.json".into()
}
fn default_extended_stations() -> String {
    "data/stations_extended.json".into()
}
fn default_ward_scan_stations() -> String {
    "data/stations_ward_scan.json".into()
}
fn default_profiles() -> String {
    "data/profiles.json".into()
}

/// `[overpass]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverpassConfig {
    /// Interchangeable interpreter endpoints, rotated per attempt.
    #[serde(default = "default_endpoints")]
    pub endpoints: Vec<String>,

    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Hard per-attempt timeout.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Delay before the next endpoint after a timeout or error status.
    #[serde(default = "default_retry_delay")]
    pub retry_delay_ms: u64,

    /// Multiplied by the attempt number after a 429.
    #[serde(default = "default_rate_limit_backoff")]
    pub rate_limit_backoff_ms: u64,

    /// Fixed pause before every category query.
    #[serde(default = "default_politeness_delay")]
    pub politeness_delay_ms: u64,
}

impl Default for OverpassConfig {
    fn default() -> Self {
        Self {
            endpoints: default_endpoints(),
            max_attempts: default_max_attempts(),
            request_timeout_secs: default_request_timeout(),
            retry_delay_ms: default_retry_delay(),
            rate_limit_backoff_ms: default_rate_limit_backoff(),
            politeness_delay_ms: default_politeness_delay(),
        }
    }
}

fn default_endpoints() -> Vec<String> {
    vec![
        "https://overpass-api.de/api/interpreter".into(),
        "https://overpass.kumi.systems/api/interpreter".into(),
        "https://overpass.private.coffee/api/interpreter".into(),
    ]
}
fn default_max_attempts() -> u32 {
    3
}
fn default_request_timeout() -> u64 {
    90
}
fn default_retry_delay() -> u64 {
    2_000
}
fn default_rate_limit_backoff() -> u64 {
    5_000
}
fn default_politeness_delay() -> u64 {
    1_500
}

/// `[wikipedia]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WikipediaConfig {
    /// API URL with a `{lang}` placeholder for the language subdomain.
    #[serde(default = "default_wiki_api")]
    pub api_url_template: String,

    #[serde(default = "default_wiki_timeout")]
    pub timeout_secs: u64,
}

impl Default for WikipediaConfig {
    fn default() -> Self {
        Self {
            api_url_template: default_wiki_api(),
            timeout_secs: default_wiki_timeout(),
        }
    }
}

fn default_wiki_api() -> String {
    "https://{lang}.wikipedia.org/w/api.php".into()
}
fn default_wiki_timeout() -> u64 {
    30
}

/// `[generation]` section: title/tagline text generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// When false, titles and taglines always use the fallback chain.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_model")]
    pub model: String,

    /// OpenAI-compatible API base URL.
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_key_env: default_api_key_env(),
            model: default_model(),
            base_url: default_base_url(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_api_key_env() -> String {
    "OPENROUTER_API_KEY".into()
}
fn default_model() -> String {
    "google/gemini-2.0-flash-001".into()
}
fn default_base_url() -> String {
    "https://openrouter.ai/api/v1".into()
}

// ---------------------------------------------------------------------------
// Runtime settings (derived from AppConfig)
// ---------------------------------------------------------------------------

/// Retry/backoff settings for map-data requests.
#[derive(Debug, Clone)]
pub struct RetrySettings {
    pub endpoints: Vec<Url>,
    pub max_attempts: u32,
    pub request_timeout: Duration,
    pub retry_delay: Duration,
    pub rate_limit_backoff: Duration,
    pub politeness_delay: Duration,
}

impl TryFrom<&AppConfig> for RetrySettings {
    type Error = EkimaeError;

    fn try_from(config: &AppConfig) -> Result<Self> {
        let overpass = &config.overpass;
        Ok(Self {
            endpoints: parse_endpoints(&overpass.endpoints)?,
            max_attempts: overpass.max_attempts,
            request_timeout: Duration::from_secs(overpass.request_timeout_secs),
            retry_delay: Duration::from_millis(overpass.retry_delay_ms),
            rate_limit_backoff: Duration::from_millis(overpass.rate_limit_backoff_ms),
            politeness_delay: Duration::from_millis(overpass.politeness_delay_ms),
        })
    }
}

/// Encyclopedia client settings.
#[derive(Debug, Clone)]
pub struct WikiSettings {
    pub api_url_template: String,
    pub timeout: Duration,
}

impl From<&AppConfig> for WikiSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            api_url_template: config.wikipedia.api_url_template.clone(),
            timeout: Duration::from_secs(config.wikipedia.timeout_secs),
        }
    }
}

fn parse_endpoints(raw: &[String]) -> Result<Vec<Url>> {
    raw.iter()
        .map(|s| {
            Url::parse(s).map_err(|e| EkimaeError::config(format!("invalid endpoint '{s}': {e}")))
        })
        .collect()
}

/// Parse the configured category labels, rejecting unknown ones.
pub fn parse_categories(labels: &[String]) -> Result<Vec<Category>> {
    labels
        .iter()
        .map(|label| {
            Category::from_label(label)
                .ok_or_else(|| EkimaeError::config(format!("unknown category '{label}'")))
        })
        .collect()
}

/// Check everything that cannot heal itself through retries.
///
/// Runs before any network I/O so that a bad config fails the run immediately.
pub fn validate_config(config: &AppConfig) -> Result<()> {
    parse_categories(&config.defaults.categories)?;

    if config.overpass.endpoints.is_empty() {
        return Err(EkimaeError::config("overpass.endpoints must not be empty"));
    }
    parse_endpoints(&config.overpass.endpoints)?;

    if config.overpass.max_attempts == 0 {
        return Err(EkimaeError::config("overpass.max_attempts must be at least 1"));
    }

    let threshold = config.defaults.cluster_threshold_m;
    if threshold.is_nan() || threshold < 0.0 {
        return Err(EkimaeError::config(
            "defaults.cluster_threshold_m must be a non-negative number",
        ));
    }

    if !config.wikipedia.api_url_template.contains("{lang}") {
        return Err(EkimaeError::config(
            "wikipedia.api_url_template must contain a {lang} placeholder",
        ));
    }

    if config.generation.enabled {
        validate_api_key(config)?;
    }

    Ok(())
}

/// Check that the generation API key env var is set and non-empty.
pub fn validate_api_key(config: &AppConfig) -> Result<()> {
    let var_name = &config.generation.api_key_env;
    match std::env::var(var_name) {
        Ok(val) if !val.is_empty() => Ok(()),
        _ => Err(EkimaeError::config(format!(
            "text-generation API key not found. Set the {var_name} environment variable \
             or disable generation with `[generation] enabled = false`."
        ))),
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.ekimae/`).
pub fn config_dir() -> Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| EkimaeError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.ekimae/ekimae.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| EkimaeError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| EkimaeError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| EkimaeError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| EkimaeError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| EkimaeError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

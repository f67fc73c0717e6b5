//! Shared types, error model, and configuration for Ekimae.
//!
//! This crate is the foundation depended on by all other Ekimae crates.
//! It provides:
//! - [`EkimaeError`]: the unified error type
//! - Domain types ([`StationRecord`], [`StationCluster`], [`ClusterResult`], ...)
//! - Configuration ([`AppConfig`], [`RetrySettings`], config loading and validation)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, DefaultsConfig, GenerationConfig, OverpassConfig, RetrySettings, SourcesConfig,
    WikiSettings, WikipediaConfig, config_dir, config_file_path, init_config, load_config,
    load_config_from, parse_categories, validate_api_key, validate_config,
};
pub use error::{EkimaeError, Result};
pub use types::{
    BilingualName, Category, CategoryResult, CategorySummary, ClusterResult, Coordinate,
    LocalizedText, PoiEntry, SeasonalFlag, StationCluster, StationProfile, StationRecord,
    ThematicAnalysis, WeightedTag,
};

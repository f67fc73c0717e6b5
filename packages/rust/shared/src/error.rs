//! Failure taxonomy shared by the enrichment crates.
//!
//! Errors while loading settings, station lists or the output log end a run.
//! Errors from the map-data, encyclopedia and generation services are absorbed
//! by the stage that hit them and become a degraded result plus a warning.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum EkimaeError {
    /// Bad or missing settings, detected before any request is sent.
    #[error("config error: {message}")]
    Config { message: String },

    /// One request failed: connect, timeout, or a non-2xx status.
    #[error("network error: {0}")]
    Network(String),

    /// Every endpoint in the rotation was tried and none answered usefully.
    #[error("request failed after {attempts} attempts: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },

    /// An upstream payload (Overpass, MediaWiki, station list) did not decode.
    #[error("parse error: {message}")]
    Parse { message: String },

    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Input that decodes but cannot be used: blank ids, out-of-range
    /// coordinates, a log that is not an array of results.
    #[error("validation error: {message}")]
    Validation { message: String },

    /// The title/tagline service failed or replied with unusable text.
    #[error("generation error: {0}")]
    Generation(String),
}

pub type Result<T> = std::result::Result<T, EkimaeError>;

impl EkimaeError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Attach the file that was being read or written.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

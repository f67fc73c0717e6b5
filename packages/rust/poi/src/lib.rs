//! Nearby point-of-interest enrichment from the Overpass map-data service.
//!
//! This crate provides:
//! - [`query`]: Overpass QL construction per [`Category`](ekimae_shared::Category)
//! - [`transport`]: the [`MapTransport`] seam and its `reqwest` implementation
//! - [`retry`]: endpoint rotation, per-attempt timeout and backoff
//! - [`rank`]: filtering, seasonal/landmark scoring and quota truncation
//! - [`PoiFetcher`]: sequential per-category fetching with failure isolation

pub mod fetcher;
pub mod query;
pub mod rank;
pub mod retry;
pub mod transport;

pub use fetcher::{PoiFetcher, PoiQuery};
pub use rank::{PREMIUM_QUOTA, RankContext, STANDARD_QUOTA, quota_for, rank_elements};
pub use retry::{FailureKind, RetryPolicy, execute_with_retry};
pub use transport::{HttpMapTransport, MapTransport, TransportResponse};

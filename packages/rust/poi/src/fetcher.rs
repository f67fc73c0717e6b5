//! Per-station POI enrichment: query, fetch with retry, rank, truncate.

use std::time::Duration;

use tracing::{info, instrument, warn};

use ekimae_shared::{
    Category, CategoryResult, Coordinate, EkimaeError, Result, RetrySettings, SeasonalFlag,
    StationProfile,
};

use crate::query::build_query;
use crate::rank::{OverpassResponse, RankContext, rank_elements};
use crate::retry::{RetryPolicy, execute_with_retry};
use crate::transport::{HttpMapTransport, MapTransport};

/// What to look for around one station.
#[derive(Debug, Clone, Copy)]
pub struct PoiQuery<'a> {
    pub center: Coordinate,
    pub radius_m: u32,
    pub categories: &'a [Category],
    /// Flags from the station's thematic analysis; boost nature POIs.
    pub seasonal_flags: &'a [SeasonalFlag],
    /// Supplies quota overrides and mandatory landmarks.
    pub profile: Option<&'a StationProfile>,
}

impl<'a> PoiQuery<'a> {
    fn rank_context(&self) -> RankContext<'a> {
        RankContext {
            seasonal_flags: self.seasonal_flags,
            quota_overrides: self.profile.map(|p| &p.quota_overrides),
            mandatory_landmarks: self
                .profile
                .map(|p| p.mandatory_landmarks.as_slice())
                .unwrap_or(&[]),
        }
    }
}

/// Fetches ranked POIs category by category, strictly sequentially.
pub struct PoiFetcher<T> {
    transport: T,
    policy: RetryPolicy,
    politeness_delay: Duration,
}

impl PoiFetcher<HttpMapTransport> {
    /// Production fetcher talking to the configured Overpass endpoints.
    pub fn from_settings(settings: &RetrySettings) -> Result<Self> {
        let policy = RetryPolicy::try_from(settings)?;
        // Backstop only: the retry policy cancels attempts at `request_timeout`.
        let transport = HttpMapTransport::new(settings.request_timeout + Duration::from_secs(5))?;
        Ok(Self::new(transport, policy, settings.politeness_delay))
    }
}

impl<T: MapTransport> PoiFetcher<T> {
    pub fn new(transport: T, policy: RetryPolicy, politeness_delay: Duration) -> Self {
        Self {
            transport,
            policy,
            politeness_delay,
        }
    }

    /// Fetch, rank and truncate a single category.
    ///
    /// Always waits the politeness delay first, regardless of earlier outcomes.
    pub async fn fetch_category(
        &self,
        query: &PoiQuery<'_>,
        category: Category,
    ) -> Result<CategoryResult> {
        if !self.politeness_delay.is_zero() {
            tokio::time::sleep(self.politeness_delay).await;
        }

        let ql = build_query(
            category,
            query.center,
            query.radius_m,
            self.policy.attempt_timeout().as_secs(),
        );

        let body = execute_with_retry(&self.policy, &self.transport, &ql, category.as_str()).await?;

        let response: OverpassResponse = serde_json::from_str(&body)
            .map_err(|e| EkimaeError::parse(format!("overpass response for {category}: {e}")))?;

        let result = rank_elements(category, response.elements, &query.rank_context());

        info!(
            category = %category,
            total = result.total_count,
            saved = result.saved_count,
            "category fetched"
        );

        Ok(result)
    }

    /// Fetch every requested category in order.
    ///
    /// A category whose fetch fails is logged and left out; it never stops
    /// the remaining categories.
    #[instrument(skip_all, fields(lat = query.center.lat, lon = query.center.lon, categories = query.categories.len()))]
    pub async fn fetch_all(&self, query: &PoiQuery<'_>) -> Vec<CategoryResult> {
        let mut results = Vec::with_capacity(query.categories.len());

        for &category in query.categories {
            match self.fetch_category(query, category).await {
                Ok(result) => results.push(result),
                Err(e) => {
                    warn!(category = %category, error = %e, "category fetch failed, skipping");
                }
            }
        }

        results
    }
}

//! HTTP transport seam for the map-data service.
//!
//! The retry loop only needs "POST this body to that endpoint and give me the
//! status and body back". Keeping that behind [`MapTransport`] lets tests
//! script endpoint failures without a network.

use std::future::Future;
use std::time::Duration;

use reqwest::Client;
use tracing::debug;
use url::Url;

use ekimae_shared::{EkimaeError, Result};

/// User-Agent string for map-data requests.
const USER_AGENT: &str = concat!("Ekimae/", env!("CARGO_PKG_VERSION"));

/// Raw answer from an endpoint, whatever its status.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

impl TransportResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_rate_limited(&self) -> bool {
        self.status == 429
    }
}

/// Sends a query to one map-data endpoint.
pub trait MapTransport: Send + Sync {
    /// POST `query` to `endpoint`. Connection-level failures are errors;
    /// any HTTP status, including 429 and 5xx, is a response.
    fn post(&self, endpoint: &Url, query: &str)
    -> impl Future<Output = Result<TransportResponse>> + Send;
}

/// [`MapTransport`] over `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpMapTransport {
    client: Client,
}

impl HttpMapTransport {
    /// Build a transport. `timeout` is a backstop; the retry policy enforces
    /// the per-attempt deadline itself.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| EkimaeError::Network(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

impl MapTransport for HttpMapTransport {
    async fn post(&self, endpoint: &Url, query: &str) -> Result<TransportResponse> {
        debug!(%endpoint, bytes = query.len(), "posting overpass query");

        let response = self
            .client
            .post(endpoint.as_str())
            .header(reqwest::header::CONTENT_TYPE, "text/plain; charset=utf-8")
            .body(query.to_owned())
            .send()
            .await
            .map_err(|e| EkimaeError::Network(format!("{endpoint}: {e}")))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| EkimaeError::Network(format!("{endpoint}: body read failed: {e}")))?;

        Ok(TransportResponse { status, body })
    }
}

//! Catalog HTTP client

use crate::error::{Result, UpstreamError};
use crate::types::{CatalogQuery, CatalogResponse, Source};
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Fetches the `list` of a catalog response for one source.
///
/// Implementations attempt the call exactly once and must report every
/// failure as an [`UpstreamError`] rather than panicking.
#[async_trait]
pub trait CatalogFetcher: Send + Sync {
    async fn fetch_list(
        &self,
        source: &Source,
        query: &CatalogQuery,
        timeout: Duration,
    ) -> Result<Vec<Value>>;
}

/// reqwest-backed catalog client. Timeouts are applied per call.
#[derive(Clone, Default)]
pub struct CatalogClient {
    http: reqwest::Client,
}

impl CatalogClient {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
        }
    }

    /// Append query pairs to a source endpoint, keeping any pairs it already has
    pub fn request_url(api: &str, params: &[(&str, &str)]) -> Result<Url> {
        let mut url = Url::parse(api)?;
        url.query_pairs_mut().extend_pairs(params);
        Ok(url)
    }

    /// Single GET returning the parsed JSON body
    pub async fn get_json(&self, url: Url, timeout: Duration) -> Result<Value> {
        debug!(url = %url, timeout_ms = timeout.as_millis() as u64, "Calling upstream");

        let response = self
            .http
            .get(url.clone())
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| classify(e, timeout))?;

        let status = response.status();
        if !status.is_success() {
            warn!(url = %url, status = %status, "Upstream returned error status");
            return Err(UpstreamError::Status(status.as_u16()));
        }

        let body = response.bytes().await.map_err(|e| classify(e, timeout))?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// Forward a raw query string to a source endpoint and return its JSON unchanged
    pub async fn passthrough(
        &self,
        source: &Source,
        raw_query: Option<&str>,
        timeout: Duration,
    ) -> Result<Value> {
        let mut url = Url::parse(&source.api)?;
        if let Some(extra) = raw_query.filter(|q| !q.is_empty()) {
            let query = match url.query() {
                Some(existing) if !existing.is_empty() => format!("{}&{}", existing, extra),
                _ => extra.to_string(),
            };
            url.set_query(Some(&query));
        }
        self.get_json(url, timeout).await
    }
}

fn classify(err: reqwest::Error, timeout: Duration) -> UpstreamError {
    if err.is_timeout() {
        UpstreamError::Timeout(timeout)
    } else {
        UpstreamError::Transport(Box::new(err))
    }
}

#[async_trait]
impl CatalogFetcher for CatalogClient {
    async fn fetch_list(
        &self,
        source: &Source,
        query: &CatalogQuery,
        timeout: Duration,
    ) -> Result<Vec<Value>> {
        let url = Self::request_url(&source.api, &query.params())?;
        let body = self.get_json(url, timeout).await?;
        let response: CatalogResponse = serde_json::from_value(body)?;
        Ok(response.list)
    }
}

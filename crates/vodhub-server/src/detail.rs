//! Cache-first detail lookup against a single source
//!
//! The first element of the upstream list is cached verbatim. Empty lists
//! are reported as not found and not cached, so repeated misses always go
//! back upstream.

use crate::constants::{DETAIL_CACHE_TTL, DETAIL_TIMEOUT};
use catalog_client::{CatalogFetcher, CatalogQuery, Source, UpstreamError};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error};
use ttl_cache::{CacheCategory, TtlCache};

pub struct DetailResolver {
    cache: TtlCache,
    fetcher: Arc<dyn CatalogFetcher>,
}

pub fn detail_cache_key(source_key: &str, id: &str) -> String {
    format!("{}_detail_{}", source_key, id)
}

impl DetailResolver {
    pub fn new(cache: TtlCache, fetcher: Arc<dyn CatalogFetcher>) -> Self {
        Self { cache, fetcher }
    }

    /// `Ok(None)` when the source has no record for `id`
    pub async fn resolve(&self, source: &Source, id: &str) -> Result<Option<Value>, UpstreamError> {
        let key = detail_cache_key(&source.key, id);

        if let Some(record) = self.cache.get(CacheCategory::Detail, &key).await {
            debug!(source = %source.key, id, "Detail cache hit");
            return Ok(Some(record));
        }

        let list = self
            .fetcher
            .fetch_list(source, &CatalogQuery::detail(id), DETAIL_TIMEOUT)
            .await?;

        let Some(record) = list.into_iter().next() else {
            debug!(source = %source.key, id, "Detail not found upstream");
            return Ok(None);
        };

        if let Err(e) = self
            .cache
            .set(CacheCategory::Detail, &key, record.clone(), DETAIL_CACHE_TTL)
            .await
        {
            error!(source = %source.key, id, error = %e, "Failed to cache detail record");
        }

        Ok(Some(record))
    }
}

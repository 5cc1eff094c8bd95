//! Cache-first catalog search and the streaming fan-out aggregator
//!
//! Each source is searched independently: cached list if fresh, otherwise a
//! single upstream call whose mapped result is cached (empty lists included,
//! so "no results" is not re-asked for the TTL). The streaming aggregator
//! runs one branch task per source, forwards each non-empty list the moment
//! it is ready, and sends [`SearchEvent::Done`] once every branch settled.

use crate::constants::{SEARCH_CACHE_TTL, SEARCH_TIMEOUT};
use catalog_client::{CatalogFetcher, CatalogQuery, SearchResultItem, Source, UpstreamError};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, error, warn};
use ttl_cache::{CacheCategory, TtlCache};

#[derive(Debug, Clone, PartialEq)]
pub enum SearchEvent {
    /// One source's non-empty result list
    Results {
        source_key: String,
        items: Vec<SearchResultItem>,
    },
    /// Every source has settled; always the last event
    Done,
}

pub struct SearchService {
    cache: TtlCache,
    fetcher: Arc<dyn CatalogFetcher>,
}

pub fn search_cache_key(source_key: &str, keyword: &str) -> String {
    format!("{}_{}", source_key, keyword)
}

impl SearchService {
    pub fn new(cache: TtlCache, fetcher: Arc<dyn CatalogFetcher>) -> Self {
        Self { cache, fetcher }
    }

    /// Cache-first search against one source
    pub async fn search_source(
        &self,
        source: &Source,
        keyword: &str,
    ) -> Result<Vec<SearchResultItem>, UpstreamError> {
        let key = search_cache_key(&source.key, keyword);

        if let Some(items) = self
            .cache
            .get_as::<Vec<SearchResultItem>>(CacheCategory::Search, &key)
            .await
        {
            debug!(source = %source.key, keyword, hits = items.len(), "Search cache hit");
            return Ok(items);
        }

        let raw = self
            .fetcher
            .fetch_list(source, &CatalogQuery::search(keyword), SEARCH_TIMEOUT)
            .await?;
        let items = SearchResultItem::map_list(&raw, source);

        if let Err(e) = self
            .cache
            .set_as(CacheCategory::Search, &key, &items, SEARCH_CACHE_TTL)
            .await
        {
            error!(source = %source.key, error = %e, "Failed to cache search results");
        }

        debug!(source = %source.key, keyword, hits = items.len(), "Search fetched");
        Ok(items)
    }

    /// Fan out over `sources` and stream events as branches finish.
    ///
    /// Branches keep running (and caching) if the receiver is dropped; their
    /// sends then fail and are ignored.
    pub fn stream(
        self: &Arc<Self>,
        sources: Vec<Source>,
        keyword: String,
    ) -> mpsc::Receiver<SearchEvent> {
        // One slot per possible event, so branches never wait on a slow reader
        let (tx, rx) = mpsc::channel(sources.len() + 1);
        let service = Arc::clone(self);

        tokio::spawn(async move {
            let mut branches = JoinSet::new();
            let keyword = Arc::new(keyword);

            for source in sources {
                let service = Arc::clone(&service);
                let keyword = Arc::clone(&keyword);
                let tx = tx.clone();

                branches.spawn(async move {
                    match service.search_source(&source, &keyword).await {
                        Ok(items) if !items.is_empty() => {
                            let event = SearchEvent::Results {
                                source_key: source.key.clone(),
                                items,
                            };
                            if tx.send(event).await.is_err() {
                                debug!(source = %source.key, "Search client disconnected");
                            }
                        }
                        Ok(_) => {}
                        Err(e) => {
                            warn!(
                                source = %source.key,
                                keyword = %keyword,
                                error = %e,
                                "Source search failed"
                            );
                        }
                    }
                });
            }

            while let Some(joined) = branches.join_next().await {
                if let Err(e) = joined {
                    error!(error = %e, "Search branch aborted");
                }
            }

            let _ = tx.send(SearchEvent::Done).await;
        });

        rx
    }
}

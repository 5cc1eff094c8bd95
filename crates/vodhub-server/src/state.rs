use catalog_client::{CatalogClient, CatalogFetcher};
use chrono::{DateTime, Utc};
use image_disk_cache::ImageStore;
use std::sync::Arc;
use ttl_cache::TtlCache;

use crate::detail::DetailResolver;
use crate::search::SearchService;
use crate::sites::SiteDirectory;

/// Shared application state passed to all route handlers.
///
/// Built once at startup; every cache the handlers use hangs off it.
#[derive(Clone)]
pub struct AppState {
    pub sites: Arc<SiteDirectory>,
    pub search: Arc<SearchService>,
    pub details: Arc<DetailResolver>,
    pub images: ImageStore,
    /// Concrete client for raw passthrough calls
    pub catalog: CatalogClient,
    pub cache: TtlCache,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        sites: SiteDirectory,
        cache: TtlCache,
        fetcher: Arc<dyn CatalogFetcher>,
        catalog: CatalogClient,
        images: ImageStore,
    ) -> Self {
        Self {
            sites: Arc::new(sites),
            search: Arc::new(SearchService::new(cache.clone(), fetcher.clone())),
            details: Arc::new(DetailResolver::new(cache.clone(), fetcher)),
            images,
            catalog,
            cache,
            started_at: Utc::now(),
        }
    }
}

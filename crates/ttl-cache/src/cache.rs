//! TTL cache service over a pluggable backend

use crate::backend::CacheBackend;
use crate::error::Result;
use crate::types::{CacheCategory, CacheEntry};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Category-scoped key/value cache with per-entry expiry.
///
/// Expired entries read as misses and are left in place.
#[derive(Clone)]
pub struct TtlCache {
    backend: Arc<dyn CacheBackend>,
}

impl TtlCache {
    pub fn new(backend: Arc<dyn CacheBackend>) -> Self {
        Self { backend }
    }

    /// Transient cache backed by [`crate::MemoryBackend`]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(crate::MemoryBackend::new()))
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub async fn get(&self, category: CacheCategory, key: &str) -> Option<Value> {
        let entry = self.backend.get(category, key).await?;
        if !entry.is_fresh() {
            debug!(category = %category, key, "Cache entry expired");
            return None;
        }
        Some(entry.value)
    }

    pub async fn set(
        &self,
        category: CacheCategory,
        key: &str,
        value: Value,
        ttl: Duration,
    ) -> Result<()> {
        self.backend
            .put(category, key, CacheEntry::new(value, ttl))
            .await
    }

    /// Typed read; a stored value that no longer matches `T` reads as a miss
    pub async fn get_as<T: DeserializeOwned>(
        &self,
        category: CacheCategory,
        key: &str,
    ) -> Option<T> {
        let value = self.get(category, key).await?;
        match serde_json::from_value(value) {
            Ok(typed) => Some(typed),
            Err(e) => {
                warn!(category = %category, key, error = %e, "Cached value has unexpected shape");
                None
            }
        }
    }

    pub async fn set_as<T: Serialize>(
        &self,
        category: CacheCategory,
        key: &str,
        value: &T,
        ttl: Duration,
    ) -> Result<()> {
        let value = serde_json::to_value(value)?;
        self.set(category, key, value, ttl).await
    }

    pub async fn len(&self, category: CacheCategory) -> usize {
        self.backend.len(category).await
    }
}

//! Storage backends

use crate::error::Result;
use crate::types::{CacheCategory, CacheEntry};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Raw storage for cache entries.
///
/// Backends store and return entries as-is; expiry is decided by
/// [`crate::TtlCache`]. A `put` must be visible to the next `get` as soon
/// as it returns.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, category: CacheCategory, key: &str) -> Option<CacheEntry>;

    async fn put(&self, category: CacheCategory, key: &str, entry: CacheEntry) -> Result<()>;

    /// Number of stored entries in a category, expired ones included
    async fn len(&self, category: CacheCategory) -> usize;

    fn name(&self) -> &'static str;
}

/// One map per category, indexed by [`CacheCategory::index`]
pub(crate) type CategoryMaps = [HashMap<String, CacheEntry>; 2];

/// Transient backend; contents live for the process lifetime only
#[derive(Default)]
pub struct MemoryBackend {
    maps: RwLock<CategoryMaps>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheBackend for MemoryBackend {
    async fn get(&self, category: CacheCategory, key: &str) -> Option<CacheEntry> {
        let maps = self.maps.read().await;
        maps[category.index()].get(key).cloned()
    }

    async fn put(&self, category: CacheCategory, key: &str, entry: CacheEntry) -> Result<()> {
        let mut maps = self.maps.write().await;
        maps[category.index()].insert(key.to_string(), entry);
        Ok(())
    }

    async fn len(&self, category: CacheCategory) -> usize {
        self.maps.read().await[category.index()].len()
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_memory_put_and_get() {
        let backend = MemoryBackend::new();
        let entry = CacheEntry {
            value: json!({"title": "X"}),
            expires_at: i64::MAX,
        };

        backend
            .put(CacheCategory::Search, "siteA_x", entry.clone())
            .await
            .unwrap();

        assert_eq!(
            backend.get(CacheCategory::Search, "siteA_x").await,
            Some(entry)
        );
        assert_eq!(backend.len(CacheCategory::Search).await, 1);
    }

    #[tokio::test]
    async fn test_categories_do_not_collide() {
        let backend = MemoryBackend::new();
        let search = CacheEntry {
            value: json!("search"),
            expires_at: i64::MAX,
        };
        let detail = CacheEntry {
            value: json!("detail"),
            expires_at: i64::MAX,
        };

        backend
            .put(CacheCategory::Search, "same", search.clone())
            .await
            .unwrap();
        backend
            .put(CacheCategory::Detail, "same", detail.clone())
            .await
            .unwrap();

        assert_eq!(backend.get(CacheCategory::Search, "same").await, Some(search));
        assert_eq!(backend.get(CacheCategory::Detail, "same").await, Some(detail));
    }
}

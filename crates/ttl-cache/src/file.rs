//! Persisted backend: in-memory maps mirrored to one JSON document per category
//!
//! Every `put` rewrites the whole document for its category. Cost grows with
//! the number of entries in that category; this is a known bottleneck for
//! large caches.

use crate::backend::{CacheBackend, CategoryMaps};
use crate::error::Result;
use crate::types::{CacheCategory, CacheEntry};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

pub struct FileBackend {
    dir: PathBuf,
    maps: RwLock<CategoryMaps>,
    /// Held across snapshot and rewrite so concurrent puts cannot drop each other's entries
    write_locks: [Mutex<()>; 2],
}

impl FileBackend {
    /// Open (or create) the cache directory and load any existing documents
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await?;

        let mut maps = CategoryMaps::default();
        for category in CacheCategory::ALL {
            let path = document_path(&dir, category);
            maps[category.index()] = load_document(&path).await;
        }

        info!(
            dir = ?dir,
            search = maps[0].len(),
            detail = maps[1].len(),
            "Persisted cache loaded"
        );

        Ok(Self {
            dir,
            maps: RwLock::new(maps),
            write_locks: [Mutex::new(()), Mutex::new(())],
        })
    }

    pub fn document_path(&self, category: CacheCategory) -> PathBuf {
        document_path(&self.dir, category)
    }

    async fn flush(&self, category: CacheCategory) -> Result<()> {
        let json = {
            let maps = self.maps.read().await;
            serde_json::to_vec(&maps[category.index()])?
        };

        let path = self.document_path(category);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, &json).await?;
        fs::rename(&tmp, &path).await?;

        debug!(category = %category, bytes = json.len(), "Cache document rewritten");
        Ok(())
    }
}

fn document_path(dir: &Path, category: CacheCategory) -> PathBuf {
    dir.join(format!("{}-cache.json", category.as_str()))
}

async fn load_document(path: &Path) -> HashMap<String, CacheEntry> {
    let bytes = match fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return HashMap::new(),
        Err(e) => {
            warn!(path = ?path, error = %e, "Failed to read cache document, starting empty");
            return HashMap::new();
        }
    };

    match serde_json::from_slice(&bytes) {
        Ok(map) => map,
        Err(e) => {
            warn!(path = ?path, error = %e, "Invalid cache document, starting empty");
            HashMap::new()
        }
    }
}

#[async_trait]
impl CacheBackend for FileBackend {
    async fn get(&self, category: CacheCategory, key: &str) -> Option<CacheEntry> {
        let maps = self.maps.read().await;
        maps[category.index()].get(key).cloned()
    }

    async fn put(&self, category: CacheCategory, key: &str, entry: CacheEntry) -> Result<()> {
        let _guard = self.write_locks[category.index()].lock().await;

        {
            let mut maps = self.maps.write().await;
            maps[category.index()].insert(key.to_string(), entry);
        }

        self.flush(category).await
    }

    async fn len(&self, category: CacheCategory) -> usize {
        self.maps.read().await[category.index()].len()
    }

    fn name(&self) -> &'static str {
        "file"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn entry(value: serde_json::Value) -> CacheEntry {
        CacheEntry {
            value,
            expires_at: i64::MAX,
        }
    }

    #[tokio::test]
    async fn test_put_rewrites_category_document() {
        let dir = tempdir().unwrap();
        let backend = FileBackend::open(dir.path()).await.unwrap();

        backend
            .put(CacheCategory::Search, "siteA_batman", entry(json!([1, 2])))
            .await
            .unwrap();

        let raw = std::fs::read_to_string(backend.document_path(CacheCategory::Search)).unwrap();
        let doc: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(doc["siteA_batman"]["value"], json!([1, 2]));

        // The other category has not been written yet
        assert!(!backend.document_path(CacheCategory::Detail).exists());
    }

    #[tokio::test]
    async fn test_reopen_restores_entries() {
        let dir = tempdir().unwrap();
        {
            let backend = FileBackend::open(dir.path()).await.unwrap();
            backend
                .put(CacheCategory::Detail, "siteA_detail_1", entry(json!({"vod_id": 1})))
                .await
                .unwrap();
        }

        let backend = FileBackend::open(dir.path()).await.unwrap();
        let restored = backend.get(CacheCategory::Detail, "siteA_detail_1").await;
        assert_eq!(restored.unwrap().value, json!({"vod_id": 1}));
        assert_eq!(backend.len(CacheCategory::Search).await, 0);
    }

    #[tokio::test]
    async fn test_invalid_document_starts_empty() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("search-cache.json"), b"not json").unwrap();

        let backend = FileBackend::open(dir.path()).await.unwrap();
        assert_eq!(backend.len(CacheCategory::Search).await, 0);
    }

    #[tokio::test]
    async fn test_concurrent_puts_keep_every_entry() {
        let dir = tempdir().unwrap();
        let backend = Arc::new(FileBackend::open(dir.path()).await.unwrap());

        let mut handles = Vec::new();
        for i in 0..16 {
            let backend = backend.clone();
            handles.push(tokio::spawn(async move {
                backend
                    .put(CacheCategory::Search, &format!("k{}", i), entry(json!(i)))
                    .await
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let reopened = FileBackend::open(dir.path()).await.unwrap();
        assert_eq!(reopened.len(CacheCategory::Search).await, 16);
    }
}

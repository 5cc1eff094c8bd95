//! Read-through image store

use crate::error::{ImageCacheError, Result};
use crate::eviction::{EvictionTrigger, Sweeper, SWEEP_THRESHOLD};
use crate::key::ImageKey;
use futures::StreamExt;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

pub struct ImageStoreConfig {
    pub root: PathBuf,
    pub max_bytes: u64,
    pub upstream_base: String,
    pub timeout: Duration,
    pub sweep_threshold: u32,
}

impl Default for ImageStoreConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("./cache/images"),
            max_bytes: 1024 * 1024 * 1024, // 1GB
            upstream_base: "https://image.tmdb.org/t/p".to_string(),
            timeout: Duration::from_secs(10),
            sweep_threshold: SWEEP_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Miss,
}

impl CacheStatus {
    pub fn as_header(&self) -> &'static str {
        match self {
            CacheStatus::Hit => "HIT",
            CacheStatus::Miss => "MISS",
        }
    }
}

/// An open cached file, ready to be streamed to a client
pub struct CachedImage {
    pub file: File,
    pub len: u64,
    pub status: CacheStatus,
}

#[derive(Debug, Clone, Default)]
pub struct ImageStoreStats {
    pub hits: u64,
    pub misses: u64,
    pub pending_inserts: u32,
}

type InflightMap = Mutex<HashMap<PathBuf, Arc<tokio::sync::Mutex<()>>>>;

/// Read-through image store. Cheap to clone; clones share one cache.
#[derive(Clone)]
pub struct ImageStore {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    root: PathBuf,
    upstream_base: String,
    timeout: Duration,
    http: reqwest::Client,
    eviction: EvictionTrigger,
    /// Per-path download locks so concurrent misses fetch once
    inflight: InflightMap,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ImageStore {
    /// Build the store and the sweeper that serves its eviction requests.
    /// The caller decides where the sweeper runs, normally `tokio::spawn(sweeper.run())`.
    pub fn new(config: ImageStoreConfig) -> (Self, Sweeper) {
        let (tx, rx) = mpsc::channel(1);
        let sweeper = Sweeper::new(config.root.clone(), config.max_bytes, rx);

        let inner = StoreInner {
            root: config.root,
            upstream_base: config.upstream_base,
            timeout: config.timeout,
            http: reqwest::Client::new(),
            eviction: EvictionTrigger::new(config.sweep_threshold, tx),
            inflight: Mutex::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        };

        (
            Self {
                inner: Arc::new(inner),
            },
            sweeper,
        )
    }

    /// Ensure the cache root exists
    pub async fn init(&self) -> Result<()> {
        fs::create_dir_all(&self.inner.root).await?;
        info!(root = ?self.inner.root, "Image cache initialized");
        Ok(())
    }

    /// Serve `(size, filename)` from disk, downloading it first on a miss.
    ///
    /// Parameters are validated before the filesystem is touched. A miss is
    /// fetched on its own task, so dropping this future (a client going
    /// away) does not abort the download; the file is still cached.
    pub async fn get(&self, size: &str, filename: &str) -> Result<CachedImage> {
        let key = ImageKey::parse(size, filename)?;
        let path = key.path_under(&self.inner.root);

        if let Some(image) = self.inner.open_hit(&path).await? {
            return Ok(image);
        }

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move { inner.fill(key, path).await })
            .await
            .map_err(|e| ImageCacheError::Io(Box::new(std::io::Error::other(e))))?
    }

    pub fn stats(&self) -> ImageStoreStats {
        ImageStoreStats {
            hits: self.inner.hits.load(Ordering::Relaxed),
            misses: self.inner.misses.load(Ordering::Relaxed),
            pending_inserts: self.inner.eviction.pending(),
        }
    }
}

impl StoreInner {
    /// Download `key` into `path` unless another caller already did
    async fn fill(&self, key: ImageKey, path: PathBuf) -> Result<CachedImage> {
        let entry = InflightEntry::acquire(&self.inflight, &path);
        let _held = Arc::clone(&entry.lock).lock_owned().await;

        // Another request may have finished the download while we waited
        if let Some(image) = self.open_hit(&path).await? {
            return Ok(image);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let len = self.download(&key, &path).await?;
        self.eviction.record_insert();

        let file = File::open(&path).await?;
        Ok(CachedImage {
            file,
            len,
            status: CacheStatus::Miss,
        })
    }

    /// Open a non-empty cached file and refresh its timestamp
    async fn open_hit(&self, path: &Path) -> Result<Option<CachedImage>> {
        let meta = match fs::metadata(path).await {
            Ok(meta) => meta,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        if !meta.is_file() || meta.len() == 0 {
            return Ok(None);
        }

        if let Err(e) = touch(path).await {
            warn!(path = ?path, error = %e, "Failed to refresh image timestamp");
        }

        let file = match File::open(path).await {
            Ok(file) => file,
            // Evicted between the metadata check and the open
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        self.hits.fetch_add(1, Ordering::Relaxed);
        debug!(path = ?path, "Image cache hit");
        Ok(Some(CachedImage {
            file,
            len: meta.len(),
            status: CacheStatus::Hit,
        }))
    }

    /// Stream the upstream body into a temporary sibling, then move it into
    /// place. Nothing partial is left behind on failure.
    async fn download(&self, key: &ImageKey, path: &Path) -> Result<u64> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let partial = partial_path(path);
        match self.stream_to(key, &partial).await {
            Ok(len) => {
                if let Err(e) = fs::rename(&partial, path).await {
                    let _ = fs::remove_file(&partial).await;
                    return Err(e.into());
                }
                debug!(path = ?path, bytes = len, "Image cached");
                Ok(len)
            }
            Err(e) => {
                if let Err(rm) = fs::remove_file(&partial).await {
                    if rm.kind() != ErrorKind::NotFound {
                        warn!(path = ?partial, error = %rm, "Failed to remove partial image");
                    }
                }
                warn!(
                    url = %key.upstream_url(&self.upstream_base),
                    error = %e,
                    "Image download failed"
                );
                Err(e)
            }
        }
    }

    async fn stream_to(&self, key: &ImageKey, dest: &Path) -> Result<u64> {
        let url = key.upstream_url(&self.upstream_base);
        debug!(url = %url, "Fetching image from upstream");

        let response = self.http.get(&url).timeout(self.timeout).send().await?;
        if !response.status().is_success() {
            return Err(ImageCacheError::UpstreamStatus(response.status().as_u16()));
        }

        let mut file = File::create(dest).await?;
        let mut written: u64 = 0;
        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;
        file.sync_all().await?;

        if written == 0 {
            return Err(ImageCacheError::EmptyBody);
        }
        Ok(written)
    }
}

/// Holds a path's download lock registration; the last holder removes it
/// from the map on drop, whatever way the download ended.
struct InflightEntry<'a> {
    map: &'a InflightMap,
    path: PathBuf,
    lock: Arc<tokio::sync::Mutex<()>>,
}

impl<'a> InflightEntry<'a> {
    fn acquire(map: &'a InflightMap, path: &Path) -> Self {
        let mut inflight = map.lock().unwrap_or_else(|e| e.into_inner());
        let lock = inflight
            .entry(path.to_path_buf())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone();
        Self {
            map,
            path: path.to_path_buf(),
            lock,
        }
    }
}

impl Drop for InflightEntry<'_> {
    fn drop(&mut self) {
        let mut inflight = self.map.lock().unwrap_or_else(|e| e.into_inner());
        let last = inflight
            .get(&self.path)
            .is_some_and(|l| Arc::ptr_eq(l, &self.lock) && Arc::strong_count(l) == 2);
        if last {
            inflight.remove(&self.path);
        }
    }
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

/// Set the file's modification time to now; it is the eviction clock
async fn touch(path: &Path) -> std::io::Result<()> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || {
        let file = std::fs::OpenOptions::new().write(true).open(&path)?;
        file.set_modified(SystemTime::now())
    })
    .await
    .map_err(std::io::Error::other)?
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::extract::Path as UrlPath;
    use axum::http::{header, StatusCode};
    use axum::response::{IntoResponse, Response};
    use axum::routing::get;
    use axum::Router;
    use std::sync::atomic::AtomicUsize;
    use tempfile::tempdir;
    use tokio::io::AsyncReadExt;

    const IMAGE_BYTES: &[u8] = b"\xff\xd8\xff\xe0fake-jpeg-bytes";

    async fn spawn_upstream(calls: Arc<AtomicUsize>) -> String {
        let app = Router::new().route(
            "/t/p/{size}/{filename}",
            get(move |UrlPath((_size, filename)): UrlPath<(String, String)>| {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    let response: Response = match filename.as_str() {
                        "missing.jpg" => StatusCode::NOT_FOUND.into_response(),
                        "empty.jpg" => Vec::<u8>::new().into_response(),
                        "slow.jpg" => {
                            tokio::time::sleep(Duration::from_millis(100)).await;
                            IMAGE_BYTES.to_vec().into_response()
                        }
                        // Promises more bytes than it sends, then drops the connection
                        "truncated.jpg" => {
                            let chunks: Vec<std::io::Result<Vec<u8>>> = vec![
                                Ok(IMAGE_BYTES.to_vec()),
                                Err(std::io::Error::other("connection lost")),
                            ];
                            Response::builder()
                                .header(header::CONTENT_LENGTH, "4096")
                                .body(Body::from_stream(futures::stream::iter(chunks)))
                                .unwrap()
                        }
                        _ => IMAGE_BYTES.to_vec().into_response(),
                    };
                    response
                }
            }),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}/t/p", addr)
    }

    fn store_for(root: &Path, upstream_base: String) -> ImageStore {
        let (store, _sweeper) = ImageStore::new(ImageStoreConfig {
            root: root.to_path_buf(),
            upstream_base,
            ..ImageStoreConfig::default()
        });
        store
    }

    fn inflight_len(store: &ImageStore) -> usize {
        store.inner.inflight.lock().unwrap().len()
    }

    async fn read_all(mut image: CachedImage) -> Vec<u8> {
        let mut buf = Vec::new();
        image.file.read_to_end(&mut buf).await.unwrap();
        buf
    }

    #[tokio::test]
    async fn test_miss_then_hit_fetches_once() {
        let dir = tempdir().unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let store = store_for(dir.path(), spawn_upstream(calls.clone()).await);
        store.init().await.unwrap();

        let first = store.get("w500", "abc.jpg").await.unwrap();
        assert_eq!(first.status, CacheStatus::Miss);
        assert_eq!(first.len, IMAGE_BYTES.len() as u64);
        assert_eq!(read_all(first).await, IMAGE_BYTES);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let path = dir.path().join("w500/abc.jpg");
        assert!(std::fs::metadata(&path).unwrap().len() > 0);

        // Age the file so the refresh on hit is observable
        let old = SystemTime::now() - Duration::from_secs(3600);
        std::fs::OpenOptions::new()
            .write(true)
            .open(&path)
            .unwrap()
            .set_modified(old)
            .unwrap();

        let second = store.get("w500", "abc.jpg").await.unwrap();
        assert_eq!(second.status, CacheStatus::Hit);
        assert_eq!(read_all(second).await, IMAGE_BYTES);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let refreshed = std::fs::metadata(&path).unwrap().modified().unwrap();
        assert!(refreshed > old + Duration::from_secs(1800));

        let stats = store.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.pending_inserts, 1);
    }

    #[tokio::test]
    async fn test_invalid_parameters_touch_nothing() {
        let dir = tempdir().unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let store = store_for(&dir.path().join("root"), spawn_upstream(calls.clone()).await);

        for (size, filename) in [("w500", "../secret"), ("w500", "a/b.jpg"), ("w9000", "a.jpg")] {
            let err = store.get(size, filename).await.err().unwrap();
            assert!(err.is_client_error());
        }

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(!dir.path().join("root").exists());
    }

    #[tokio::test]
    async fn test_upstream_failure_leaves_no_file() {
        let dir = tempdir().unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let store = store_for(dir.path(), spawn_upstream(calls).await);

        let err = store.get("w500", "missing.jpg").await.err().unwrap();
        assert!(matches!(err, ImageCacheError::UpstreamStatus(404)));
        assert_eq!(inflight_len(&store), 0);
        assert!(!dir.path().join("w500/missing.jpg").exists());
        assert!(!dir.path().join("w500/missing.jpg.part").exists());
    }

    #[tokio::test]
    async fn test_empty_body_is_not_cached() {
        let dir = tempdir().unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let store = store_for(dir.path(), spawn_upstream(calls.clone()).await);

        let err = store.get("w92", "empty.jpg").await.err().unwrap();
        assert!(matches!(err, ImageCacheError::EmptyBody));
        assert!(!dir.path().join("w92/empty.jpg").exists());

        // Retried on the next request rather than served as a hit
        assert!(store.get("w92", "empty.jpg").await.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_broken_body_leaves_no_partial_file() {
        let dir = tempdir().unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let store = store_for(dir.path(), spawn_upstream(calls.clone()).await);

        assert!(store.get("w500", "truncated.jpg").await.is_err());
        assert!(!dir.path().join("w500/truncated.jpg").exists());
        assert!(!dir.path().join("w500/truncated.jpg.part").exists());
        assert_eq!(inflight_len(&store), 0);

        // Nothing was cached, so the next request goes upstream again
        assert!(store.get("w500", "truncated.jpg").await.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_abandoned_request_still_caches() {
        let dir = tempdir().unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let store = store_for(dir.path(), spawn_upstream(calls.clone()).await);

        // The caller gives up long before the 100ms upstream answers
        let abandoned =
            tokio::time::timeout(Duration::from_millis(30), store.get("w500", "slow.jpg")).await;
        assert!(abandoned.is_err());

        tokio::time::sleep(Duration::from_millis(300)).await;

        let path = dir.path().join("w500/slow.jpg");
        assert_eq!(std::fs::metadata(&path).unwrap().len(), IMAGE_BYTES.len() as u64);
        assert!(!dir.path().join("w500/slow.jpg.part").exists());
        assert_eq!(inflight_len(&store), 0);
        assert_eq!(store.stats().pending_inserts, 1);

        let image = store.get("w500", "slow.jpg").await.unwrap();
        assert_eq!(image.status, CacheStatus::Hit);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_zero_byte_file_is_treated_as_miss() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("w185")).unwrap();
        std::fs::write(dir.path().join("w185/abc.jpg"), b"").unwrap();

        let calls = Arc::new(AtomicUsize::new(0));
        let store = store_for(dir.path(), spawn_upstream(calls.clone()).await);

        let image = store.get("w185", "abc.jpg").await.unwrap();
        assert_eq!(image.status, CacheStatus::Miss);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_concurrent_misses_fetch_once() {
        let dir = tempdir().unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let store = Arc::new(store_for(dir.path(), spawn_upstream(calls.clone()).await));

        let a = tokio::spawn({
            let store = store.clone();
            async move { store.get("w342", "slow.jpg").await.map(|i| i.status) }
        });
        let b = tokio::spawn({
            let store = store.clone();
            async move { store.get("w342", "slow.jpg").await.map(|i| i.status) }
        });

        let mut statuses = vec![a.await.unwrap().unwrap(), b.await.unwrap().unwrap()];
        statuses.sort_by_key(|s| s.as_header());

        assert_eq!(statuses, vec![CacheStatus::Hit, CacheStatus::Miss]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(inflight_len(&store), 0);
    }

    #[tokio::test]
    async fn test_threshold_inserts_request_a_sweep() {
        let dir = tempdir().unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let (store, sweeper) = ImageStore::new(ImageStoreConfig {
            root: dir.path().to_path_buf(),
            max_bytes: (IMAGE_BYTES.len() * 2) as u64,
            upstream_base: spawn_upstream(calls).await,
            sweep_threshold: 3,
            ..ImageStoreConfig::default()
        });

        for name in ["a.jpg", "b.jpg", "c.jpg"] {
            store.get("w500", name).await.unwrap();
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(store.stats().pending_inserts, 0);

        drop(store);
        sweeper.run().await;

        // 3 files over a 2-file budget: only the newest survives the trim to 90%
        let remaining: Vec<_> = std::fs::read_dir(dir.path().join("w500"))
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(remaining, vec!["c.jpg".to_string()]);
    }
}

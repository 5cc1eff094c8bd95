//! Site directory: the list of registered upstream catalogs
//!
//! Read from a remote JSON document when one is configured (reused for a few
//! minutes), falling back silently to a local document when the remote is
//! unavailable or malformed. Both documents have the shape `{"sites": [...]}`.

use crate::constants::{SITE_DIRECTORY_TIMEOUT, SITE_DIRECTORY_TTL};
use catalog_client::Source;
use moka::future::Cache;
use serde_json::Value;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, warn};

#[derive(Debug)]
pub enum SiteDirectoryError {
    Http(reqwest::Error),
    Status(u16),
    Io(std::io::Error),
    Json(serde_json::Error),
    /// Document parsed but `sites` is missing or not an array
    Shape,
}

impl fmt::Display for SiteDirectoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http(e) => write!(f, "HTTP error: {}", e),
            Self::Status(code) => write!(f, "Site directory returned status {}", code),
            Self::Io(e) => write!(f, "IO error: {}", e),
            Self::Json(e) => write!(f, "JSON error: {}", e),
            Self::Shape => write!(f, "Site directory must contain a `sites` array"),
        }
    }
}

impl std::error::Error for SiteDirectoryError {}

pub struct SiteDirectory {
    http: reqwest::Client,
    remote_url: Option<String>,
    local_path: PathBuf,
    remote: Cache<(), Arc<Vec<Source>>>,
}

impl SiteDirectory {
    pub fn new(remote_url: Option<String>, local_path: PathBuf) -> Self {
        let remote = Cache::builder()
            .max_capacity(1)
            .time_to_live(SITE_DIRECTORY_TTL)
            .build();

        Self {
            http: reqwest::Client::new(),
            remote_url,
            local_path,
            remote,
        }
    }

    /// Current list of sources. Never fails; an unusable directory yields no sources.
    pub async fn sources(&self) -> Arc<Vec<Source>> {
        if let Some(url) = &self.remote_url {
            match self.remote.try_get_with((), self.fetch_remote(url)).await {
                Ok(sites) => return sites,
                Err(e) => warn!(
                    url = %url,
                    error = %e,
                    "Remote site directory unavailable, using local file"
                ),
            }
        }

        match self.load_local().await {
            Ok(sites) => Arc::new(sites),
            Err(e) => {
                error!(path = ?self.local_path, error = %e, "Failed to load local site directory");
                Arc::new(Vec::new())
            }
        }
    }

    /// Look up one source by key
    pub async fn find(&self, key: &str) -> Option<Source> {
        self.sources().await.iter().find(|s| s.key == key).cloned()
    }

    async fn fetch_remote(&self, url: &str) -> Result<Arc<Vec<Source>>, SiteDirectoryError> {
        debug!(url = %url, "Fetching remote site directory");
        let response = self
            .http
            .get(url)
            .timeout(SITE_DIRECTORY_TIMEOUT)
            .send()
            .await
            .map_err(SiteDirectoryError::Http)?;

        if !response.status().is_success() {
            return Err(SiteDirectoryError::Status(response.status().as_u16()));
        }

        let body = response.bytes().await.map_err(SiteDirectoryError::Http)?;
        let doc: Value = serde_json::from_slice(&body).map_err(SiteDirectoryError::Json)?;
        Ok(Arc::new(parse_sites(doc)?))
    }

    async fn load_local(&self) -> Result<Vec<Source>, SiteDirectoryError> {
        let bytes = tokio::fs::read(&self.local_path)
            .await
            .map_err(SiteDirectoryError::Io)?;
        let doc: Value = serde_json::from_slice(&bytes).map_err(SiteDirectoryError::Json)?;
        parse_sites(doc)
    }
}

fn parse_sites(mut doc: Value) -> Result<Vec<Source>, SiteDirectoryError> {
    let sites = doc.get_mut("sites").map(Value::take);
    match sites {
        Some(sites @ Value::Array(_)) => {
            serde_json::from_value(sites).map_err(SiteDirectoryError::Json)
        }
        _ => Err(SiteDirectoryError::Shape),
    }
}

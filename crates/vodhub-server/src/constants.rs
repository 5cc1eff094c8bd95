use std::time::Duration;

// --- Cache lifetimes ---

/// How long a per-source search result list stays fresh.
pub const SEARCH_CACHE_TTL: Duration = Duration::from_secs(600);

/// How long a detail record stays fresh.
pub const DETAIL_CACHE_TTL: Duration = Duration::from_secs(3600);

/// How long a remotely fetched site directory is reused.
pub const SITE_DIRECTORY_TTL: Duration = Duration::from_secs(300);

// --- Upstream timeouts ---

pub const SEARCH_TIMEOUT: Duration = Duration::from_secs(8);

pub const DETAIL_TIMEOUT: Duration = Duration::from_secs(8);

pub const IMAGE_TIMEOUT: Duration = Duration::from_secs(10);

pub const PROXY_TIMEOUT: Duration = Duration::from_secs(10);

pub const SITE_DIRECTORY_TIMEOUT: Duration = Duration::from_secs(10);

// --- Image responses ---

pub const IMAGE_CACHE_CONTROL: &str = "public, max-age=86400";

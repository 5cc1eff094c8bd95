use std::env;
use std::path::PathBuf;

/// Which TTL cache backend to run with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheBackendKind {
    Memory,
    File,
}

impl CacheBackendKind {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "memory" => Some(Self::Memory),
            "file" | "json" => Some(Self::File),
            _ => None,
        }
    }
}

/// Application configuration parsed from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub cache_backend: CacheBackendKind,
    pub cache_dir: PathBuf,
    pub image_cache_dir: PathBuf,
    pub image_cache_max_bytes: u64,
    pub image_upstream_url: String,
    pub sites_url: Option<String>,
    pub sites_file: PathBuf,
    pub public_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3000,
            cache_backend: CacheBackendKind::Memory,
            cache_dir: PathBuf::from("./cache"),
            image_cache_dir: PathBuf::from("./cache/images"),
            image_cache_max_bytes: 1024 * 1024 * 1024, // 1GB
            image_upstream_url: "https://image.tmdb.org/t/p".to_string(),
            sites_url: None,
            sites_file: PathBuf::from("./sites.json"),
            public_path: PathBuf::from("./public"),
        }
    }
}

impl Config {
    /// Parse configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let port = get("PORT")
            .and_then(|p| p.parse().ok())
            .unwrap_or(defaults.port);

        let cache_backend = match get("CACHE_BACKEND") {
            Some(value) => CacheBackendKind::parse(&value).unwrap_or_else(|| {
                tracing::warn!(value = %value, "Unknown CACHE_BACKEND, using memory");
                CacheBackendKind::Memory
            }),
            None => defaults.cache_backend,
        };

        let cache_dir = get("CACHE_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.cache_dir);

        let image_cache_dir = get("IMAGE_CACHE_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.image_cache_dir);

        let image_cache_max_bytes = get("IMAGE_CACHE_MAX_BYTES")
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.image_cache_max_bytes);

        let image_upstream_url = get("IMAGE_UPSTREAM_URL").unwrap_or(defaults.image_upstream_url);

        let sites_url = get("SITES_URL").filter(|s| !s.trim().is_empty());

        let sites_file = get("SITES_FILE")
            .map(PathBuf::from)
            .unwrap_or(defaults.sites_file);

        let public_path = get("PUBLIC_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.public_path);

        Self {
            port,
            cache_backend,
            cache_dir,
            image_cache_dir,
            image_cache_max_bytes,
            image_upstream_url,
            sites_url,
            sites_file,
            public_path,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]);
        assert_eq!(config.port, 3000);
        assert_eq!(config.cache_backend, CacheBackendKind::Memory);
        assert_eq!(config.image_cache_max_bytes, 1024 * 1024 * 1024);
        assert_eq!(config.image_upstream_url, "https://image.tmdb.org/t/p");
        assert!(config.sites_url.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("PORT", "8080"),
            ("CACHE_BACKEND", "File"),
            ("CACHE_DIR", "/var/cache/vodhub"),
            ("IMAGE_CACHE_MAX_BYTES", "1048576"),
            ("SITES_URL", "https://example.com/sites.json"),
        ]);
        assert_eq!(config.port, 8080);
        assert_eq!(config.cache_backend, CacheBackendKind::File);
        assert_eq!(config.cache_dir, PathBuf::from("/var/cache/vodhub"));
        assert_eq!(config.image_cache_max_bytes, 1_048_576);
        assert_eq!(
            config.sites_url.as_deref(),
            Some("https://example.com/sites.json")
        );
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = config_from(&[
            ("PORT", "not-a-port"),
            ("CACHE_BACKEND", "redis"),
            ("SITES_URL", "  "),
        ]);
        assert_eq!(config.port, 3000);
        assert_eq!(config.cache_backend, CacheBackendKind::Memory);
        assert!(config.sites_url.is_none());
    }
}

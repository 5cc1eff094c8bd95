//! Cache types

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::time::Duration;

/// Namespace partition of the cache. The same key string may be used in
/// both categories without colliding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheCategory {
    Search,
    Detail,
}

impl CacheCategory {
    pub const ALL: [CacheCategory; 2] = [CacheCategory::Search, CacheCategory::Detail];

    pub fn as_str(&self) -> &'static str {
        match self {
            CacheCategory::Search => "search",
            CacheCategory::Detail => "detail",
        }
    }

    pub(crate) fn index(&self) -> usize {
        match self {
            CacheCategory::Search => 0,
            CacheCategory::Detail => 1,
        }
    }
}

impl fmt::Display for CacheCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored value plus its absolute expiry in unix milliseconds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub value: Value,
    pub expires_at: i64,
}

impl CacheEntry {
    /// Create an entry that expires `ttl` after now
    pub fn new(value: Value, ttl: Duration) -> Self {
        let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        Self {
            value,
            expires_at: now_millis().saturating_add(ttl_ms),
        }
    }

    /// An entry is fresh strictly before its expiry instant
    pub fn is_fresh_at(&self, now_ms: i64) -> bool {
        now_ms < self.expires_at
    }

    pub fn is_fresh(&self) -> bool {
        self.is_fresh_at(now_millis())
    }
}

pub(crate) fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

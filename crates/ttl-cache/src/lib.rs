//! Category-scoped TTL cache
//!
//! Stores opaque JSON payloads under `(category, key)` with an absolute
//! expiry. Reads of expired entries behave as misses but never delete the
//! entry. Storage is pluggable through [`CacheBackend`]: a transient
//! in-memory map, or the same map mirrored to one JSON document per
//! category.

mod backend;
mod cache;
mod error;
mod file;
mod types;

pub use backend::{CacheBackend, MemoryBackend};
pub use cache::TtlCache;
pub use error::{CacheError, Result};
pub use file::FileBackend;
pub use types::{CacheCategory, CacheEntry};

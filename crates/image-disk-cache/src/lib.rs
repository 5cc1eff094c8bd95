//! On-disk image cache
//!
//! Images are addressed by `(size, filename)` and stored at
//! `{root}/{size}/{filename}`. A file's modification time doubles as its
//! last-access time: hits refresh it, and the eviction sweep removes the
//! oldest files first once the tree exceeds its byte budget. Sweeps are
//! requested every [`SWEEP_THRESHOLD`] insertions and run on a background
//! task so requests never wait for them.

mod error;
mod eviction;
mod key;
mod store;

pub use error::{ImageCacheError, Result};
pub use eviction::{sweep, EvictionTrigger, SweepReport, Sweeper, SWEEP_THRESHOLD};
pub use key::{content_type_for, validate_filename, ImageKey, ImageSize};
pub use store::{CacheStatus, CachedImage, ImageStore, ImageStoreConfig, ImageStoreStats};

//! Client for upstream VOD catalog APIs
//!
//! Each registered source exposes the same query surface:
//!
//! - `GET {api}?ac=detail&wd={keyword}` - keyword search
//! - `GET {api}?ac=detail&ids={id}` - detail lookup
//!
//! and answers with `{"list": [...]}`. Calls are attempted exactly once
//! with a hard timeout; every failure comes back as an [`UpstreamError`].

mod client;
mod error;
mod types;

pub use client::{CatalogClient, CatalogFetcher};
pub use error::{Result, UpstreamError};
pub use types::{CatalogQuery, CatalogResponse, EpisodeGroup, SearchResultItem, Source};

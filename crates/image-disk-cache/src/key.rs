//! Cache keys and their validation
//!
//! Both parts of a key end up as path components under the cache root, so
//! they are checked against allow-lists before any filesystem access.

use crate::error::{ImageCacheError, Result};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

const MAX_FILENAME_LEN: usize = 255;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageSize {
    W92,
    W154,
    W185,
    W300,
    W342,
    W500,
    W780,
    W1280,
    Original,
}

impl ImageSize {
    pub const ALL: [ImageSize; 9] = [
        ImageSize::W92,
        ImageSize::W154,
        ImageSize::W185,
        ImageSize::W300,
        ImageSize::W342,
        ImageSize::W500,
        ImageSize::W780,
        ImageSize::W1280,
        ImageSize::Original,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ImageSize::W92 => "w92",
            ImageSize::W154 => "w154",
            ImageSize::W185 => "w185",
            ImageSize::W300 => "w300",
            ImageSize::W342 => "w342",
            ImageSize::W500 => "w500",
            ImageSize::W780 => "w780",
            ImageSize::W1280 => "w1280",
            ImageSize::Original => "original",
        }
    }
}

impl FromStr for ImageSize {
    type Err = ImageCacheError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|size| size.as_str() == s)
            .ok_or_else(|| ImageCacheError::InvalidSize(s.to_string()))
    }
}

impl fmt::Display for ImageSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Accept only `[A-Za-z0-9._-]+`, and never `.` or `..`
pub fn validate_filename(filename: &str) -> Result<()> {
    let allowed = !filename.is_empty()
        && filename.len() <= MAX_FILENAME_LEN
        && filename != "."
        && filename != ".."
        && filename
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b'-'));

    if allowed {
        Ok(())
    } else {
        Err(ImageCacheError::InvalidFilename(filename.to_string()))
    }
}

/// A validated `(size, filename)` pair
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageKey {
    size: ImageSize,
    filename: String,
}

impl ImageKey {
    pub fn parse(size: &str, filename: &str) -> Result<Self> {
        let size = size.parse()?;
        validate_filename(filename)?;
        Ok(Self {
            size,
            filename: filename.to_string(),
        })
    }

    /// `{root}/{size}/{filename}`
    pub fn path_under(&self, root: &Path) -> PathBuf {
        root.join(self.size.as_str()).join(&self.filename)
    }

    /// `{base}/{size}/{filename}`
    pub fn upstream_url(&self, base: &str) -> String {
        format!(
            "{}/{}/{}",
            base.trim_end_matches('/'),
            self.size,
            self.filename
        )
    }
}

/// MIME type guessed from the filename extension
pub fn content_type_for(filename: &str) -> &'static str {
    let ext = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "avif" => "image/avif",
        _ => "application/octet-stream",
    }
}

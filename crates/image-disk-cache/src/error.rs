//! Error types for the image cache

use std::fmt;

#[derive(Debug)]
pub enum ImageCacheError {
    /// Size is not one of the allowed [`crate::ImageSize`] values
    InvalidSize(String),
    /// Filename failed the allow-list check
    InvalidFilename(String),
    /// Upstream answered with a non-2xx status
    UpstreamStatus(u16),
    /// Upstream answered 2xx with no bytes
    EmptyBody,
    Http(Box<reqwest::Error>),
    Io(Box<std::io::Error>),
}

impl ImageCacheError {
    /// Bad request parameters, as opposed to upstream or disk failures
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidSize(_) | Self::InvalidFilename(_))
    }
}

impl fmt::Display for ImageCacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidSize(size) => write!(f, "Invalid image size: {}", size),
            Self::InvalidFilename(name) => write!(f, "Invalid image filename: {}", name),
            Self::UpstreamStatus(code) => write!(f, "Image upstream returned status {}", code),
            Self::EmptyBody => write!(f, "Image upstream returned an empty body"),
            Self::Http(err) => write!(f, "Image upstream error: {}", err),
            Self::Io(err) => write!(f, "IO error: {}", err),
        }
    }
}

impl std::error::Error for ImageCacheError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Http(err) => Some(err.as_ref()),
            Self::Io(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ImageCacheError {
    fn from(err: reqwest::Error) -> Self {
        Self::Http(Box::new(err))
    }
}

impl From<std::io::Error> for ImageCacheError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(Box::new(err))
    }
}

pub type Result<T> = std::result::Result<T, ImageCacheError>;

//! Error types for the TTL cache

use std::fmt;

/// Failures while mirroring cache contents to disk
#[derive(Debug)]
pub enum CacheError {
    Io(Box<std::io::Error>),
    Serialize(serde_json::Error),
}

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheError::Io(err) => write!(f, "Cache IO error: {}", err),
            CacheError::Serialize(err) => write!(f, "Cache serialization error: {}", err),
        }
    }
}

impl std::error::Error for CacheError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CacheError::Io(err) => Some(err.as_ref()),
            CacheError::Serialize(err) => Some(err),
        }
    }
}

impl From<std::io::Error> for CacheError {
    fn from(err: std::io::Error) -> Self {
        CacheError::Io(Box::new(err))
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        CacheError::Serialize(err)
    }
}

pub type Result<T> = std::result::Result<T, CacheError>;

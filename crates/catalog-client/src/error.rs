//! Error types for upstream catalog calls

use std::fmt;
use std::time::Duration;

/// Why a single upstream call produced no data
#[derive(Debug)]
pub enum UpstreamError {
    /// The source's endpoint could not be turned into a request URL
    InvalidUrl(String),
    /// No complete response within the call's deadline
    Timeout(Duration),
    /// Upstream answered with a non-2xx status
    Status(u16),
    /// Connection, TLS or body transfer failure
    Transport(Box<reqwest::Error>),
    /// The body was not the expected JSON shape
    Decode(String),
}

impl UpstreamError {
    /// Short human-readable reason, suitable for logs
    pub fn reason(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for UpstreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidUrl(msg) => write!(f, "Invalid upstream URL: {}", msg),
            Self::Timeout(d) => write!(f, "Upstream timed out after {}ms", d.as_millis()),
            Self::Status(code) => write!(f, "Upstream returned status {}", code),
            Self::Transport(e) => write!(f, "Upstream transport error: {}", e),
            Self::Decode(msg) => write!(f, "Upstream decode error: {}", msg),
        }
    }
}

impl std::error::Error for UpstreamError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Transport(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

impl From<url::ParseError> for UpstreamError {
    fn from(e: url::ParseError) -> Self {
        Self::InvalidUrl(e.to_string())
    }
}

impl From<serde_json::Error> for UpstreamError {
    fn from(e: serde_json::Error) -> Self {
        Self::Decode(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, UpstreamError>;

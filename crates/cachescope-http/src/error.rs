//! Error types for cachescope-http

use std::fmt;

/// Result type alias for backend construction
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while building an [`HttpBackend`](crate::HttpBackend)
#[derive(Debug)]
pub enum Error {
    /// Base URL could not be parsed or cannot carry a path
    InvalidBaseUrl(String),

    /// HTTP client could not be built
    Client(reqwest::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidBaseUrl(msg) => write!(f, "invalid base URL: {}", msg),
            Error::Client(e) => write!(f, "failed to build HTTP client: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Client(e) => Some(e),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Client(err)
    }
}

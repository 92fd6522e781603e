//! Error handling for the flash sale client

use std::fmt;
use thiserror::Error;

/// Unified error type for the flash sale client
#[derive(Error, Debug)]
pub enum Error {
    /// Transport failure, or a body that could not be decoded
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization or deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parsing errors
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    /// Durable storage errors
    #[error("Storage error: {0}")]
    Io(#[from] std::io::Error),

    /// Login rejected by the backend
    #[error("{0}")]
    Auth(String),

    /// Listing fetch rejected by the backend
    #[error("{0}")]
    Fetch(String),

    /// Any other non-2xx backend response
    #[error("{0}")]
    Api(String),

    /// General errors
    #[error("{0}")]
    General(String),
}

impl Error {
    /// Create a new authentication error
    pub fn auth<T: fmt::Display>(msg: T) -> Self {
        Error::Auth(msg.to_string())
    }

    /// Create a new listing fetch error
    pub fn fetch<T: fmt::Display>(msg: T) -> Self {
        Error::Fetch(msg.to_string())
    }

    /// Create a new backend rejection error
    pub fn api<T: fmt::Display>(msg: T) -> Self {
        Error::Api(msg.to_string())
    }

    /// Create a new general error
    pub fn general<T: fmt::Display>(msg: T) -> Self {
        Error::General(msg.to_string())
    }

    /// Whether no response was obtained at all. An undecodable body is not.
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Http(e) if !e.is_decode())
    }
}

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, Error>;

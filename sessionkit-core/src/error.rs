//! Error types for session operations.

use sessionkit_securecookie::CookieError;
use thiserror::Error;

/// Result type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;

/// Session-specific errors.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Redis-specific error
    #[cfg(feature = "redis")]
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// MongoDB-specific error
    #[cfg(feature = "mongodb")]
    #[error("MongoDB error: {0}")]
    Mongo(#[from] mongodb::error::Error),

    /// Cookie or payload codec error
    #[error("Codec error: {0}")]
    Codec(#[from] CookieError),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Session not found
    #[error("Session not found: {0}")]
    NotFound(String),

    /// Invalid session ID
    #[error("Invalid session ID: {0}")]
    InvalidSessionId(String),

    /// Encoded session exceeds the store's maximum length
    #[error("Session payload too large: {length} bytes (max {max})")]
    PayloadTooLarge { length: usize, max: usize },

    /// A reserved session value holds the wrong type
    #[error("Invalid session value: {0}")]
    InvalidValue(String),
}

impl From<serde_json::Error> for SessionError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

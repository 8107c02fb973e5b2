//! Common error types for MİDA components.

use thiserror::Error;

/// Common errors across MİDA components
#[derive(Debug, Error)]
pub enum MidaError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Session store write error
    #[error("Store error: {0}")]
    Store(String),

    /// Session store read/query error (message is shown verbatim to the user)
    #[error("Query error: {0}")]
    Query(String),

    /// CAPTCHA generation/rendering error
    #[error("CAPTCHA error: {0}")]
    Captcha(String),

    /// Invalid input/request
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Unknown flow, challenge, or collection
    #[error("Not found: {0}")]
    NotFound(String),

    /// Operation not allowed in the current state
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl MidaError {
    /// Returns the HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Config(_) => 500,
            Self::Store(_) => 503,
            Self::Query(_) => 503,
            Self::Captcha(_) => 500,
            Self::InvalidInput(_) => 400,
            Self::NotFound(_) => 404,
            Self::Conflict(_) => 409,
            Self::Internal(_) => 500,
        }
    }

    /// Returns true if the caller may retry the same operation
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Store(_) | Self::Query(_))
    }
}

//! Authority client error types.
//!
//! These cover configuration and client construction only. Expected remote
//! rejections are [`crate::AuthorityOutcome`] values, not errors.

use thiserror::Error;

/// Result type for authority client construction and configuration.
pub type AuthorityResult<T> = Result<T, AuthorityError>;

/// Errors raised while configuring or building the authority client.
#[derive(Debug, Error)]
pub enum AuthorityError {
    /// Configuration is missing or invalid.
    #[error("invalid authority configuration: {0}")]
    Config(String),

    /// The underlying HTTP client could not be built.
    #[error("HTTP client build failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Configuration file could not be read.
    #[error("configuration read failed: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file could not be parsed.
    #[error("configuration parse failed: {0}")]
    Parse(#[from] serde_json::Error),
}

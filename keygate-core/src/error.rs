//! Error types for the license lifecycle.

use keygate_authority::RejectionKind;
use thiserror::Error;

/// Result type for license operations.
pub type LicenseResult<T> = Result<T, LicenseError>;

/// Errors returned by the lifecycle engine and record store.
#[derive(Debug, Error)]
pub enum LicenseError {
    /// Input rejected before any remote call (blank key, token mismatch).
    /// Never retried automatically.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The authority answered and said no. The record has already been
    /// transitioned accordingly; the message is safe to display.
    #[error("license rejected ({kind}): {message}")]
    Rejected {
        kind: RejectionKind,
        message: String,
    },

    /// The authority could not be reached. The record keeps its prior state;
    /// the caller may retry.
    #[error("license authority unreachable: {0}")]
    Unreachable(String),

    /// Record persistence failed.
    #[error("storage error: {0}")]
    Storage(String),

    /// Record (de)serialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl LicenseError {
    /// Returns true when the operation may be retried as-is.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unreachable(_))
    }
}

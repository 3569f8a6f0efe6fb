//! Remote license authority client for Keygate.
//!
//! The upstream license service (an LMFWC-style key manager) exposes
//! activate/validate/deactivate endpoints. This crate normalizes every call
//! into a closed [`AuthorityOutcome`]:
//!
//! - **Success** carries the remaining activation count, the activation token
//!   (when one is reported), and the license expiry.
//! - **Rejected** is an authoritative answer (invalid key, revoked, expired,
//!   token mismatch, exhausted) that callers apply as a state transition.
//! - **Unreachable** covers transport failures, timeouts, and anything the
//!   client cannot classify; callers preserve their prior state.
//!
//! Expected rejections are values, never errors. Only configuration and
//! client-construction problems surface as [`AuthorityError`].

mod config;
mod error;
mod http;
mod mask;
mod outcome;

pub use config::AuthorityConfig;
pub use error::{AuthorityError, AuthorityResult};
pub use http::HttpAuthorityClient;
pub use mask::mask_token;
pub use outcome::{AuthorityOutcome, RejectionKind};

use async_trait::async_trait;

/// Abstraction over the remote license authority.
///
/// All three operations are infallible at the type level: connectivity
/// problems come back as [`AuthorityOutcome::Unreachable`] so that callers
/// must handle them explicitly instead of bubbling a transport error.
#[async_trait]
pub trait AuthorityClient: Send + Sync {
    /// Activates (or re-activates, when `token` is given) the license key.
    async fn activate(&self, license_key: &str, token: Option<&str>) -> AuthorityOutcome;

    /// Validates the license key against the authority.
    async fn validate(&self, license_key: &str) -> AuthorityOutcome;

    /// Releases the activation slot identified by `token`.
    async fn deactivate(&self, license_key: &str, token: &str) -> AuthorityOutcome;
}

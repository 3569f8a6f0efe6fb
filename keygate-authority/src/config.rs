//! Authority client configuration.
//!
//! Loaded from a JSON file when one is given, otherwise from environment
//! variables. HTTPS is required unless the insecure flag is set explicitly.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{AuthorityError, AuthorityResult};

/// Environment variable carrying the authority base URL.
pub const ENV_BASE_URL: &str = "KEYGATE_AUTHORITY_URL";
/// Environment variable carrying the API consumer key.
pub const ENV_CONSUMER_KEY: &str = "KEYGATE_CONSUMER_KEY";
/// Environment variable carrying the API consumer secret.
pub const ENV_CONSUMER_SECRET: &str = "KEYGATE_CONSUMER_SECRET";
/// Environment variable enabling plain-HTTP authority URLs (`1` to allow).
pub const ENV_ALLOW_INSECURE_HTTP: &str = "KEYGATE_ALLOW_INSECURE_HTTP";

/// Connection settings for the remote license authority.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthorityConfig {
    /// Base URL of the license service, without a trailing slash.
    pub base_url: String,
    /// HTTP Basic auth user.
    pub consumer_key: String,
    /// HTTP Basic auth password.
    pub consumer_secret: String,
    /// Permit `http://` base URLs. Off by default.
    pub allow_insecure_http: bool,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// Retries after the initial attempt, on transport errors only.
    pub retry_count: u32,
    /// Base backoff in seconds; doubles per retry.
    pub retry_backoff_secs: u64,
}

impl Default for AuthorityConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            consumer_key: String::new(),
            consumer_secret: String::new(),
            allow_insecure_http: false,
            timeout_secs: 30,
            retry_count: 3,
            retry_backoff_secs: 2,
        }
    }
}

impl AuthorityConfig {
    /// Loads configuration from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if the
    /// resulting configuration is invalid.
    pub fn from_file(path: &Path) -> AuthorityResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        let mut config: Self = serde_json::from_str(&raw)?;
        config.base_url = config.base_url.trim_end_matches('/').to_string();
        config.validate()?;
        info!(base_url = %config.base_url, "authority config loaded from {}", path.display());
        Ok(config)
    }

    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required variables are missing or the resulting
    /// configuration is invalid.
    pub fn from_env() -> AuthorityResult<Self> {
        let var = |name: &str| std::env::var(name).unwrap_or_default();
        let config = Self {
            base_url: var(ENV_BASE_URL).trim_end_matches('/').to_string(),
            consumer_key: var(ENV_CONSUMER_KEY),
            consumer_secret: var(ENV_CONSUMER_SECRET),
            allow_insecure_http: var(ENV_ALLOW_INSECURE_HTTP) == "1",
            ..Self::default()
        };
        config.validate()?;
        info!(base_url = %config.base_url, "authority config loaded from environment");
        Ok(config)
    }

    /// Loads from the given file when present, falling back to environment
    /// variables otherwise.
    pub fn load(path: Option<&Path>) -> AuthorityResult<Self> {
        match path {
            Some(p) if p.exists() => Self::from_file(p),
            _ => Self::from_env(),
        }
    }

    /// Checks that required fields are set and the URL scheme is acceptable.
    ///
    /// # Errors
    ///
    /// Returns [`AuthorityError::Config`] describing the first problem found.
    pub fn validate(&self) -> AuthorityResult<()> {
        if self.base_url.is_empty() || self.consumer_key.is_empty() || self.consumer_secret.is_empty() {
            return Err(AuthorityError::Config(
                "base_url, consumer_key and consumer_secret are required".to_string(),
            ));
        }
        if self.base_url.starts_with("http://") && !self.allow_insecure_http {
            return Err(AuthorityError::Config(
                "plain-HTTP authority URL requires allow_insecure_http".to_string(),
            ));
        }
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(AuthorityError::Config(format!(
                "base_url must be an http(s) URL, got {:?}",
                self.base_url
            )));
        }
        Ok(())
    }
}

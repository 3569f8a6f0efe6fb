//! Reqwest-backed authority client.
//!
//! Calls the service's GET endpoints with HTTP Basic auth, no-cache headers,
//! and a millisecond cache-busting query parameter. Transport errors are
//! retried with exponential backoff; an exhausted retry budget surfaces as
//! [`AuthorityOutcome::Unreachable`].

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CACHE_CONTROL, PRAGMA};
use tracing::{debug, info, warn};

use crate::config::AuthorityConfig;
use crate::error::AuthorityResult;
use crate::mask::mask_token;
use crate::outcome::AuthorityOutcome;
use crate::AuthorityClient;

const USER_AGENT: &str = concat!("keygate/", env!("CARGO_PKG_VERSION"));

/// HTTP client for the remote license authority.
pub struct HttpAuthorityClient {
    http: reqwest::Client,
    config: AuthorityConfig,
}

impl HttpAuthorityClient {
    /// Builds a client from a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the underlying
    /// HTTP client cannot be constructed.
    pub fn new(config: AuthorityConfig) -> AuthorityResult<Self> {
        config.validate()?;

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));

        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        info!(
            base_url = %config.base_url,
            timeout_secs = config.timeout_secs,
            retry_count = config.retry_count,
            "authority client ready"
        );
        Ok(Self { http, config })
    }

    /// Returns the configured base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    fn endpoint(&self, license_key: &str, operation: &str) -> String {
        format!(
            "{}/api/v1/licenses/{}/{operation}",
            self.config.base_url,
            urlencoding::encode(license_key)
        )
    }

    async fn get(&self, url: &str, token: Option<&str>) -> AuthorityOutcome {
        let mut last_error = String::new();

        for attempt in 0..=self.config.retry_count {
            // Cache buster mirrors the no-cache headers; some proxies ignore one or the other.
            let mut params: Vec<(&str, String)> =
                vec![("_", Utc::now().timestamp_millis().to_string())];
            if let Some(t) = token {
                params.push(("token", t.trim().to_string()));
            }

            debug!(url, attempt, token = %mask_token(token), "GET authority");
            let result = self
                .http
                .get(url)
                .query(&params)
                .basic_auth(&self.config.consumer_key, Some(&self.config.consumer_secret))
                .send()
                .await;

            match result {
                Ok(response) => {
                    let status = response.status().as_u16();
                    let body = response.text().await.unwrap_or_default();
                    debug!(url, status, "authority responded");
                    return AuthorityOutcome::from_wire(status, &body, Utc::now());
                }
                Err(e) => {
                    last_error = e.to_string();
                    warn!(
                        url,
                        attempt,
                        retries = self.config.retry_count,
                        "authority transport error: {last_error}"
                    );
                    if attempt < self.config.retry_count {
                        let backoff = backoff_secs(self.config.retry_backoff_secs, attempt);
                        tokio::time::sleep(Duration::from_secs(backoff)).await;
                    }
                }
            }
        }

        AuthorityOutcome::Unreachable {
            message: format!("unreachable after retries: {last_error}"),
        }
    }
}

/// Backoff for the given retry attempt: base doubled per attempt, with the
/// exponent clamped so a large configured retry budget cannot overflow.
fn backoff_secs(base: u64, attempt: u32) -> u64 {
    base.saturating_mul(2u64.saturating_pow(attempt.min(16)))
}

#[async_trait]
impl AuthorityClient for HttpAuthorityClient {
    async fn activate(&self, license_key: &str, token: Option<&str>) -> AuthorityOutcome {
        self.get(&self.endpoint(license_key, "activate"), token).await
    }

    async fn validate(&self, license_key: &str) -> AuthorityOutcome {
        self.get(&self.endpoint(license_key, "validate"), None).await
    }

    async fn deactivate(&self, license_key: &str, token: &str) -> AuthorityOutcome {
        self.get(&self.endpoint(license_key, "deactivate"), Some(token))
            .await
    }
}

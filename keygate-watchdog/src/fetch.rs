//! HTTP snapshot source polling the health endpoint.

use std::time::Duration;

use async_trait::async_trait;
use keygate_core::HealthSnapshot;
use tracing::warn;

use crate::watchdog::SnapshotSource;

/// Fetches health snapshots from a Keygate server.
pub struct HttpSnapshotSource {
    http: reqwest::Client,
    url: String,
}

impl HttpSnapshotSource {
    /// Creates a source polling `{base_url}/api/v1/health`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(base_url: &str) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            http,
            url: format!("{}/api/v1/health", base_url.trim_end_matches('/')),
        })
    }
}

#[async_trait]
impl SnapshotSource for HttpSnapshotSource {
    async fn latest(&self) -> Option<HealthSnapshot> {
        let response = match self.http.get(&self.url).send().await {
            Ok(r) => r,
            Err(e) => {
                warn!("health fetch failed: {e}");
                return None;
            }
        };
        // A malformed payload is ignored, never a crash or a forced logout.
        match response.json::<HealthSnapshot>().await {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                warn!("health payload undecodable: {e}");
                None
            }
        }
    }
}

//! Server configuration file.

use std::path::{Path, PathBuf};

use anyhow::{ensure, Context, Result};
use keygate_authority::AuthorityConfig;
use serde::{Deserialize, Serialize};

/// JSON configuration for the Keygate server.
///
/// The `authority` section mirrors [`AuthorityConfig`]; the remaining keys
/// override installation policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Remote authority connection settings.
    pub authority: AuthorityConfig,
    /// Grace window override in hours; the engine default applies when
    /// unset.
    pub grace_hours: Option<i64>,
    /// Interval between periodic auto-validations, in hours.
    pub revalidate_hours: u64,
    /// Directory for the license record file.
    pub data_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            authority: AuthorityConfig::default(),
            grace_hours: None,
            revalidate_hours: 6,
            data_dir: None,
        }
    }
}

impl ServerConfig {
    /// Loads the configuration from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if
    /// `grace_hours` is set to a non-positive value.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        let mut config: Self =
            serde_json::from_str(&raw).with_context(|| format!("parse config {}", path.display()))?;
        config.authority.base_url = config.authority.base_url.trim_end_matches('/').to_string();
        if let Some(hours) = config.grace_hours {
            // A non-positive window would start sessions already past grace.
            ensure!(hours > 0, "grace_hours must be positive, got {hours}");
        }
        Ok(config)
    }
}

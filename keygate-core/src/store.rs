//! Persistent record store.
//!
//! The record is a single JSON document written via a temp file and an
//! atomic rename, so a crash mid-write never leaves a torn record behind.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{LicenseError, LicenseResult};
use crate::record::LicenseRecord;

const RECORD_FILE: &str = "license.json";

/// Stores the license record as a JSON file.
#[derive(Debug, Clone)]
pub struct RecordStore {
    path: PathBuf,
}

impl RecordStore {
    /// Creates a store persisting to the given file path.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Creates a store under `data_dir`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the directory cannot be created.
    pub fn open(data_dir: &Path) -> LicenseResult<Self> {
        fs::create_dir_all(data_dir)
            .map_err(|e| LicenseError::Storage(format!("create {}: {e}", data_dir.display())))?;
        Ok(Self::new(data_dir.join(RECORD_FILE)))
    }

    /// Returns the default data directory for the record file.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("keygate")
    }

    /// Returns the record file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the record, or an unconfigured one when the file is missing.
    ///
    /// Malformed timestamps inside the file load leniently as absent; a
    /// wholly corrupt file is a hard error so the operator notices.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the file exists but cannot be read or
    /// parsed.
    pub fn load(&self) -> LicenseResult<LicenseRecord> {
        if !self.path.exists() {
            info!(path = %self.path.display(), "no record file; starting unconfigured");
            return Ok(LicenseRecord::default());
        }
        let raw = fs::read_to_string(&self.path)
            .map_err(|e| LicenseError::Storage(format!("read {}: {e}", self.path.display())))?;
        let record = serde_json::from_str(&raw)?;
        debug!(path = %self.path.display(), "record loaded");
        Ok(record)
    }

    /// Writes the record atomically (temp file + rename).
    ///
    /// # Errors
    ///
    /// Returns a storage error if the write or rename fails.
    pub fn save(&self, record: &LicenseRecord) -> LicenseResult<()> {
        let json = serde_json::to_string_pretty(record)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)
            .map_err(|e| LicenseError::Storage(format!("write {}: {e}", tmp.display())))?;
        fs::rename(&tmp, &self.path)
            .map_err(|e| LicenseError::Storage(format!("rename {}: {e}", self.path.display())))?;
        debug!(path = %self.path.display(), "record saved");
        Ok(())
    }
}

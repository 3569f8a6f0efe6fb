//! The persisted license record and its health projection.
//!
//! The record is a singleton per installation. Fields are module-private:
//! the lifecycle engine (same crate) is the sole writer, everything else
//! observes through accessors or [`HealthSnapshot`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::warn;

/// Current status of the installation's license.
///
/// `GraceSoft` and `LockHard` remain representable so records persisted by
/// older deployments still load, but no transition produces them; health
/// fails closed on both. The hard lock after a lapsed grace window is
/// behavioral (health turns false and the watchdog enforces), not stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LicenseStatus {
    /// No license key has ever been stored.
    Unconfigured,
    /// Freshly activated, not yet revalidated.
    Active,
    /// Most recent validate succeeded.
    Validated,
    /// Activation slot released; a fresh activate re-enters the lifecycle.
    Deactivated,
    /// The authority reported the license as expired.
    Expired,
    /// The authority no longer honors the key. No grace applies.
    Revoked,
    /// Legacy soft-lock status from older deployments.
    GraceSoft,
    /// Legacy hard-lock status from older deployments.
    LockHard,
}

impl std::fmt::Display for LicenseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Unconfigured => "UNCONFIGURED",
            Self::Active => "ACTIVE",
            Self::Validated => "VALIDATED",
            Self::Deactivated => "DEACTIVATED",
            Self::Expired => "EXPIRED",
            Self::Revoked => "REVOKED",
            Self::GraceSoft => "GRACE_SOFT",
            Self::LockHard => "LOCK_HARD",
        };
        f.write_str(s)
    }
}

/// The authoritative license state for one installation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LicenseRecord {
    pub(crate) status: LicenseStatus,
    pub(crate) license_key: String,
    pub(crate) activation_token: Option<String>,
    pub(crate) remaining_activations: Option<u32>,
    #[serde(deserialize_with = "lenient_datetime")]
    pub(crate) grace_until: Option<DateTime<Utc>>,
    pub(crate) reason: String,
    #[serde(deserialize_with = "lenient_datetime")]
    pub(crate) last_validated: Option<DateTime<Utc>>,
    #[serde(deserialize_with = "lenient_datetime")]
    pub(crate) expires_at: Option<DateTime<Utc>>,
}

impl Default for LicenseRecord {
    fn default() -> Self {
        Self {
            status: LicenseStatus::Unconfigured,
            license_key: String::new(),
            activation_token: None,
            remaining_activations: None,
            grace_until: None,
            reason: "License key not configured".to_string(),
            last_validated: None,
            expires_at: None,
        }
    }
}

impl LicenseRecord {
    /// Returns the current status.
    #[must_use]
    pub fn status(&self) -> LicenseStatus {
        self.status
    }

    /// Returns the stored license key, empty while unconfigured.
    #[must_use]
    pub fn license_key(&self) -> &str {
        &self.license_key
    }

    /// Returns the activation token while an activation is live.
    #[must_use]
    pub fn activation_token(&self) -> Option<&str> {
        self.activation_token.as_deref()
    }

    /// Returns the remaining activation count, when known.
    #[must_use]
    pub fn remaining_activations(&self) -> Option<u32> {
        self.remaining_activations
    }

    /// Returns the grace deadline, when one is running.
    #[must_use]
    pub fn grace_until(&self) -> Option<DateTime<Utc>> {
        self.grace_until
    }

    /// Returns the human-readable explanation of the current status.
    #[must_use]
    pub fn reason(&self) -> &str {
        &self.reason
    }

    /// Returns the timestamp of the most recent successful validate/activate.
    #[must_use]
    pub fn last_validated(&self) -> Option<DateTime<Utc>> {
        self.last_validated
    }

    /// Returns the license expiry reported by the authority.
    #[must_use]
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    /// Returns true once a license key has been stored.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        !self.license_key.is_empty()
    }

    /// The health predicate: usable while `ACTIVE`/`VALIDATED`, or while
    /// `EXPIRED` with a grace deadline still in the future. Pure; never
    /// mutates the record.
    #[must_use]
    pub fn is_ok_at(&self, now: DateTime<Utc>) -> bool {
        match self.status {
            LicenseStatus::Active | LicenseStatus::Validated => true,
            LicenseStatus::Expired => self.grace_until.is_some_and(|g| g > now),
            _ => false,
        }
    }

    /// Projects the record into the external health payload.
    #[must_use]
    pub fn snapshot_at(&self, now: DateTime<Utc>) -> HealthSnapshot {
        HealthSnapshot {
            status: self.status,
            grace_until: self.grace_until,
            reason: Some(self.reason.clone()),
            last_validated: self.last_validated,
            ok: self.is_ok_at(now),
        }
    }
}

/// Read-only projection of the license record.
///
/// This is the exact shape of the health read and the boot snapshot. It
/// reveals no secrets and is safe for unauthenticated callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthSnapshot {
    pub status: LicenseStatus,
    #[serde(default, deserialize_with = "lenient_datetime")]
    pub grace_until: Option<DateTime<Utc>>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default, deserialize_with = "lenient_datetime")]
    pub last_validated: Option<DateTime<Utc>>,
    pub ok: bool,
}

/// Deserializes an optional RFC 3339 timestamp, degrading malformed values
/// to `None` (grace absent, fail closed) instead of failing the whole load.
fn lenient_datetime<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.and_then(|s| match DateTime::parse_from_rfc3339(&s) {
        Ok(t) => Some(t.with_timezone(&Utc)),
        Err(e) => {
            warn!(value = %s, "discarding malformed stored timestamp: {e}");
            None
        }
    }))
}

//! The license lifecycle engine.
//!
//! Sole writer of the [`LicenseRecord`]. Mutating operations serialize on a
//! write gate held across the remote call; the record itself sits behind an
//! `RwLock` that is only write-locked to commit a fully computed successor,
//! so readers always see a consistent snapshot and a failed or timed-out
//! call leaves the record untouched.
//!
//! Policy notes:
//! - A successful validate always lands on `VALIDATED`, including from
//!   `ACTIVE`. `ACTIVE` marks "freshly activated, not yet revalidated".
//! - Grace windows anchor to the first detected expiry and never extend on
//!   repeated failures.
//! - Connectivity failures mutate nothing but `reason`; only authoritative
//!   rejections change status.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use keygate_authority::{mask_token, AuthorityClient, AuthorityOutcome, RejectionKind};
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

use crate::clock::Clock;
use crate::error::{LicenseError, LicenseResult};
use crate::record::{HealthSnapshot, LicenseRecord, LicenseStatus};
use crate::store::RecordStore;

/// Default grace window after a detected expiry (72 hours).
pub const GRACE_PERIOD_SECS: i64 = 72 * 60 * 60;

/// Engine policy knobs.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Length of the grace window anchored at the first detected expiry.
    pub grace_period: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            grace_period: Duration::seconds(GRACE_PERIOD_SECS),
        }
    }
}

/// Outcome of a mutating operation, shaped for the operator surface.
#[derive(Debug, Clone)]
pub struct OpReport {
    /// Status after the operation.
    pub status: LicenseStatus,
    /// Remaining activation count, when known.
    pub remaining_activations: Option<u32>,
    /// Human-readable, display-safe summary.
    pub message: String,
}

/// Single-writer owner of the license record.
pub struct LicenseEngine {
    authority: Arc<dyn AuthorityClient>,
    clock: Arc<dyn Clock>,
    store: RecordStore,
    record: RwLock<LicenseRecord>,
    write_gate: Mutex<()>,
    grace_period: Duration,
}

impl LicenseEngine {
    /// Creates an engine, loading the persisted record (or an unconfigured
    /// one when none exists).
    ///
    /// # Errors
    ///
    /// Returns a storage error if the record file exists but cannot be read.
    pub fn new(
        authority: Arc<dyn AuthorityClient>,
        store: RecordStore,
        clock: Arc<dyn Clock>,
        config: EngineConfig,
    ) -> LicenseResult<Self> {
        let record = store.load()?;
        info!(status = %record.status(), "license record loaded");
        Ok(Self {
            authority,
            clock,
            store,
            record: RwLock::new(record),
            write_gate: Mutex::new(()),
            grace_period: config.grace_period,
        })
    }

    /// Activates the license key against the authority.
    ///
    /// A stored activation token is passed along so re-activation reclaims
    /// the same slot instead of consuming a new one.
    ///
    /// # Errors
    ///
    /// `Validation` for a blank key (no remote call), `Rejected` when the
    /// authority says no (the transition has already been applied),
    /// `Unreachable` when it cannot be reached (record unchanged except
    /// `reason`).
    pub async fn activate(&self, license_key: &str) -> LicenseResult<OpReport> {
        let key = license_key.trim();
        if key.is_empty() {
            return Err(LicenseError::Validation(
                "license key is required".to_string(),
            ));
        }

        let _gate = self.write_gate.lock().await;
        let mut next = self.record.read().await.clone();
        let stored_token = next.activation_token.clone();
        info!(token = %mask_token(stored_token.as_deref()), "activate requested");

        match self.authority.activate(key, stored_token.as_deref()).await {
            AuthorityOutcome::Success {
                remaining_activations,
                token,
                expires_at,
            } => {
                let now = self.clock.now();
                next.status = LicenseStatus::Active;
                next.license_key = key.to_string();
                if token.is_some() {
                    next.activation_token = token;
                }
                if remaining_activations.is_some() {
                    next.remaining_activations = remaining_activations;
                }
                if expires_at.is_some() {
                    next.expires_at = expires_at;
                }
                next.grace_until = None;
                next.reason = "License activated".to_string();
                bump_last_validated(&mut next, now);

                let report = report(&next, "License activated");
                self.commit(next).await?;
                Ok(report)
            }
            AuthorityOutcome::Rejected { kind, message } => {
                let now = self.clock.now();
                match kind {
                    // The bad key is not persisted; the record stays
                    // unconfigured until a key is accepted.
                    RejectionKind::InvalidKey | RejectionKind::Revoked
                        if !next.is_configured() =>
                    {
                        next.reason = message.clone();
                    }
                    RejectionKind::InvalidKey | RejectionKind::Revoked => {
                        next.status = LicenseStatus::Revoked;
                        next.grace_until = None;
                        next.reason = message.clone();
                    }
                    RejectionKind::Expired => {
                        next.license_key = key.to_string();
                        self.mark_expired(&mut next, &message, now);
                    }
                    RejectionKind::Exhausted | RejectionKind::TokenMismatch => {
                        next.reason = message.clone();
                    }
                }
                warn!(%kind, "activate rejected: {message}");
                self.commit(next).await?;
                Err(LicenseError::Rejected { kind, message })
            }
            AuthorityOutcome::Unreachable { message } => self.note_outage(next, message).await,
        }
    }

    /// Validates the license against the authority.
    ///
    /// The key resolves to the explicit argument or the stored key. A token
    /// reported in the response replaces the stored one (token rotation).
    ///
    /// # Errors
    ///
    /// Same taxonomy as [`Self::activate`]. A connectivity failure while the
    /// record is usable fails open: status and grace deadline are untouched.
    pub async fn validate(&self, license_key: Option<&str>) -> LicenseResult<OpReport> {
        let _gate = self.write_gate.lock().await;
        let mut next = self.record.read().await.clone();

        let key = license_key
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .unwrap_or_else(|| next.license_key())
            .to_string();
        if key.is_empty() {
            return Err(LicenseError::Validation(
                "license key is required".to_string(),
            ));
        }
        info!("validate requested");

        match self.authority.validate(&key).await {
            AuthorityOutcome::Success {
                remaining_activations,
                token,
                expires_at,
            } => {
                let now = self.clock.now();
                next.status = LicenseStatus::Validated;
                next.license_key = key;
                if let Some(fresh) = token {
                    if next.activation_token.as_deref() != Some(fresh.as_str()) {
                        info!(token = %mask_token(Some(&fresh)), "activation token rotated from validate");
                        next.activation_token = Some(fresh);
                    }
                }
                if remaining_activations.is_some() {
                    next.remaining_activations = remaining_activations;
                }
                if expires_at.is_some() {
                    next.expires_at = expires_at;
                }
                next.grace_until = None;
                next.reason = "License validated".to_string();
                bump_last_validated(&mut next, now);

                let report = report(&next, "License validated");
                self.commit(next).await?;
                Ok(report)
            }
            AuthorityOutcome::Rejected { kind, message } => {
                let now = self.clock.now();
                // A never-configured record has nothing to lock: the bad key
                // is not persisted and the status stays UNCONFIGURED.
                if !next.is_configured() {
                    next.reason = message.clone();
                } else {
                    match kind {
                        RejectionKind::Expired => self.mark_expired(&mut next, &message, now),
                        RejectionKind::Revoked | RejectionKind::InvalidKey => {
                            next.status = LicenseStatus::Revoked;
                            next.grace_until = None;
                            next.reason = message.clone();
                        }
                        RejectionKind::Exhausted | RejectionKind::TokenMismatch => {
                            next.reason = message.clone();
                        }
                    }
                }
                warn!(%kind, "validate rejected: {message}");
                self.commit(next).await?;
                Err(LicenseError::Rejected { kind, message })
            }
            AuthorityOutcome::Unreachable { message } => self.note_outage(next, message).await,
        }
    }

    /// Releases this installation's activation slot.
    ///
    /// The provided token must match the stored one; a mismatch fails
    /// validation before any remote call. With no stored token the call is
    /// an idempotent no-op success.
    ///
    /// # Errors
    ///
    /// Same taxonomy as [`Self::activate`].
    pub async fn deactivate(&self, license_key: &str, token: &str) -> LicenseResult<OpReport> {
        let key = license_key.trim();
        if key.is_empty() {
            return Err(LicenseError::Validation(
                "license key is required".to_string(),
            ));
        }

        let _gate = self.write_gate.lock().await;
        let mut next = self.record.read().await.clone();

        let Some(stored) = next.activation_token.clone() else {
            info!("deactivate requested with no stored token; already deactivated");
            return Ok(report(&next, "Already deactivated"));
        };
        if token.trim() != stored {
            return Err(LicenseError::Validation(
                "activation token does not match this installation".to_string(),
            ));
        }
        info!(token = %mask_token(Some(&stored)), "deactivate requested");

        match self.authority.deactivate(key, &stored).await {
            AuthorityOutcome::Success {
                remaining_activations,
                ..
            } => {
                next.status = LicenseStatus::Deactivated;
                next.activation_token = None;
                next.grace_until = None;
                if remaining_activations.is_some() {
                    next.remaining_activations = remaining_activations;
                }
                next.reason = "License deactivated".to_string();

                let report = report(&next, "License deactivated");
                self.commit(next).await?;
                Ok(report)
            }
            AuthorityOutcome::Rejected { kind, message } => {
                // Authoritative knowledge of revocation is never discarded,
                // even when learned from a deactivate.
                if kind == RejectionKind::Revoked {
                    next.status = LicenseStatus::Revoked;
                    next.grace_until = None;
                }
                next.reason = message.clone();
                warn!(%kind, "deactivate rejected: {message}");
                self.commit(next).await?;
                Err(LicenseError::Rejected { kind, message })
            }
            AuthorityOutcome::Unreachable { message } => self.note_outage(next, message).await,
        }
    }

    /// Projects the current record into a health snapshot. Pure read;
    /// repeated calls never alter the record.
    pub async fn health(&self) -> HealthSnapshot {
        self.record.read().await.snapshot_at(self.clock.now())
    }

    /// Returns a copy of the current record.
    pub async fn record(&self) -> LicenseRecord {
        self.record.read().await.clone()
    }

    /// Transitions to `EXPIRED`, anchoring the grace window at the first
    /// detected expiry; an already-running window is never moved.
    fn mark_expired(&self, next: &mut LicenseRecord, message: &str, now: DateTime<Utc>) {
        next.status = LicenseStatus::Expired;
        if next.grace_until.is_none() {
            let deadline = now + self.grace_period;
            info!(grace_until = %deadline, "grace window anchored");
            next.grace_until = Some(deadline);
        }
        next.reason = if message.is_empty() {
            "License expired".to_string()
        } else {
            message.to_string()
        };
    }

    /// Records a connectivity failure: prior status and grace deadline stay
    /// as they are (fail open within grace), only `reason` notes the outage.
    async fn note_outage(
        &self,
        mut next: LicenseRecord,
        message: String,
    ) -> LicenseResult<OpReport> {
        warn!("authority unreachable: {message}");
        next.reason = format!("Authority unreachable: {message}");
        self.commit(next).await?;
        Err(LicenseError::Unreachable(message))
    }

    /// Persists `next` and publishes it as the current record. The write
    /// lock is held only for the assignment.
    async fn commit(&self, next: LicenseRecord) -> LicenseResult<()> {
        self.store.save(&next)?;
        *self.record.write().await = next;
        Ok(())
    }
}

fn bump_last_validated(next: &mut LicenseRecord, now: DateTime<Utc>) {
    next.last_validated = Some(next.last_validated.map_or(now, |prev| prev.max(now)));
}

fn report(record: &LicenseRecord, message: &str) -> OpReport {
    OpReport {
        status: record.status(),
        remaining_activations: record.remaining_activations(),
        message: message.to_string(),
    }
}

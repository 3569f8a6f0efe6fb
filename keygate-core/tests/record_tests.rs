mod common;

use chrono::Duration;
use common::{record_from_json, t0};
use keygate_core::{HealthSnapshot, LicenseRecord, LicenseStatus};
use pretty_assertions::assert_eq;
use serde_json::json;

// ── Health predicate ─────────────────────────────────────────────

#[test]
fn active_and_validated_are_ok_regardless_of_grace() {
    for status in ["ACTIVE", "VALIDATED"] {
        for grace in [None, Some((t0() - Duration::hours(1)).to_rfc3339())] {
            let record = record_from_json(json!({"status": status, "grace_until": grace}));
            assert!(record.is_ok_at(t0()), "{status} grace={grace:?}");
        }
    }
}

#[test]
fn expired_is_ok_only_within_grace() {
    let future = record_from_json(json!({
        "status": "EXPIRED",
        "grace_until": (t0() + Duration::hours(1)).to_rfc3339(),
    }));
    assert!(future.is_ok_at(t0()));

    let past = record_from_json(json!({
        "status": "EXPIRED",
        "grace_until": (t0() - Duration::hours(1)).to_rfc3339(),
    }));
    assert!(!past.is_ok_at(t0()));

    let absent = record_from_json(json!({"status": "EXPIRED"}));
    assert!(!absent.is_ok_at(t0()));
}

#[test]
fn grace_has_no_effect_outside_expired() {
    for status in ["REVOKED", "LOCK_HARD", "DEACTIVATED", "GRACE_SOFT", "UNCONFIGURED"] {
        let record = record_from_json(json!({
            "status": status,
            "grace_until": (t0() + Duration::hours(1)).to_rfc3339(),
        }));
        assert!(!record.is_ok_at(t0()), "{status}");
    }
}

#[test]
fn health_projection_is_idempotent() {
    let record = record_from_json(json!({
        "status": "EXPIRED",
        "grace_until": (t0() + Duration::hours(1)).to_rfc3339(),
        "reason": "License expired",
        "last_validated": t0().to_rfc3339(),
    }));
    let before = record.clone();

    let first = record.snapshot_at(t0());
    for _ in 0..10 {
        assert_eq!(record.snapshot_at(t0()), first);
    }
    assert_eq!(record, before);
    assert!(first.ok);
    assert_eq!(first.status, LicenseStatus::Expired);
    assert_eq!(first.reason.as_deref(), Some("License expired"));
}

// ── Wire form ────────────────────────────────────────────────────

#[test]
fn status_serializes_in_screaming_snake_case() {
    let pairs = [
        (LicenseStatus::Unconfigured, "\"UNCONFIGURED\""),
        (LicenseStatus::Active, "\"ACTIVE\""),
        (LicenseStatus::Validated, "\"VALIDATED\""),
        (LicenseStatus::Deactivated, "\"DEACTIVATED\""),
        (LicenseStatus::Expired, "\"EXPIRED\""),
        (LicenseStatus::Revoked, "\"REVOKED\""),
        (LicenseStatus::GraceSoft, "\"GRACE_SOFT\""),
        (LicenseStatus::LockHard, "\"LOCK_HARD\""),
    ];
    for (status, wire) in pairs {
        assert_eq!(serde_json::to_string(&status).unwrap(), wire);
        let parsed: LicenseStatus = serde_json::from_str(wire).unwrap();
        assert_eq!(parsed, status);
    }
}

#[test]
fn unknown_status_string_fails_to_deserialize() {
    // Fail closed: a status the enum does not know is rejected outright.
    assert!(serde_json::from_str::<LicenseStatus>("\"TOTALLY_FINE\"").is_err());
    let snapshot = serde_json::from_value::<HealthSnapshot>(json!({
        "status": "TOTALLY_FINE",
        "ok": true,
    }));
    assert!(snapshot.is_err());
}

#[test]
fn malformed_grace_timestamp_loads_as_absent() {
    let record = record_from_json(json!({
        "status": "EXPIRED",
        "license_key": "KEY-1",
        "grace_until": "not-a-date",
        "reason": "License expired",
    }));
    assert_eq!(record.grace_until(), None);
    assert_eq!(record.license_key(), "KEY-1");
    // Grace absent means fail closed.
    assert!(!record.is_ok_at(t0()));
}

#[test]
fn default_record_is_unconfigured() {
    let record = LicenseRecord::default();
    assert_eq!(record.status(), LicenseStatus::Unconfigured);
    assert!(!record.is_configured());
    assert_eq!(record.activation_token(), None);
    assert!(!record.is_ok_at(t0()));
    assert!(!record.reason().is_empty());
}

#[test]
fn snapshot_round_trips_through_json() {
    let record = record_from_json(json!({
        "status": "VALIDATED",
        "reason": "License validated",
        "last_validated": t0().to_rfc3339(),
    }));
    let snapshot = record.snapshot_at(t0());
    let json = serde_json::to_string(&snapshot).unwrap();
    let parsed: HealthSnapshot = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, snapshot);
}

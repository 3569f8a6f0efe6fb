mod common;

use common::{record_from_json, t0};
use keygate_core::{LicenseStatus, RecordStore};
use pretty_assertions::assert_eq;
use serde_json::json;

#[test]
fn missing_file_loads_as_unconfigured() {
    let dir = tempfile::tempdir().unwrap();
    let store = RecordStore::open(dir.path()).unwrap();
    let record = store.load().unwrap();
    assert_eq!(record.status(), LicenseStatus::Unconfigured);
}

#[test]
fn save_then_load_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let store = RecordStore::open(dir.path()).unwrap();
    let record = record_from_json(json!({
        "status": "VALIDATED",
        "license_key": "KEY-1",
        "activation_token": "feedface00000001",
        "remaining_activations": 3,
        "reason": "License validated",
        "last_validated": t0().to_rfc3339(),
    }));

    store.save(&record).unwrap();
    assert_eq!(store.load().unwrap(), record);
}

#[test]
fn save_leaves_no_temp_file_behind() {
    let dir = tempfile::tempdir().unwrap();
    let store = RecordStore::open(dir.path()).unwrap();
    store.save(&record_from_json(json!({"status": "ACTIVE"}))).unwrap();

    let names: Vec<String> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["license.json"]);
}

#[test]
fn malformed_timestamp_in_file_degrades_to_absent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("license.json");
    std::fs::write(
        &path,
        r#"{"status": "EXPIRED", "license_key": "KEY-1", "grace_until": "garbage", "reason": "x"}"#,
    )
    .unwrap();

    let record = RecordStore::new(&path).load().unwrap();
    assert_eq!(record.status(), LicenseStatus::Expired);
    assert_eq!(record.grace_until(), None);
    assert_eq!(record.license_key(), "KEY-1");
}

#[test]
fn corrupt_file_is_a_hard_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("license.json");
    std::fs::write(&path, "{not json").unwrap();
    assert!(RecordStore::new(&path).load().is_err());
}

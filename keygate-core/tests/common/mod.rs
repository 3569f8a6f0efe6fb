//! Shared test helpers for lifecycle tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use keygate_authority::{AuthorityClient, AuthorityOutcome, RejectionKind};
use keygate_core::{EngineConfig, LicenseEngine, LicenseRecord, ManualClock, RecordStore};

/// A fixed test epoch.
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 6, 1, 0, 0, 0).unwrap()
}

/// Authority stub that replays a queue of scripted outcomes and records the
/// calls it receives.
pub struct ScriptedAuthority {
    outcomes: Mutex<VecDeque<AuthorityOutcome>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedAuthority {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            outcomes: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn push(&self, outcome: AuthorityOutcome) {
        self.outcomes.lock().unwrap().push_back(outcome);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn next(&self, call: String) -> AuthorityOutcome {
        self.calls.lock().unwrap().push(call.clone());
        self.outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| panic!("no scripted outcome for {call}"))
    }
}

#[async_trait]
impl AuthorityClient for ScriptedAuthority {
    async fn activate(&self, license_key: &str, token: Option<&str>) -> AuthorityOutcome {
        self.next(format!("activate {license_key} token={token:?}"))
    }

    async fn validate(&self, license_key: &str) -> AuthorityOutcome {
        self.next(format!("validate {license_key}"))
    }

    async fn deactivate(&self, license_key: &str, token: &str) -> AuthorityOutcome {
        self.next(format!("deactivate {license_key} token={token}"))
    }
}

pub fn success(remaining: Option<u32>, token: Option<&str>) -> AuthorityOutcome {
    AuthorityOutcome::Success {
        remaining_activations: remaining,
        token: token.map(str::to_string),
        expires_at: None,
    }
}

pub fn rejected(kind: RejectionKind, message: &str) -> AuthorityOutcome {
    AuthorityOutcome::Rejected {
        kind,
        message: message.to_string(),
    }
}

pub fn unreachable(message: &str) -> AuthorityOutcome {
    AuthorityOutcome::Unreachable {
        message: message.to_string(),
    }
}

/// Engine wired to a scripted authority, a manual clock, and a temp store.
pub struct TestEngine {
    pub engine: LicenseEngine,
    pub authority: Arc<ScriptedAuthority>,
    pub clock: Arc<ManualClock>,
    // Keeps the store directory alive for the test's duration.
    pub dir: tempfile::TempDir,
}

pub fn engine_at(start: DateTime<Utc>) -> TestEngine {
    let dir = tempfile::tempdir().unwrap();
    let store = RecordStore::open(dir.path()).unwrap();
    let authority = ScriptedAuthority::new();
    let clock = Arc::new(ManualClock::new(start));
    let engine = LicenseEngine::new(
        authority.clone(),
        store,
        clock.clone(),
        EngineConfig::default(),
    )
    .unwrap();
    TestEngine {
        engine,
        authority,
        clock,
        dir,
    }
}

/// Builds a record through its serde form, the same path the store uses.
pub fn record_from_json(value: serde_json::Value) -> LicenseRecord {
    serde_json::from_value(value).unwrap()
}

//! Property tests for the health predicate and grace anchoring.

mod common;

use chrono::Duration;
use common::{engine_at, record_from_json, rejected, success, t0};
use keygate_authority::RejectionKind;
use keygate_core::GRACE_PERIOD_SECS;
use proptest::prelude::*;
use serde_json::json;

const STATUSES: [&str; 8] = [
    "UNCONFIGURED",
    "ACTIVE",
    "VALIDATED",
    "DEACTIVATED",
    "EXPIRED",
    "REVOKED",
    "GRACE_SOFT",
    "LOCK_HARD",
];

fn status_strategy() -> impl Strategy<Value = &'static str> {
    prop::sample::select(&STATUSES[..])
}

/// Grace offset relative to "now", in minutes; `None` means no deadline set.
fn grace_strategy() -> impl Strategy<Value = Option<i64>> {
    prop::option::of(-100_000i64..100_000)
}

proptest! {
    /// `ok` holds exactly for ACTIVE/VALIDATED, or EXPIRED with a future
    /// grace deadline. Every other combination fails closed.
    #[test]
    fn predicate_matches_definition(status in status_strategy(), grace in grace_strategy()) {
        let now = t0();
        let record = record_from_json(json!({
            "status": status,
            "grace_until": grace.map(|m| (now + Duration::minutes(m)).to_rfc3339()),
        }));

        let expected = match status {
            "ACTIVE" | "VALIDATED" => true,
            "EXPIRED" => grace.is_some_and(|m| m > 0),
            _ => false,
        };
        prop_assert_eq!(record.is_ok_at(now), expected);
    }

    /// The snapshot's `ok` field is always the predicate, never stale.
    #[test]
    fn snapshot_ok_equals_predicate(status in status_strategy(), grace in grace_strategy()) {
        let now = t0();
        let record = record_from_json(json!({
            "status": status,
            "grace_until": grace.map(|m| (now + Duration::minutes(m)).to_rfc3339()),
        }));
        prop_assert_eq!(record.snapshot_at(now).ok, record.is_ok_at(now));
    }

    /// Under any sequence of expired-validate outcomes, the grace deadline
    /// stays where the first expiry anchored it.
    #[test]
    fn grace_anchors_at_first_expiry(gaps in prop::collection::vec(0i64..12 * 60, 1..6)) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let t = engine_at(t0());
            t.authority.push(success(Some(4), Some("feedface00000001")));
            t.engine.activate("KEY-1").await.unwrap();

            let anchor = t0() + Duration::seconds(GRACE_PERIOD_SECS);
            for gap_minutes in gaps {
                t.authority.push(rejected(RejectionKind::Expired, "license expired"));
                let _ = t.engine.validate(None).await;
                assert_eq!(t.engine.record().await.grace_until(), Some(anchor));
                t.clock.advance(Duration::minutes(gap_minutes));
            }
        });
    }
}

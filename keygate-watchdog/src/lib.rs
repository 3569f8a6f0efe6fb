//! Client-side session watchdog for Keygate.
//!
//! The watchdog is the enforcement half that must work without the network:
//! seeded with a boot snapshot (or one bounded round of polling), it checks
//! the last-known license state on a timer and forcibly ends the session
//! (exactly once) when the grace deadline passes or the license is revoked.
//! It starts from a snapshot already deemed usable and only ever moves
//! toward revocation as time passes; it can never re-extend grace locally.

mod fetch;
mod watchdog;

pub use fetch::HttpSnapshotSource;
pub use watchdog::{
    evaluate, SessionSink, SessionWatchdog, SnapshotSource, Verdict, WatchdogConfig, WatchdogHandle,
};

//! The session watchdog timer task.
//!
//! Runs independently of any network call: once seeded with a snapshot it
//! evaluates the last-known state against the injected clock on every tick,
//! so the grace deadline is enforced even while the server is unreachable.
//! Enforcement fires at most once; the task exits with it, which stops the
//! timer.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use keygate_core::{Clock, HealthSnapshot, LicenseStatus};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Timer and bootstrap policy.
#[derive(Debug, Clone)]
pub struct WatchdogConfig {
    /// Time between evaluations.
    pub check_interval: Duration,
    /// Snapshot fetch attempts before standing down when no boot snapshot
    /// was provided.
    pub bootstrap_attempts: u32,
    /// Delay between bootstrap attempts.
    pub bootstrap_delay: Duration,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_secs(60),
            bootstrap_attempts: 5,
            bootstrap_delay: Duration::from_secs(2),
        }
    }
}

/// Delivers snapshots to the watchdog.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// Fetches the current health snapshot, `None` on any failure.
    /// Undecodable payloads count as failures; the caller keeps its last
    /// known snapshot.
    async fn latest(&self) -> Option<HealthSnapshot>;
}

/// Receives warnings and the forced end-of-session.
pub trait SessionSink: Send + Sync {
    /// Surfaces a non-fatal license warning to the operator.
    fn warn(&self, message: &str, deadline: Option<DateTime<Utc>>);

    /// Terminates the session and redirects to a neutral route. Called at
    /// most once per watchdog.
    fn end_session(&self, reason: &str);
}

/// What one evaluation of a snapshot concluded.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    /// License usable; nothing to do.
    Healthy,
    /// Not (fully) usable, but no local enforcement is warranted.
    Warn {
        message: String,
        deadline: Option<DateTime<Utc>>,
    },
    /// Enforce now: end the session.
    EndSession { message: String },
}

/// Evaluates a snapshot at `now`.
///
/// Local evaluation only ever moves toward revocation as time passes; the
/// watchdog cannot re-extend a grace deadline. `REVOKED` and `LOCK_HARD`
/// enforce immediately. `EXPIRED` enforces once the deadline passes and
/// degrades to a warning when no deadline is known (fail permissive; the
/// server enforces on its side).
#[must_use]
pub fn evaluate(snapshot: &HealthSnapshot, now: DateTime<Utc>) -> Verdict {
    let reason = snapshot
        .reason
        .clone()
        .unwrap_or_else(|| format!("license status {}", snapshot.status));

    match snapshot.status {
        LicenseStatus::Active | LicenseStatus::Validated => Verdict::Healthy,
        LicenseStatus::Revoked | LicenseStatus::LockHard => {
            Verdict::EndSession { message: reason }
        }
        LicenseStatus::Expired => match snapshot.grace_until {
            Some(deadline) if now >= deadline => Verdict::EndSession {
                message: format!("{reason} (grace period ended)"),
            },
            Some(deadline) => Verdict::Warn {
                message: reason,
                deadline: Some(deadline),
            },
            None => Verdict::Warn {
                message: reason,
                deadline: None,
            },
        },
        _ => Verdict::Warn {
            message: reason,
            deadline: None,
        },
    }
}

/// The per-session watchdog.
pub struct SessionWatchdog;

impl SessionWatchdog {
    /// Spawns the watchdog task.
    ///
    /// When `boot` is `None` the task polls the source over a bounded window
    /// and stands down silently if no snapshot arrives. Each tick it
    /// best-effort refreshes the snapshot (a failed fetch keeps the last
    /// one) and evaluates it against the clock.
    pub fn spawn(
        boot: Option<HealthSnapshot>,
        source: Arc<dyn SnapshotSource>,
        sink: Arc<dyn SessionSink>,
        clock: Arc<dyn Clock>,
        config: WatchdogConfig,
    ) -> WatchdogHandle {
        let task = tokio::spawn(async move {
            run(boot, source, sink, clock, config).await;
        });
        WatchdogHandle { task }
    }
}

/// Handle to a running watchdog.
pub struct WatchdogHandle {
    task: JoinHandle<()>,
}

impl WatchdogHandle {
    /// Cancels the watchdog, e.g. on a regular logout.
    pub fn stop(&self) {
        self.task.abort();
    }

    /// Returns true once the task has exited (enforced or stood down).
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Waits for the task to exit.
    pub async fn join(self) {
        let _ = self.task.await;
    }
}

async fn run(
    boot: Option<HealthSnapshot>,
    source: Arc<dyn SnapshotSource>,
    sink: Arc<dyn SessionSink>,
    clock: Arc<dyn Clock>,
    config: WatchdogConfig,
) {
    let mut snapshot = match boot {
        Some(s) => s,
        None => match bootstrap(&*source, &config).await {
            Some(s) => s,
            None => {
                debug!("no snapshot after bootstrap window; watchdog standing down");
                return;
            }
        },
    };
    info!(status = %snapshot.status, "watchdog armed");

    let mut ticker = tokio::time::interval(config.check_interval);
    loop {
        ticker.tick().await;

        // The server is authoritative in both directions; a fresh snapshot
        // replaces the last one, a failed fetch keeps it.
        if let Some(fresh) = source.latest().await {
            snapshot = fresh;
        }

        match evaluate(&snapshot, clock.now()) {
            Verdict::Healthy => {}
            Verdict::Warn { message, deadline } => {
                warn!(?deadline, "license warning: {message}");
                sink.warn(&message, deadline);
            }
            Verdict::EndSession { message } => {
                warn!("ending session: {message}");
                sink.end_session(&message);
                return;
            }
        }
    }
}

async fn bootstrap(source: &dyn SnapshotSource, config: &WatchdogConfig) -> Option<HealthSnapshot> {
    for attempt in 1..=config.bootstrap_attempts {
        if let Some(snapshot) = source.latest().await {
            return Some(snapshot);
        }
        debug!(attempt, of = config.bootstrap_attempts, "bootstrap fetch failed");
        if attempt < config.bootstrap_attempts {
            tokio::time::sleep(config.bootstrap_delay).await;
        }
    }
    None
}

//! License record, lifecycle engine, and health projection for Keygate.
//!
//! This crate owns the authoritative state of one installation's license:
//! - [`LicenseRecord`]: the persisted singleton holding status, key,
//!   activation token, remaining activations, grace deadline, reason, and
//!   timestamps.
//! - [`LicenseEngine`]: the sole writer. Four operations: activate,
//!   validate, deactivate, and the pure health evaluation. Mutations are
//!   serialized; a failed remote call never leaves a partial mutation.
//! - [`HealthSnapshot`]: the read-only projection served to clients and
//!   consumed by the session watchdog.
//!
//! # Resilience policy
//!
//! Transient network loss must not cause lockout: a connectivity failure
//! preserves the prior state and the system stays usable within any running
//! grace window. Only explicit authority rejections transition the record.

mod clock;
mod engine;
mod error;
mod record;
mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use engine::{EngineConfig, LicenseEngine, OpReport, GRACE_PERIOD_SECS};
pub use error::{LicenseError, LicenseResult};
pub use record::{HealthSnapshot, LicenseRecord, LicenseStatus};
pub use store::RecordStore;

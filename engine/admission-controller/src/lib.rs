//! Admission control for public endpoints
//!
//! Tracks, per client identity, how many requests were accepted within a
//! trailing window and turns requests away once the configured ceiling is
//! reached. Each accepted request carries its own expiry; there is no
//! top-of-the-minute reset. Expired admissions are dropped lazily on the next
//! request from the same identity and periodically by a background sweeper,
//! which also evicts identities that have been idle past a grace period.

pub mod clock;
pub mod config;
pub mod controller;
pub mod error;
pub mod sweeper;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::AdmissionConfig;
pub use controller::{AdmissionController, AdmissionStats, SweepReport};
pub use error::AdmissionError;
pub use sweeper::spawn_sweeper;

/// Lifetime of one admission in seconds
pub const DEFAULT_WINDOW_SECS: u64 = 60;

/// Idle time before an identity with nothing in flight may be evicted
pub const DEFAULT_IDLE_GRACE_SECS: u64 = 300;

/// Default cap on tracked identities
pub const DEFAULT_MAX_TRACKED_IDENTITIES: usize = 100_000;

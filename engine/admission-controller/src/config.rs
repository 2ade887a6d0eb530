//! Configuration for the admission controller

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::AdmissionError;
use crate::{DEFAULT_IDLE_GRACE_SECS, DEFAULT_MAX_TRACKED_IDENTITIES, DEFAULT_WINDOW_SECS};

/// Admission controller configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdmissionConfig {
    /// Admissions allowed per identity within one window
    pub limit_per_window: u32,

    /// Lifetime of one admission
    pub window: Duration,

    /// How long an identity with nothing in flight is kept before eviction
    pub idle_grace: Duration,

    /// Upper bound on tracked identities
    pub max_tracked_identities: usize,

    /// Cadence of the background sweeper
    pub sweep_interval: Duration,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            limit_per_window: 60,
            window: Duration::from_secs(DEFAULT_WINDOW_SECS),
            idle_grace: Duration::from_secs(DEFAULT_IDLE_GRACE_SECS),
            max_tracked_identities: DEFAULT_MAX_TRACKED_IDENTITIES,
            sweep_interval: Duration::from_secs(5),
        }
    }
}

impl AdmissionConfig {
    /// Config with the default window and the given per-minute limit
    pub fn per_minute(limit: u32) -> Self {
        Self { limit_per_window: limit, ..Default::default() }
    }

    pub fn validate(&self) -> Result<(), AdmissionError> {
        if self.limit_per_window == 0 {
            return Err(AdmissionError::InvalidConfig {
                message: "limit_per_window must be at least 1".to_string(),
            });
        }
        if self.window.is_zero() {
            return Err(AdmissionError::InvalidConfig {
                message: "window must be non-zero".to_string(),
            });
        }
        if self.max_tracked_identities == 0 {
            return Err(AdmissionError::InvalidConfig {
                message: "max_tracked_identities must be at least 1".to_string(),
            });
        }
        if self.sweep_interval.is_zero() {
            return Err(AdmissionError::InvalidConfig {
                message: "sweep_interval must be non-zero".to_string(),
            });
        }
        Ok(())
    }
}

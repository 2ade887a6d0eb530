//! Utility telemetry HTTP API
//!
//! Serves household electricity and water readings behind a shared key, and
//! public day-ahead electricity price statistics behind a per-client sliding
//! window rate limit.

use anyhow::{Context, Result};
use std::path::Path;

pub mod auth;
pub mod config;
pub mod error;
pub mod identity;
pub mod logging;
pub mod mysql;
pub mod rest_api;
pub mod service;
pub mod signals;
pub mod store;
pub mod usage;

pub use config::ServiceConfig;
pub use error::{ApiError, ConfigError, StoreError};
pub use logging::initialize_logging;
pub use mysql::MySqlTelemetryStore;
pub use rest_api::{create_routes, ApiContext};
pub use service::TelemetryService;
pub use signals::shutdown_signal;
pub use store::{PriceRow, Row, SortOrder, Table, TelemetryStore};
pub use usage::{collect_usage, UsageSnapshot};

/// Load configuration from an optional file and the environment
pub fn load_configuration(path: Option<&Path>) -> Result<ServiceConfig> {
    ServiceConfig::load(path).context("Failed to load service configuration")
}

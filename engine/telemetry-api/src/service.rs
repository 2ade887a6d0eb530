//! Service wiring and lifecycle

use admission_controller::{spawn_sweeper, AdmissionController};
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

use crate::config::ServiceConfig;
use crate::mysql::MySqlTelemetryStore;
use crate::rest_api::{create_routes, ApiContext};
use crate::signals::shutdown_signal;

/// The telemetry HTTP service and the components it owns
pub struct TelemetryService {
    config: ServiceConfig,
    store: MySqlTelemetryStore,
    admission: Arc<AdmissionController>,
}

impl TelemetryService {
    pub fn new(config: ServiceConfig) -> Result<Self> {
        let store = MySqlTelemetryStore::connect_lazy(&config.database);
        let admission = Arc::new(
            AdmissionController::new(config.rate_limits.admission_config())
                .context("Invalid rate limit configuration")?,
        );

        Ok(Self { config, store, admission })
    }

    /// Serve until a shutdown signal arrives, then release resources
    pub async fn run(self) -> Result<()> {
        let addr = self.config.server_addr()?;
        let ctx = ApiContext::new(&self.config, Arc::new(self.store.clone()), self.admission.clone())?;
        let routes = create_routes(ctx);

        let sweeper = spawn_sweeper(self.admission.clone());

        let (bound, server) = warp::serve(routes)
            .try_bind_with_graceful_shutdown(addr, shutdown_signal())
            .with_context(|| format!("Failed to bind {}", addr))?;

        info!(
            "Telemetry API listening on http://{} ({} requests per minute per client on public endpoints)",
            bound, self.config.rate_limits.public_requests_per_minute
        );

        server.await;

        info!("Shutting down...");
        sweeper.abort();
        self.store.close().await;
        info!("Shutdown complete");

        Ok(())
    }
}

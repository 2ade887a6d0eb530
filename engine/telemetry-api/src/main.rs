//! Utility telemetry API server

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;

use telemetry_api::{initialize_logging, load_configuration, TelemetryService};

/// HTTP API for utility telemetry and electricity prices
#[derive(Parser)]
#[command(name = "telemetry-api")]
#[command(version, about = "HTTP API for utility telemetry and electricity prices")]
struct Cli {
    /// Optional TOML configuration file; environment variables override it
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let config = load_configuration(cli.config.as_deref())?;
    initialize_logging(&config.logging)?;

    info!("Starting Telemetry API v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "Prices reported in {} from the latest {} samples",
        config.pricing.time_zone, config.pricing.sample_window
    );

    let service = TelemetryService::new(config).context("Failed to initialize service")?;
    service.run().await
}

//! Signal handling for graceful shutdown

use tracing::{error, info};

/// Resolve once Ctrl+C or (on Unix) SIGTERM is received
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C signal: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = wait_for_sigterm();
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Ctrl+C signal received"),
        _ = terminate => info!("SIGTERM signal received"),
    }
}

#[cfg(unix)]
async fn wait_for_sigterm() {
    use signal_hook::consts::SIGTERM;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    let shutdown_flag = Arc::new(AtomicBool::new(false));
    if let Err(e) = signal_hook::flag::register(SIGTERM, shutdown_flag.clone()) {
        error!("Failed to register SIGTERM handler: {}", e);
        std::future::pending::<()>().await;
    }

    // signal-hook only sets the flag, so poll it
    let mut interval = tokio::time::interval(Duration::from_millis(100));
    while !shutdown_flag.load(Ordering::Relaxed) {
        interval.tick().await;
    }
}

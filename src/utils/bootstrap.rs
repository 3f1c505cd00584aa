//! Bootstrap utilities for copium binaries.

use std::future::Future;

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::LOG_ENV_VAR;

/// Initialize tracing with the COPIUM_LOG environment variable.
///
/// Defaults to "info" level if COPIUM_LOG is not set.
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_env(LOG_ENV_VAR)
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Resolve once Ctrl-C is received or `stop` completes, whichever is first.
pub async fn shutdown_signal<F>(stop: F)
where
    F: Future<Output = ()>,
{
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            }
            info!("Ctrl-C received, shutting down");
        }
        _ = stop => {
            info!("Stop requested, shutting down");
        }
    }
}

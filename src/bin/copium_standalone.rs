//! copium-standalone: all components in one process.
//!
//! Runs the in-memory stores, the channel event bus and both projection
//! consumers until Ctrl-C.
//!
//! ## Configuration
//! ```yaml
//! bus:
//!   publish_timeout_secs: 10
//!   publish_retries: 3
//! pool:
//!   workers: 4
//!   queue_capacity: 256
//! dashboard:
//!   min_hits: 10
//!   max_hits: 18
//! auth:
//!   tokens:
//!     dev-token: dev@example.com
//! ```
//!
//! The config file path may be given as the first argument or through
//! `COPIUM_CONFIG`; `COPIUM__POOL__WORKERS=8` style variables override it.

use tracing::info;

use copium::config::CopiumConfig;
use copium::standalone::Runtime;
use copium::utils::bootstrap::{init_tracing, shutdown_signal};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let config_path = std::env::args().nth(1);
    let config = CopiumConfig::load(config_path.as_deref())?;
    info!(
        workers = config.pool.workers,
        publish_timeout_secs = config.bus.publish_timeout_secs,
        "Configuration loaded"
    );

    let runtime = Runtime::start(&config).await;

    shutdown_signal(std::future::pending()).await;
    runtime.shutdown().await;

    Ok(())
}

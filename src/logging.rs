// Optional subscriber setup for binaries and tests embedding the client.
// The library itself only emits `tracing` events.

use tracing_subscriber::EnvFilter;

pub const LOG_ENV: &str = "STOREFRONT_LOG";

/// Installs a global fmt subscriber. `STOREFRONT_LOG`, then `RUST_LOG`,
/// override `default_filter`. Returns false when a subscriber was already set.
pub fn init_logging(default_filter: &str) -> bool {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(default_filter));

    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_ok();

    if installed {
        tracing::debug!(component = "bootstrap", "logging initialized");
    }
    installed
}

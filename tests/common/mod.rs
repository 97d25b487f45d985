// Shared helpers for the router integration tests.
#![allow(dead_code)]

use hdf_message_router::Message::Router;
use hdf_message_router::{NodeConfig, RouterResult};
use std::time::{Duration, Instant};

/// Installs a fmt subscriber once per test binary. Filter with RUST_LOG.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

/// Starts a fresh local-only router with the default dispatcher.
pub fn fresh_router() -> RouterResult<()> {
    init_tracing();
    Router::shutdown_message_router()?;
    Router::start_message_router(NodeConfig::LOCAL)?;
    Router::enable_default_dispatcher()
}

/// Polls `cond` until it holds or `timeout` passes.
pub fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    cond()
}

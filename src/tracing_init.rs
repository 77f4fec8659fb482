//! Tracing initialization for tests and host applications
//!
//! The decoder only emits `tracing` events; installing a subscriber is left
//! to whoever drives it. These helpers install a `fmt` subscriber filtered by
//! `RUST_LOG`:
//! - `RUST_LOG=rustyrds=debug` - sync acquisitions, drift and diversity events
//! - `RUST_LOG=rustyrds::pi_tracker=trace` - every PI vote (very verbose)
//! - `RUST_LOG=rustyrds=info,rustyrds::drift=debug` - mixed levels

use once_cell::sync::Lazy;
use tracing_subscriber::{fmt, EnvFilter};

fn filter(default: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

/// Initialize tracing for unit and integration tests
///
/// Output goes through the test writer so it is captured per test. Safe to
/// call from every test; only the first call installs the subscriber.
pub fn init_test_tracing() {
    static TRACING: Lazy<()> = Lazy::new(|| {
        // Another harness may already own the global subscriber
        let _ = fmt()
            .with_env_filter(filter("rustyrds=warn"))
            .with_target(true)
            .with_thread_ids(false)
            .with_line_number(true)
            .with_test_writer()
            .try_init();
    });

    Lazy::force(&TRACING);
}

/// Initialize tracing for benchmarks and host applications
///
/// Call once, early, before feeding samples to a decoder.
pub fn init_tracing() {
    let _ = fmt()
        .with_env_filter(filter("rustyrds=info"))
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .try_init();
}

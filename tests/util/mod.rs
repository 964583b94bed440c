//! Utilities shared by the integration tests.

pub mod response;

use std::sync::Once;

static INIT: Once = Once::new();

/// Installs a [`tracing`] subscriber that writes through the test harness,
/// so logs only show up for failing tests. Safe to call from every test.
pub fn init_logging() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_max_level(tracing::Level::DEBUG)
            .try_init();
    });
}

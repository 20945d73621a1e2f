//! Test support: one-time tracing setup shared by unit and integration tests.

use std::sync::Once;

use tracing::debug;
use tracing_subscriber::{filter::filter_fn, fmt, prelude::*, EnvFilter};

static TEST_SETUP: Once = Once::new();

/// Engine events at trace level unless `RUST_LOG` says otherwise.
const DEFAULT_DIRECTIVES: &str = "mscalls=trace";

/// Install the test subscriber once per process.
pub fn init_test_setup() {
    TEST_SETUP.call_once(|| {
        // rayon's worker bookkeeping drowns the engine's own events
        let not_rayon = filter_fn(|metadata| !metadata.target().starts_with("rayon"));
        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES));

        let installed = tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_test_writer()
                    .with_thread_names(true)
                    .with_filter(not_rayon)
                    .with_filter(env_filter),
            )
            .try_init();
        match installed {
            Ok(()) => debug!("test subscriber installed"),
            Err(e) => eprintln!("test subscriber not installed: {}", e),
        }
    });
}

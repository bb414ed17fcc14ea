//! Logging initialization and configuration.

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Filter used when neither `RUST_LOG` nor a configured level is present.
pub const DEFAULT_FILTER: &str = "info,lava=debug";

/// Initialize the logging system with the default filter.
///
/// This sets up tracing-subscriber with:
/// - Environment-based filtering (RUST_LOG)
/// - Target and thread id annotations
///
/// # Example
/// ```
/// lava_core::init_logging();
/// tracing::info!("Frame initialized");
/// ```
pub fn init_logging() {
    init_logging_with(None);
}

/// Initialize logging, falling back to `level` when `RUST_LOG` is unset.
///
/// `level` accepts any [`EnvFilter`] directive such as `"debug"` or
/// `"warn,lava_frame=trace"`. An unparsable directive falls back to
/// [`DEFAULT_FILTER`]. Calling this more than once is harmless; only the
/// first subscriber is installed.
pub fn init_logging_with(level: Option<&str>) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        level
            .and_then(|directive| EnvFilter::try_new(directive).ok())
            .unwrap_or_else(|| EnvFilter::new(DEFAULT_FILTER))
    });

    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .try_init()
        .is_ok();

    if !installed {
        tracing::debug!("Logging already initialized");
    }
}

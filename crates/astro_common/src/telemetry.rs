//! Telemetry and logging initialization
//!
//! Provides structured logging with `tracing` and `tracing-subscriber`.
//! Logs always go to stderr so command output on stdout stays machine-readable.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize tracing subscriber with appropriate configuration
///
/// # Arguments
/// * `verbose` - If true, sets log level to DEBUG, otherwise INFO
/// * `json_format` - If true, outputs logs in JSON format for machine parsing
///
/// Calling this more than once in a process is harmless; later calls are ignored.
///
/// # Example
/// ```
/// astro_common::telemetry::init_tracing(false, false);
/// tracing::info!("AstroSync started");
/// ```
pub fn init_tracing(verbose: bool, json_format: bool) {
    let filter_level = if verbose {
        "debug,hyper=info,reqwest=info,tokio=info"
    } else {
        "info"
    };

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter_level));

    let result = if json_format {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .with(env_filter)
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(false)
                    .compact(),
            )
            .with(env_filter)
            .try_init()
    };

    if let Err(e) = result {
        tracing::debug!("Tracing already initialized: {}", e);
    }
}

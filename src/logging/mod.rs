// Logging module for structured logging using the tracing crate

use std::error::Error;

use tracing_subscriber::EnvFilter;

/// Initialize the tracing subscriber for structured logging
///
/// The subscriber is configured with:
/// - JSON formatting for easy parsing by log aggregation systems
/// - Filtering from `RUST_LOG` when set, otherwise from `default_level`
/// - Output to stdout for container/serverless deployments
///
/// # Errors
///
/// Returns an error if the filter directive is invalid or a global
/// subscriber has already been installed.
///
/// # Examples
///
/// ```
/// use image_handler::logging::init_subscriber;
///
/// init_subscriber("info").expect("Failed to initialize logging");
/// tracing::info!("Application started");
/// ```
pub fn init_subscriber(default_level: &str) -> Result<(), Box<dyn Error + Send + Sync>> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(default_level)?,
    };

    tracing_subscriber::fmt()
        .json()
        .with_env_filter(filter)
        .with_current_span(true)
        .try_init()
}

//! Tracing subscriber initialization.
//!
//! # Usage
//!
//! ```no_run
//! // Human-readable output, default filter "warn"
//! visor_observe::tracing_setup::init_tracing("warn", false).unwrap();
//!
//! // Structured JSON lines (for log shipping)
//! visor_observe::tracing_setup::init_tracing("info", true).unwrap();
//! ```

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Initialize the global tracing subscriber.
///
/// - `RUST_LOG` takes precedence over `default_filter` when set.
/// - `json` switches the fmt layer to JSON lines; otherwise output is
///   compact human-readable text without targets.
///
/// # Errors
///
/// Returns an error if a global subscriber has already been installed.
pub fn init_tracing(default_filter: &str, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().with_target(false))
            .try_init()?;
    }

    Ok(())
}

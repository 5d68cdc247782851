//! Structured logging.
//!
//! # Responsibilities
//! - Install the global tracing subscriber once, from the binaries
//! - Pick the output format (json for production, pretty for development)
//!
//! # Design Decisions
//! - `RUST_LOG` wins over the configured level
//! - Library code never installs a subscriber; components log under spans handed to them

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::config::{LogFormat, LoggingConfig};

/// Install the global subscriber. Fails if one is already set.
pub fn init(config: &LoggingConfig) -> Result<(), tracing_subscriber::util::TryInitError> {
    let fallback = format!("resource_nexus={},tower_http=info", config.level);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    let registry = tracing_subscriber::registry().with(filter);
    match config.format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(true))
            .try_init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).try_init(),
    }
}

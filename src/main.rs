//! resource-nexus server.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ axum-server (TLS optional, request timeout, in-flight tracking)
//!                        │
//!                        ▼
//!                     Recovery → Logging → Global limit → Client limit → Authentication
//!                        │
//!                        ▼
//!                     dispatcher (route match, required permission) → handler
//!                        │
//!                        ▼
//!                     BoundedStore (per-call deadline) → PostgreSQL
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use resource_nexus::auth::seed_permissions;
use resource_nexus::config::load_config;
use resource_nexus::lifecycle::shutdown_signal;
use resource_nexus::net::load_tls_config;
use resource_nexus::observability::{logging, metrics};
use resource_nexus::store::{PgStore, Store};
use resource_nexus::Pipeline;

#[derive(Parser)]
#[command(
    name = "resource-nexus",
    version,
    about = "Administrative API for users, groups and permissions"
)]
struct Cli {
    /// Config file (TOML). Defaults apply when it does not exist.
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = load_config(&cli.config)?;
    logging::init(&config.logging)?;

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "resource-nexus starting");
    tracing::debug!(config = ?config.redacted(), "configuration loaded");

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr)?,
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let store = PgStore::connect_lazy(&config.database)?;
    store.ensure_schema().await?;
    seed_permissions(&store).await?;

    let root = tracing::info_span!("resource_nexus");
    let shared: Arc<dyn Store> = Arc::new(store.clone());
    let mut pipeline = Pipeline::new(&config, shared, &root);
    if let Some(tls) = &config.listener.tls {
        let tls = load_tls_config(tls.cert_path.as_ref(), tls.key_path.as_ref()).await?;
        pipeline = pipeline.with_tls(tls);
    }

    let addr = pipeline.start().await?;
    tracing::info!(address = %addr, "resource-nexus ready. awaiting requests");

    shutdown_signal().await;

    tracing::info!("start shutting down resource-nexus");
    if let Err(e) = pipeline.shutdown(config.listener.shutdown_grace()).await {
        tracing::error!(error = %e, "graceful shutdown failed");
    }
    store.close().await;

    tracing::info!("Shutdown complete");
    Ok(())
}

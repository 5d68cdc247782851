//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Pipeline stages, store, binaries produce:
//!     → logging.rs (structured tracing events under per-component spans)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → stdout (json or pretty)
//!     → Prometheus scrape endpoint (optional)
//! ```
//!
//! # Design Decisions
//! - Request ID (UUID v4) flows through every event of a request via its span
//! - Metric updates are no-ops until a recorder is installed

pub mod logging;
pub mod metrics;

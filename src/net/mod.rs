//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     tls.rs (read + validate PEM material before the listener binds)
//!
//! Per request:
//!     connection.rs (in-flight guard held for the request's lifetime)
//!     → Pipeline::shutdown waits for the count to reach zero
//! ```
//!
//! # Design Decisions
//! - TLS material is preloaded; a bad certificate fails startup, not the first handshake
//! - Each request is tracked for graceful shutdown

pub mod connection;
pub mod tls;

pub use connection::{RequestGuard, RequestTracker};
pub use tls::{load_tls_config, TlsError};

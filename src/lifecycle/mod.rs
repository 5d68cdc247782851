//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → shutdown_signal() resolves
//!
//! Shutdown (shutdown.rs):
//!     trigger() → background tasks stop
//!     Pipeline::shutdown(grace) → stop accepting → drain in-flight requests
//! ```
//!
//! # Design Decisions
//! - Shutdown has a deadline: requests still open after it are abandoned and logged
//! - Background tasks subscribe to one broadcast instead of holding their own flags

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
pub use signals::shutdown_signal;

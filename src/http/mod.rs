//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (axum-server, request timeout, in-flight tracking)
//!     → pipeline.rs (composed interceptor chain)
//!         → interceptors.rs (recovery, logging + request ID)
//!         → security::rate_limit (global, per client)
//!         → auth::authentication
//!     → routes.rs (dispatcher: match route, per-route permission)
//!     → handlers.rs (store operations)
//!     → response.rs (message envelope, error mapping)
//! ```

pub mod handlers;
pub mod interceptors;
pub mod pipeline;
pub mod request;
pub mod response;
pub mod routes;
pub mod server;

pub use handlers::AppState;
pub use pipeline::{compose, Handler, Interceptor};
pub use request::{RequestId, X_REQUEST_ID};
pub use response::{ApiError, ApiResult, Message};
pub use server::{Pipeline, PipelineError};

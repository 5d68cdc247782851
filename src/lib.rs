//! Administrative API for users, groups and permission grants.
//!
//! Requests pass an ordered interceptor chain (recovery, logging, global and
//! per-client rate limiting, Basic authentication) before the dispatcher
//! checks the route's permission and runs the handler against the store.

pub mod auth;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod query;
pub mod security;
pub mod store;

pub use config::NexusConfig;
pub use http::{Pipeline, PipelineError};
pub use lifecycle::Shutdown;

//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (read & deserialize; missing file → defaults)
//!     → validation.rs (semantic checks)
//!     → NexusConfig (validated, immutable)
//!     → sections handed to the subsystems that need them
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    DatabaseConfig, ListenerConfig, LogFormat, LoggingConfig, NexusConfig, ObservabilityConfig,
    RateLimitConfig, SecurityConfig, TlsConfig,
};
pub use validation::{validate_config, ValidationError};

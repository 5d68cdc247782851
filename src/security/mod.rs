//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → rate_limit.rs (global bucket, then per-address bucket)
//!     → auth::authentication (Basic credentials)
//!         → credentials.rs (decode stored hash, recompute, compare)
//! ```
//!
//! # Design Decisions
//! - Fail closed: reject on any security check failure
//! - Stored hashes are self-describing; verification never needs outside parameters
//! - Rate-limit state is process-local

pub mod credentials;
pub mod rate_limit;

pub use credentials::{hash_password, verify_password, CredentialError, HashingParams, PasswordHash};
pub use rate_limit::{ClientRateLimit, ClientRateLimiter, GlobalRateLimit, TokenBucket};

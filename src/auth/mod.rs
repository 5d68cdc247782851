//! Identity and access control.
//!
//! # Data Flow
//! ```text
//! Authorization: Basic <b64(user:password)>
//!     → authentication.rs (parse header, resolve principal, verify hash)
//!     → Principal stored in request extensions
//!     → authorization.rs (per-route required permission)
//!     → handler
//! ```
//!
//! # Design Decisions
//! - Every authentication failure answers with the same 401 body; the reason is logged only
//! - Administrators pass every permission check without a grant lookup
//! - Permissions are compared in canonical `category:resource:action` form

pub mod admin;
pub mod authentication;
pub mod authorization;
pub mod permissions;
pub mod principal;

pub use admin::{create_admin, AdminError, ADMIN_USER};
pub use authentication::{parse_basic_auth, Authenticator, Credentials};
pub use authorization::{authorize, require_permission, RequiredPermission};
pub use permissions::{seed_permissions, PermissionName, PermissionParseError};
pub use principal::{resolve_principal, Principal};

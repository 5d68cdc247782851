//! Relational store subsystem.
//!
//! # Data Flow
//! ```text
//! handler / authenticator
//!     → bounded.rs (per-call deadline)
//!     → Store implementation (postgres.rs in production)
//!         → query::build_where(filter) → "SELECT … WHERE …" + bound args
//!     → rows mapped into models.rs types
//! ```
//!
//! # Design Decisions
//! - Reads take an optional filter tree; `None` selects everything
//! - Inserts report rows affected so callers can detect silent no-ops
//! - Every call made on behalf of a request is bounded by a deadline

pub mod bounded;
pub mod models;
pub mod postgres;

use std::time::Duration;

use async_trait::async_trait;

use crate::query::{FilterError, FilterExpr};

pub use bounded::BoundedStore;
pub use models::{Group, GroupPermission, Permission, User, UserGroup};
pub use postgres::PgStore;

/// Errors returned by store calls.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("no {0} found")]
    NotFound(String),

    #[error("found more than one {0}")]
    Ambiguous(String),

    #[error("store call timed out after {0:?}")]
    Timeout(Duration),

    #[error("cant build query: {0}")]
    Filter(#[from] FilterError),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Access to users, groups, permissions and their references.
#[async_trait]
pub trait Store: Send + Sync + 'static {
    /// Check connectivity.
    async fn ping(&self) -> Result<(), StoreError>;

    async fn users(&self, filter: Option<&FilterExpr>) -> Result<Vec<User>, StoreError>;

    async fn insert_user(
        &self,
        name: &str,
        password_hash: &str,
        is_admin: bool,
    ) -> Result<u64, StoreError>;

    /// Distinct permissions granted to `username` through its groups.
    async fn user_permissions(&self, username: &str) -> Result<Vec<Permission>, StoreError>;

    async fn groups(&self, filter: Option<&FilterExpr>) -> Result<Vec<Group>, StoreError>;

    async fn insert_group(&self, name: &str) -> Result<u64, StoreError>;

    async fn permissions(&self, filter: Option<&FilterExpr>) -> Result<Vec<Permission>, StoreError>;

    async fn insert_permission(
        &self,
        category: &str,
        resource: &str,
        action: &str,
    ) -> Result<u64, StoreError>;

    async fn user_groups(&self, filter: Option<&FilterExpr>) -> Result<Vec<UserGroup>, StoreError>;

    async fn insert_user_group(&self, user_id: i64, group_id: i64) -> Result<u64, StoreError>;

    async fn group_permissions(
        &self,
        filter: Option<&FilterExpr>,
    ) -> Result<Vec<GroupPermission>, StoreError>;

    async fn insert_group_permission(
        &self,
        group_id: i64,
        permission_id: i64,
    ) -> Result<u64, StoreError>;
}

/// Reduce a row set to exactly one row.
pub fn expect_one<T>(mut rows: Vec<T>, what: &str) -> Result<T, StoreError> {
    match rows.len() {
        0 => Err(StoreError::NotFound(what.to_string())),
        1 => Ok(rows.remove(0)),
        _ => Err(StoreError::Ambiguous(what.to_string())),
    }
}

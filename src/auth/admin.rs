//! Bootstrap of the administrator account.

use crate::query::FilterExpr;
use crate::security::{hash_password, CredentialError, HashingParams};
use crate::store::{Store, StoreError};

pub const ADMIN_USER: &str = "admin";

#[derive(Debug, thiserror::Error)]
pub enum AdminError {
    #[error("user '{}' already exists", ADMIN_USER)]
    Exists,

    #[error("admin password must not be empty")]
    EmptyPassword,

    #[error(transparent)]
    Credential(#[from] CredentialError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Create the `admin` user with the administrator flag set.
pub async fn create_admin(
    store: &dyn Store,
    password: &str,
    params: &HashingParams,
) -> Result<(), AdminError> {
    if password.is_empty() {
        return Err(AdminError::EmptyPassword);
    }

    let existing = store.users(Some(&FilterExpr::eq("name", ADMIN_USER))).await?;
    if !existing.is_empty() {
        return Err(AdminError::Exists);
    }

    let hash = hash_password(password, params)?;
    store.insert_user(ADMIN_USER, &hash, true).await?;
    tracing::info!(user = ADMIN_USER, "administrator created");
    Ok(())
}

//! The identity attached to one request.

use std::collections::HashSet;

use crate::query::FilterExpr;
use crate::store::{expect_one, Store, StoreError};

/// Identity resolved for one request. Never persisted.
#[derive(Clone, PartialEq, Eq)]
pub struct Principal {
    pub id: i64,
    pub name: String,
    pub password_hash: String,
    pub is_admin: bool,
    /// Canonical `category:resource:action` grants.
    pub permissions: HashSet<String>,
    /// Set only after the supplied password matched.
    pub authenticated: bool,
}

impl Principal {
    pub fn has_permission(&self, permission: &str) -> bool {
        self.is_admin || self.permissions.contains(permission)
    }
}

impl std::fmt::Debug for Principal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Principal")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("is_admin", &self.is_admin)
            .field("permissions", &self.permissions)
            .field("authenticated", &self.authenticated)
            .finish()
    }
}

/// Load the user named `name` and, for non-administrators, its transitive grants.
pub async fn resolve_principal(store: &dyn Store, name: &str) -> Result<Principal, StoreError> {
    let filter = FilterExpr::eq("name", name);
    let user = expect_one(store.users(Some(&filter)).await?, "user")?;

    let permissions = if user.is_admin {
        HashSet::new()
    } else {
        store
            .user_permissions(&user.name)
            .await?
            .iter()
            .map(|p| p.canonical())
            .collect()
    };

    Ok(Principal {
        id: user.id,
        name: user.name,
        password_hash: user.password_hash,
        is_admin: user.is_admin,
        permissions,
        authenticated: false,
    })
}

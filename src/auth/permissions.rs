//! Permission names and the set of permissions the API checks.

use std::fmt;
use std::str::FromStr;

use crate::store::{Store, StoreError};

pub const USER_ADD: &str = "auth:user:add";
pub const USER_GET: &str = "auth:user:get";
pub const GROUP_ADD: &str = "auth:group:add";
pub const USERGROUP_ADD: &str = "auth:usergroup:add";
pub const GROUPPERMISSION_ADD: &str = "auth:grouppermission:add";

/// Every permission a route can require.
pub const ROUTE_PERMISSIONS: &[&str] =
    &[USER_ADD, USER_GET, GROUP_ADD, USERGROUP_ADD, GROUPPERMISSION_ADD];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("permission must look like category:resource:action, got '{0}'")]
pub struct PermissionParseError(pub String);

/// A permission in canonical `category:resource:action` form.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PermissionName {
    pub category: String,
    pub resource: String,
    pub action: String,
}

impl FromStr for PermissionName {
    type Err = PermissionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split(':');
        match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(category), Some(resource), Some(action), None)
                if !category.is_empty() && !resource.is_empty() && !action.is_empty() =>
            {
                Ok(Self {
                    category: category.to_string(),
                    resource: resource.to_string(),
                    action: action.to_string(),
                })
            }
            _ => Err(PermissionParseError(s.to_string())),
        }
    }
}

impl fmt::Display for PermissionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.category, self.resource, self.action)
    }
}

/// Insert every route permission that is not stored yet. Returns how many were added.
pub async fn seed_permissions(store: &dyn Store) -> Result<u64, StoreError> {
    let mut added = 0;
    for name in ROUTE_PERMISSIONS {
        let permission: PermissionName = match name.parse() {
            Ok(p) => p,
            Err(e) => {
                tracing::error!(error = %e, "skipping malformed route permission");
                continue;
            }
        };
        added += store
            .insert_permission(&permission.category, &permission.resource, &permission.action)
            .await?;
    }
    tracing::info!(added, total = ROUTE_PERMISSIONS.len(), "route permissions seeded");
    Ok(added)
}

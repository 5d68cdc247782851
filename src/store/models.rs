//! Rows of the authorization schema.

use serde::{Deserialize, Serialize};

pub const TABLE_USERS: &str = "users";
pub const TABLE_GROUPS: &str = "groups";
pub const TABLE_PERMISSIONS: &str = "permissions";
pub const TABLE_USER_GROUPS: &str = "user_groups";
pub const TABLE_GROUP_PERMISSIONS: &str = "group_permissions";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub password_hash: String,
    pub is_admin: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    pub id: i64,
    pub category: String,
    pub resource: String,
    pub action: String,
}

impl Permission {
    /// Canonical `category:resource:action` form.
    pub fn canonical(&self) -> String {
        format!("{}:{}:{}", self.category, self.resource, self.action)
    }
}

/// Membership of a user in a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserGroup {
    pub user_id: i64,
    pub group_id: i64,
}

/// Grant of a permission to a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupPermission {
    pub group_id: i64,
    pub permission_id: i64,
}

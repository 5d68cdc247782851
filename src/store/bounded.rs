//! Deadline enforcement for store calls.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::query::FilterExpr;
use crate::store::{Group, GroupPermission, Permission, Store, StoreError, User, UserGroup};

/// Wraps a store so that no call outlives `limit`.
///
/// A call still pending at the deadline is dropped and reported as
/// [`StoreError::Timeout`].
#[derive(Clone)]
pub struct BoundedStore {
    inner: Arc<dyn Store>,
    limit: Duration,
}

impl BoundedStore {
    pub fn new(inner: Arc<dyn Store>, limit: Duration) -> Self {
        Self { inner, limit }
    }

    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, StoreError> {
        tokio::time::timeout(self.limit, call)
            .await
            .map_err(|_| StoreError::Timeout(self.limit))?
    }
}

#[async_trait]
impl Store for BoundedStore {
    async fn ping(&self) -> Result<(), StoreError> {
        self.bounded(self.inner.ping()).await
    }

    async fn users(&self, filter: Option<&FilterExpr>) -> Result<Vec<User>, StoreError> {
        self.bounded(self.inner.users(filter)).await
    }

    async fn insert_user(
        &self,
        name: &str,
        password_hash: &str,
        is_admin: bool,
    ) -> Result<u64, StoreError> {
        self.bounded(self.inner.insert_user(name, password_hash, is_admin)).await
    }

    async fn user_permissions(&self, username: &str) -> Result<Vec<Permission>, StoreError> {
        self.bounded(self.inner.user_permissions(username)).await
    }

    async fn groups(&self, filter: Option<&FilterExpr>) -> Result<Vec<Group>, StoreError> {
        self.bounded(self.inner.groups(filter)).await
    }

    async fn insert_group(&self, name: &str) -> Result<u64, StoreError> {
        self.bounded(self.inner.insert_group(name)).await
    }

    async fn permissions(
        &self,
        filter: Option<&FilterExpr>,
    ) -> Result<Vec<Permission>, StoreError> {
        self.bounded(self.inner.permissions(filter)).await
    }

    async fn insert_permission(
        &self,
        category: &str,
        resource: &str,
        action: &str,
    ) -> Result<u64, StoreError> {
        self.bounded(self.inner.insert_permission(category, resource, action)).await
    }

    async fn user_groups(&self, filter: Option<&FilterExpr>) -> Result<Vec<UserGroup>, StoreError> {
        self.bounded(self.inner.user_groups(filter)).await
    }

    async fn insert_user_group(&self, user_id: i64, group_id: i64) -> Result<u64, StoreError> {
        self.bounded(self.inner.insert_user_group(user_id, group_id)).await
    }

    async fn group_permissions(
        &self,
        filter: Option<&FilterExpr>,
    ) -> Result<Vec<GroupPermission>, StoreError> {
        self.bounded(self.inner.group_permissions(filter)).await
    }

    async fn insert_group_permission(
        &self,
        group_id: i64,
        permission_id: i64,
    ) -> Result<u64, StoreError> {
        self.bounded(self.inner.insert_group_permission(group_id, permission_id)).await
    }
}

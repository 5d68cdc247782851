//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::cmp::Ordering;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::extract::ConnectInfo;
use axum::http::{header, Method, Request};
use axum::response::Response;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::de::DeserializeOwned;
use tracing::Span;

use resource_nexus::auth::seed_permissions;
use resource_nexus::config::NexusConfig;
use resource_nexus::query::{FilterExpr, Value};
use resource_nexus::security::{hash_password, HashingParams};
use resource_nexus::store::{Group, GroupPermission, Permission, Store, StoreError, User, UserGroup};
use resource_nexus::Pipeline;

pub const ADMIN_PASSWORD: &str = "admin-password";

/// Cheap argon2 parameters so tests do not spend seconds hashing.
pub fn fast_hashing() -> HashingParams {
    HashingParams {
        iterations: 1,
        memory_cost: 1024,
        parallelism: 1,
        ..HashingParams::default()
    }
}

/// Row field access used to evaluate filters in memory.
trait Fields {
    fn field(&self, key: &str) -> Option<Value>;
}

impl Fields for User {
    fn field(&self, key: &str) -> Option<Value> {
        match key {
            "id" => Some(self.id.into()),
            "name" => Some(self.name.clone().into()),
            "password_hash" => Some(self.password_hash.clone().into()),
            "is_admin" => Some(self.is_admin.into()),
            _ => None,
        }
    }
}

impl Fields for Group {
    fn field(&self, key: &str) -> Option<Value> {
        match key {
            "id" => Some(self.id.into()),
            "name" => Some(self.name.clone().into()),
            _ => None,
        }
    }
}

impl Fields for Permission {
    fn field(&self, key: &str) -> Option<Value> {
        match key {
            "id" => Some(self.id.into()),
            "category" => Some(self.category.clone().into()),
            "resource" => Some(self.resource.clone().into()),
            "action" => Some(self.action.clone().into()),
            _ => None,
        }
    }
}

impl Fields for UserGroup {
    fn field(&self, key: &str) -> Option<Value> {
        match key {
            "user_id" => Some(self.user_id.into()),
            "group_id" => Some(self.group_id.into()),
            _ => None,
        }
    }
}

impl Fields for GroupPermission {
    fn field(&self, key: &str) -> Option<Value> {
        match key {
            "group_id" => Some(self.group_id.into()),
            "permission_id" => Some(self.permission_id.into()),
            _ => None,
        }
    }
}

/// Mismatched types fail loudly, as the database would reject the query.
fn compare(left: &Value, right: &Value) -> Ordering {
    match (left, right) {
        (Value::Int(a), Value::Int(b)) => a.cmp(b),
        (Value::Text(a), Value::Text(b)) => a.cmp(b),
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        _ => panic!("cannot compare {left:?} with {right:?}"),
    }
}

fn like(text: &str, pattern: &str) -> bool {
    match (pattern.strip_prefix('%'), pattern.strip_suffix('%')) {
        (Some(rest), _) if rest.ends_with('%') => text.contains(&rest[..rest.len() - 1]),
        (Some(suffix), _) => text.ends_with(suffix),
        (None, Some(prefix)) => text.starts_with(prefix),
        (None, None) => text == pattern,
    }
}

fn matches<R: Fields>(row: &R, filter: Option<&FilterExpr>) -> bool {
    let Some(filter) = filter else {
        return true;
    };
    match filter {
        FilterExpr::Leaf(leaf) => {
            let Some(actual) = row.field(&leaf.key) else {
                return false;
            };
            let ordering = compare(&actual, &leaf.value);
            match leaf.operator.to_ascii_uppercase().as_str() {
                "=" => ordering == Ordering::Equal,
                "!=" => ordering != Ordering::Equal,
                "<" => ordering == Ordering::Less,
                "<=" => ordering != Ordering::Greater,
                ">" => ordering == Ordering::Greater,
                ">=" => ordering != Ordering::Less,
                "LIKE" => match (&actual, &leaf.value) {
                    (Value::Text(text), Value::Text(pattern)) => like(text, pattern),
                    _ => panic!("LIKE on non-text value {actual:?}"),
                },
                _ => false,
            }
        }
        FilterExpr::Logical(logical) => {
            let mut children = logical.filters.iter().map(|child| matches(row, Some(child)));
            if logical.operator.eq_ignore_ascii_case("OR") && !logical.filters.is_empty() {
                children.any(|m| m)
            } else {
                children.all(|m| m)
            }
        }
    }
}

fn select<R: Fields + Clone>(rows: &[R], filter: Option<&FilterExpr>) -> Vec<R> {
    rows.iter().filter(|row| matches(*row, filter)).cloned().collect()
}

#[derive(Default)]
struct Tables {
    next_id: i64,
    users: Vec<User>,
    groups: Vec<Group>,
    permissions: Vec<Permission>,
    user_groups: Vec<UserGroup>,
    group_permissions: Vec<GroupPermission>,
}

impl Tables {
    fn id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// In-memory store with the same uniqueness rules as the SQL schema.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    /// Artificial latency added to every call.
    pub delay: Option<Duration>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    async fn pause(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn conflict(what: &str) -> StoreError {
        StoreError::Database(sqlx::Error::Protocol(format!("duplicate {}", what)))
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> Result<(), StoreError> {
        self.pause().await;
        Ok(())
    }

    async fn users(&self, filter: Option<&FilterExpr>) -> Result<Vec<User>, StoreError> {
        self.pause().await;
        Ok(select(&self.tables.lock().unwrap().users, filter))
    }

    async fn insert_user(
        &self,
        name: &str,
        password_hash: &str,
        is_admin: bool,
    ) -> Result<u64, StoreError> {
        self.pause().await;
        let mut tables = self.tables.lock().unwrap();
        if tables.users.iter().any(|u| u.name == name) {
            return Err(Self::conflict("user"));
        }
        let id = tables.id();
        tables.users.push(User {
            id,
            name: name.to_string(),
            password_hash: password_hash.to_string(),
            is_admin,
        });
        Ok(1)
    }

    async fn user_permissions(&self, username: &str) -> Result<Vec<Permission>, StoreError> {
        self.pause().await;
        let tables = self.tables.lock().unwrap();
        let Some(user) = tables.users.iter().find(|u| u.name == username) else {
            return Ok(Vec::new());
        };
        let groups: Vec<i64> = tables
            .user_groups
            .iter()
            .filter(|ug| ug.user_id == user.id)
            .map(|ug| ug.group_id)
            .collect();
        let mut permission_ids: Vec<i64> = tables
            .group_permissions
            .iter()
            .filter(|gp| groups.contains(&gp.group_id))
            .map(|gp| gp.permission_id)
            .collect();
        permission_ids.sort_unstable();
        permission_ids.dedup();
        Ok(tables
            .permissions
            .iter()
            .filter(|p| permission_ids.contains(&p.id))
            .cloned()
            .collect())
    }

    async fn groups(&self, filter: Option<&FilterExpr>) -> Result<Vec<Group>, StoreError> {
        self.pause().await;
        Ok(select(&self.tables.lock().unwrap().groups, filter))
    }

    async fn insert_group(&self, name: &str) -> Result<u64, StoreError> {
        self.pause().await;
        let mut tables = self.tables.lock().unwrap();
        if tables.groups.iter().any(|g| g.name == name) {
            return Err(Self::conflict("group"));
        }
        let id = tables.id();
        tables.groups.push(Group {
            id,
            name: name.to_string(),
        });
        Ok(1)
    }

    async fn permissions(
        &self,
        filter: Option<&FilterExpr>,
    ) -> Result<Vec<Permission>, StoreError> {
        self.pause().await;
        Ok(select(&self.tables.lock().unwrap().permissions, filter))
    }

    async fn insert_permission(
        &self,
        category: &str,
        resource: &str,
        action: &str,
    ) -> Result<u64, StoreError> {
        self.pause().await;
        let mut tables = self.tables.lock().unwrap();
        if tables
            .permissions
            .iter()
            .any(|p| p.category == category && p.resource == resource && p.action == action)
        {
            return Ok(0);
        }
        let id = tables.id();
        tables.permissions.push(Permission {
            id,
            category: category.to_string(),
            resource: resource.to_string(),
            action: action.to_string(),
        });
        Ok(1)
    }

    async fn user_groups(&self, filter: Option<&FilterExpr>) -> Result<Vec<UserGroup>, StoreError> {
        self.pause().await;
        Ok(select(&self.tables.lock().unwrap().user_groups, filter))
    }

    async fn insert_user_group(&self, user_id: i64, group_id: i64) -> Result<u64, StoreError> {
        self.pause().await;
        let mut tables = self.tables.lock().unwrap();
        let reference = UserGroup { user_id, group_id };
        if tables.user_groups.contains(&reference) {
            return Err(Self::conflict("user group reference"));
        }
        tables.user_groups.push(reference);
        Ok(1)
    }

    async fn group_permissions(
        &self,
        filter: Option<&FilterExpr>,
    ) -> Result<Vec<GroupPermission>, StoreError> {
        self.pause().await;
        Ok(select(&self.tables.lock().unwrap().group_permissions, filter))
    }

    async fn insert_group_permission(
        &self,
        group_id: i64,
        permission_id: i64,
    ) -> Result<u64, StoreError> {
        self.pause().await;
        let mut tables = self.tables.lock().unwrap();
        let reference = GroupPermission { group_id, permission_id };
        if tables.group_permissions.contains(&reference) {
            return Err(Self::conflict("group permission reference"));
        }
        tables.group_permissions.push(reference);
        Ok(1)
    }
}

/// Config tuned for tests: loopback port 0, generous limits, fast hashing.
pub fn test_config() -> NexusConfig {
    let mut config = NexusConfig::default();
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config.listener.shutdown_grace_secs = 2;
    config.rate_limit.global_rate = 1000.0;
    config.rate_limit.global_burst = 1000;
    config.rate_limit.client_rate = 1000.0;
    config.rate_limit.client_burst = 1000;
    config.security.password_hashing = fast_hashing();
    config
}

/// A store holding the seeded route permissions and an `admin` account.
pub async fn seeded_store() -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    seed_permissions(store.as_ref()).await.unwrap();
    let hash = hash_password(ADMIN_PASSWORD, &fast_hashing()).unwrap();
    store.insert_user("admin", &hash, true).await.unwrap();
    store
}

pub fn pipeline(config: &NexusConfig, store: Arc<MemoryStore>) -> Pipeline {
    Pipeline::new(config, store, &Span::none())
}

pub fn basic(user: &str, password: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{}:{}", user, password)))
}

/// Build a request as the listener would deliver it, with the caller address attached.
pub fn request(
    method: Method,
    path: &str,
    auth: Option<&str>,
    body: Option<serde_json::Value>,
    from: SocketAddr,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(path);
    if let Some(auth) = auth {
        builder = builder.header(header::AUTHORIZATION, auth);
    }
    let body = match body {
        Some(json) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };
    let mut request = builder.body(body).unwrap();
    request.extensions_mut().insert(ConnectInfo(from));
    request
}

pub fn client_addr(last_octet: u8) -> SocketAddr {
    SocketAddr::from(([10, 0, 0, last_octet], 40000))
}

pub async fn json<T: DeserializeOwned>(response: Response) -> T {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn body_text(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

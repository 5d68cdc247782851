//! Operation handlers behind the dispatcher.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::auth::{PermissionName, PermissionParseError};
use crate::http::response::{message, ApiError, ApiResult};
use crate::query::{FilterExpr, FilterPolicy, ValueKind};
use crate::security::{hash_password, HashingParams};
use crate::store::{expect_one, Store, User};

/// Fields and operators callers may use when searching users.
pub const USER_SEARCH_POLICY: FilterPolicy = FilterPolicy::new(&[
    ("id", ValueKind::Int),
    ("name", ValueKind::Text),
    ("is_admin", ValueKind::Bool),
]);

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub hashing: HashingParams,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SystemHealth {
    #[serde(rename = "databaseConnection")]
    pub database_connection: bool,
    pub version: String,
}

pub async fn health(State(state): State<AppState>) -> Json<SystemHealth> {
    let database_connection = match state.store.ping().await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(error = %e, "database ping failed");
            false
        }
    };

    Json(SystemHealth {
        database_connection,
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

#[derive(Deserialize)]
pub struct NewUser {
    pub name: String,
    pub password: String,
    #[serde(default)]
    pub is_admin: bool,
}

#[derive(Debug, Deserialize)]
pub struct NewGroup {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct UserGroupReference {
    pub username: String,
    pub group_name: String,
}

#[derive(Debug, Deserialize)]
pub struct GroupPermissionReference {
    pub group_name: String,
    pub permission: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct UserSearch {
    #[serde(default)]
    pub filter: Option<FilterExpr>,
}

/// A user as returned to callers, without its credential hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserView {
    pub id: i64,
    pub name: String,
    pub is_admin: bool,
}

impl From<User> for UserView {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            is_admin: user.is_admin,
        }
    }
}

fn require_name(field: &str, value: &str) -> ApiResult<()> {
    if value.trim().is_empty() {
        return Err(ApiError::MalformedInput(format!("{} must not be empty", field)));
    }
    Ok(())
}

fn check_inserted(rows: u64, what: &str) -> ApiResult<()> {
    if rows != 1 {
        return Err(ApiError::Internal(format!("inserting {} affected {} rows", what, rows)));
    }
    Ok(())
}

fn created() -> Response {
    message(StatusCode::OK, "entity created successfully")
}

pub async fn user_add(
    State(state): State<AppState>,
    body: Result<Json<NewUser>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(user) = body?;
    require_name("name", &user.name)?;
    require_name("password", &user.password)?;

    let existing = state.store.users(Some(&FilterExpr::eq("name", user.name.as_str()))).await?;
    if !existing.is_empty() {
        return Err(ApiError::Conflict("entity with the same name already exists".into()));
    }

    let hash = hash_password(&user.password, &state.hashing)?;
    let rows = state.store.insert_user(&user.name, &hash, user.is_admin).await?;
    check_inserted(rows, "user")?;

    tracing::info!(user = %user.name, admin = user.is_admin, "user added");
    Ok(created())
}

pub async fn user_search(
    State(state): State<AppState>,
    body: Result<Json<UserSearch>, JsonRejection>,
) -> ApiResult<Json<Vec<UserView>>> {
    let Json(search) = body?;
    if let Some(filter) = &search.filter {
        filter.check(&USER_SEARCH_POLICY)?;
    }

    let users = state.store.users(search.filter.as_ref()).await?;
    Ok(Json(users.into_iter().map(UserView::from).collect()))
}

pub async fn group_add(
    State(state): State<AppState>,
    body: Result<Json<NewGroup>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(group) = body?;
    require_name("name", &group.name)?;

    let existing = state.store.groups(Some(&FilterExpr::eq("name", group.name.as_str()))).await?;
    if !existing.is_empty() {
        return Err(ApiError::Conflict("entity with the same name already exists".into()));
    }

    let rows = state.store.insert_group(&group.name).await?;
    check_inserted(rows, "group")?;

    tracing::info!(group = %group.name, "group added");
    Ok(created())
}

pub async fn usergroup_add(
    State(state): State<AppState>,
    body: Result<Json<UserGroupReference>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(reference) = body?;

    let user = expect_one(
        state.store.users(Some(&FilterExpr::eq("name", reference.username.as_str()))).await?,
        "user",
    )?;
    let group = expect_one(
        state.store.groups(Some(&FilterExpr::eq("name", reference.group_name.as_str()))).await?,
        "group",
    )?;

    let membership = FilterExpr::all(vec![
        FilterExpr::eq("group_id", group.id),
        FilterExpr::eq("user_id", user.id),
    ]);
    if !state.store.user_groups(Some(&membership)).await?.is_empty() {
        return Err(ApiError::Conflict("user already in group".into()));
    }

    let rows = state.store.insert_user_group(user.id, group.id).await?;
    check_inserted(rows, "user group reference")?;

    tracing::info!(user = %user.name, group = %group.name, "user added to group");
    Ok(message(StatusCode::OK, "user group reference added"))
}

pub async fn grouppermission_add(
    State(state): State<AppState>,
    body: Result<Json<GroupPermissionReference>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(reference) = body?;
    let name: PermissionName = reference
        .permission
        .parse()
        .map_err(|e: PermissionParseError| ApiError::MalformedInput(e.to_string()))?;

    let group = expect_one(
        state.store.groups(Some(&FilterExpr::eq("name", reference.group_name.as_str()))).await?,
        "group",
    )?;

    let lookup = FilterExpr::all(vec![
        FilterExpr::eq("category", name.category.as_str()),
        FilterExpr::eq("resource", name.resource.as_str()),
        FilterExpr::eq("action", name.action.as_str()),
    ]);
    let permission = expect_one(state.store.permissions(Some(&lookup)).await?, "permission")?;

    let grant = FilterExpr::all(vec![
        FilterExpr::eq("group_id", group.id),
        FilterExpr::eq("permission_id", permission.id),
    ]);
    if !state.store.group_permissions(Some(&grant)).await?.is_empty() {
        return Err(ApiError::Conflict("permission already assigned to group".into()));
    }

    let rows = state.store.insert_group_permission(group.id, permission.id).await?;
    check_inserted(rows, "permission group reference")?;

    tracing::info!(group = %group.name, permission = %name, "permission granted to group");
    Ok(message(StatusCode::OK, "permission group reference added"))
}

/// Fallback for paths no route matches.
pub async fn not_found() -> impl IntoResponse {
    message(StatusCode::NOT_FOUND, "not found")
}

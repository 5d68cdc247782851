//! PostgreSQL implementation of [`Store`].

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgArguments, PgConnectOptions, PgPool, PgPoolOptions, PgRow, PgSslMode};
use sqlx::query::Query;
use sqlx::{Postgres, Row};

use crate::config::DatabaseConfig;
use crate::query::{build_where, FilterExpr, Value};
use crate::store::models::{
    TABLE_GROUPS, TABLE_GROUP_PERMISSIONS, TABLE_PERMISSIONS, TABLE_USERS, TABLE_USER_GROUPS,
};
use crate::store::{Group, GroupPermission, Permission, Store, StoreError, User, UserGroup};

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS users (
        id BIGSERIAL PRIMARY KEY,
        name TEXT NOT NULL UNIQUE,
        password_hash TEXT NOT NULL,
        is_admin BOOLEAN NOT NULL DEFAULT FALSE
    )",
    "CREATE TABLE IF NOT EXISTS groups (
        id BIGSERIAL PRIMARY KEY,
        name TEXT NOT NULL UNIQUE
    )",
    "CREATE TABLE IF NOT EXISTS permissions (
        id BIGSERIAL PRIMARY KEY,
        category TEXT NOT NULL,
        resource TEXT NOT NULL,
        action TEXT NOT NULL,
        UNIQUE (category, resource, action)
    )",
    "CREATE TABLE IF NOT EXISTS user_groups (
        user_id BIGINT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        group_id BIGINT NOT NULL REFERENCES groups(id) ON DELETE CASCADE,
        PRIMARY KEY (user_id, group_id)
    )",
    "CREATE TABLE IF NOT EXISTS group_permissions (
        group_id BIGINT NOT NULL REFERENCES groups(id) ON DELETE CASCADE,
        permission_id BIGINT NOT NULL REFERENCES permissions(id) ON DELETE CASCADE,
        PRIMARY KEY (group_id, permission_id)
    )",
];

/// Store backed by a PostgreSQL connection pool.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Open a pool using `config`. Connections are established lazily.
    pub fn connect_lazy(config: &DatabaseConfig) -> Result<Self, StoreError> {
        let ssl_mode = PgSslMode::from_str(&config.ssl_mode)?;
        let options = PgConnectOptions::new()
            .host(&config.address)
            .port(config.port)
            .username(&config.user)
            .password(&config.password)
            .database(&config.name)
            .ssl_mode(ssl_mode);

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
            .connect_lazy_with(options);

        Ok(Self { pool })
    }

    /// Create the schema if it does not exist yet.
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        for statement in SCHEMA {
            sqlx::query(*statement).execute(&self.pool).await?;
        }
        tracing::info!("database schema ensured");
        Ok(())
    }

    /// Close all pooled connections.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn select(
        &self,
        base: &str,
        filter: Option<&FilterExpr>,
    ) -> Result<Vec<PgRow>, StoreError> {
        let (clause, args) = build_where(filter)?;
        let sql = format!("{}{}", base, clause);

        tracing::debug!(query = %sql, args = ?args, "query database");

        let query = args.into_iter().fold(sqlx::query(&sql), bind);
        Ok(query.fetch_all(&self.pool).await?)
    }

    async fn insert(&self, sql: &str, args: Vec<Value>) -> Result<u64, StoreError> {
        tracing::debug!(query = %sql, args = ?args, "insert into database");

        let query = args.into_iter().fold(sqlx::query(sql), bind);
        Ok(query.execute(&self.pool).await?.rows_affected())
    }
}

fn bind(query: Query<'_, Postgres, PgArguments>, value: Value) -> Query<'_, Postgres, PgArguments> {
    match value {
        Value::Bool(v) => query.bind(v),
        Value::Int(v) => query.bind(v),
        Value::Text(v) => query.bind(v),
    }
}

fn user_from_row(row: &PgRow) -> Result<User, sqlx::Error> {
    Ok(User {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        password_hash: row.try_get("password_hash")?,
        is_admin: row.try_get("is_admin")?,
    })
}

fn group_from_row(row: &PgRow) -> Result<Group, sqlx::Error> {
    Ok(Group {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
    })
}

fn user_group_from_row(row: &PgRow) -> Result<UserGroup, sqlx::Error> {
    Ok(UserGroup {
        user_id: row.try_get("user_id")?,
        group_id: row.try_get("group_id")?,
    })
}

fn group_permission_from_row(row: &PgRow) -> Result<GroupPermission, sqlx::Error> {
    Ok(GroupPermission {
        group_id: row.try_get("group_id")?,
        permission_id: row.try_get("permission_id")?,
    })
}

fn permission_from_row(row: &PgRow) -> Result<Permission, sqlx::Error> {
    Ok(Permission {
        id: row.try_get("id")?,
        category: row.try_get("category")?,
        resource: row.try_get("resource")?,
        action: row.try_get("action")?,
    })
}

#[async_trait]
impl Store for PgStore {
    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn users(&self, filter: Option<&FilterExpr>) -> Result<Vec<User>, StoreError> {
        let base = format!("SELECT id, name, password_hash, is_admin FROM {}", TABLE_USERS);
        let rows = self.select(&base, filter).await?;
        Ok(rows.iter().map(user_from_row).collect::<Result<_, _>>()?)
    }

    async fn insert_user(
        &self,
        name: &str,
        password_hash: &str,
        is_admin: bool,
    ) -> Result<u64, StoreError> {
        let sql = format!(
            "INSERT INTO {} (name, password_hash, is_admin) VALUES ($1, $2, $3)",
            TABLE_USERS
        );
        self.insert(&sql, vec![name.into(), password_hash.into(), is_admin.into()]).await
    }

    async fn user_permissions(&self, username: &str) -> Result<Vec<Permission>, StoreError> {
        let base = format!(
            "SELECT DISTINCT p.id, p.category, p.resource, p.action \
             FROM {} u \
             JOIN {} ug ON ug.user_id = u.id \
             JOIN {} gp ON gp.group_id = ug.group_id \
             JOIN {} p ON p.id = gp.permission_id",
            TABLE_USERS, TABLE_USER_GROUPS, TABLE_GROUP_PERMISSIONS, TABLE_PERMISSIONS,
        );
        let filter = FilterExpr::eq("u.name", username);
        let rows = self.select(&base, Some(&filter)).await?;
        Ok(rows.iter().map(permission_from_row).collect::<Result<_, _>>()?)
    }

    async fn groups(&self, filter: Option<&FilterExpr>) -> Result<Vec<Group>, StoreError> {
        let base = format!("SELECT id, name FROM {}", TABLE_GROUPS);
        let rows = self.select(&base, filter).await?;
        Ok(rows.iter().map(group_from_row).collect::<Result<_, _>>()?)
    }

    async fn insert_group(&self, name: &str) -> Result<u64, StoreError> {
        let sql = format!("INSERT INTO {} (name) VALUES ($1)", TABLE_GROUPS);
        self.insert(&sql, vec![name.into()]).await
    }

    async fn permissions(
        &self,
        filter: Option<&FilterExpr>,
    ) -> Result<Vec<Permission>, StoreError> {
        let base = format!("SELECT id, category, resource, action FROM {}", TABLE_PERMISSIONS);
        let rows = self.select(&base, filter).await?;
        Ok(rows.iter().map(permission_from_row).collect::<Result<_, _>>()?)
    }

    async fn insert_permission(
        &self,
        category: &str,
        resource: &str,
        action: &str,
    ) -> Result<u64, StoreError> {
        let sql = format!(
            "INSERT INTO {} (category, resource, action) VALUES ($1, $2, $3) \
             ON CONFLICT DO NOTHING",
            TABLE_PERMISSIONS
        );
        self.insert(&sql, vec![category.into(), resource.into(), action.into()]).await
    }

    async fn user_groups(&self, filter: Option<&FilterExpr>) -> Result<Vec<UserGroup>, StoreError> {
        let base = format!("SELECT user_id, group_id FROM {}", TABLE_USER_GROUPS);
        let rows = self.select(&base, filter).await?;
        Ok(rows.iter().map(user_group_from_row).collect::<Result<_, _>>()?)
    }

    async fn insert_user_group(&self, user_id: i64, group_id: i64) -> Result<u64, StoreError> {
        let sql = format!("INSERT INTO {} (user_id, group_id) VALUES ($1, $2)", TABLE_USER_GROUPS);
        self.insert(&sql, vec![user_id.into(), group_id.into()]).await
    }

    async fn group_permissions(
        &self,
        filter: Option<&FilterExpr>,
    ) -> Result<Vec<GroupPermission>, StoreError> {
        let base = format!("SELECT group_id, permission_id FROM {}", TABLE_GROUP_PERMISSIONS);
        let rows = self.select(&base, filter).await?;
        Ok(rows.iter().map(group_permission_from_row).collect::<Result<_, _>>()?)
    }

    async fn insert_group_permission(
        &self,
        group_id: i64,
        permission_id: i64,
    ) -> Result<u64, StoreError> {
        let sql = format!(
            "INSERT INTO {} (group_id, permission_id) VALUES ($1, $2)",
            TABLE_GROUP_PERMISSIONS
        );
        self.insert(&sql, vec![group_id.into(), permission_id.into()]).await
    }
}

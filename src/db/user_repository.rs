//! User and permission repository

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::db::DbPool;
use crate::models::{Permission, UserRecord};
use crate::services::auth::PasswordHasher;
use crate::services::stores::{IdentityStore, PermissionStore};

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: i64,
    name: String,
    password_hash: String,
}

impl From<UserRow> for UserRecord {
    fn from(row: UserRow) -> Self {
        UserRecord {
            id: row.id,
            name: row.name,
            password_hash: row.password_hash,
        }
    }
}

/// Direct access to the `users` and `user_permissions` tables
#[derive(Debug, Clone)]
pub struct UserRepository {
    pool: DbPool,
}

impl UserRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn get_by_name(&self, name: &str) -> Result<Option<UserRecord>> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, name, password_hash FROM users WHERE name = ?",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to get user by name")?;

        Ok(row.map(Into::into))
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<UserRecord>> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, name, password_hash FROM users WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to get user by id")?;

        Ok(row.map(Into::into))
    }

    /// Insert a user with an already-hashed password
    pub async fn create(&self, name: &str, password_hash: &str) -> Result<UserRecord> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            INSERT INTO users (name, password_hash)
            VALUES (?, ?)
            RETURNING id, name, password_hash
            "#,
        )
        .bind(name)
        .bind(password_hash)
        .fetch_one(&self.pool)
        .await
        .context("Failed to create user")?;

        Ok(row.into())
    }

    pub async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await
            .context("Failed to count users")?;
        Ok(count)
    }

    /// Grant a permission; idempotent
    pub async fn grant(&self, user_id: i64, permission: Permission) -> Result<()> {
        sqlx::query(
            "INSERT OR IGNORE INTO user_permissions (user_id, permission_id) VALUES (?, ?)",
        )
        .bind(user_id)
        .bind(permission.id())
        .execute(&self.pool)
        .await
        .context("Failed to grant permission")?;
        Ok(())
    }

    pub async fn revoke(&self, user_id: i64, permission: Permission) -> Result<bool> {
        let result =
            sqlx::query("DELETE FROM user_permissions WHERE user_id = ? AND permission_id = ?")
                .bind(user_id)
                .bind(permission.id())
                .execute(&self.pool)
                .await
                .context("Failed to revoke permission")?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn has_grant(&self, user_id: i64, permission: Permission) -> Result<bool> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM user_permissions WHERE user_id = ? AND permission_id = ?",
        )
        .bind(user_id)
        .bind(permission.id())
        .fetch_one(&self.pool)
        .await
        .context("Failed to check permission")?;

        Ok(count > 0)
    }
}

/// [`IdentityStore`] backed by SQLite
#[derive(Debug, Clone)]
pub struct SqliteIdentityStore {
    repo: UserRepository,
    hasher: Arc<PasswordHasher>,
}

impl SqliteIdentityStore {
    pub fn new(pool: DbPool, hasher: Arc<PasswordHasher>) -> Self {
        Self {
            repo: UserRepository::new(pool),
            hasher,
        }
    }
}

#[async_trait]
impl IdentityStore for SqliteIdentityStore {
    async fn find_by_credentials(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Option<UserRecord>> {
        let record = self.repo.get_by_name(username).await?;

        let stored_hash = record.as_ref().map(|r| r.password_hash.clone());
        if self
            .hasher
            .verify_password_blocking(password, stored_hash)
            .await?
        {
            Ok(record)
        } else {
            Ok(None)
        }
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<UserRecord>> {
        self.repo.get_by_id(id).await
    }
}

/// [`PermissionStore`] backed by SQLite
#[derive(Debug, Clone)]
pub struct SqlitePermissionStore {
    repo: UserRepository,
}

impl SqlitePermissionStore {
    pub fn new(pool: DbPool) -> Self {
        Self {
            repo: UserRepository::new(pool),
        }
    }
}

#[async_trait]
impl PermissionStore for SqlitePermissionStore {
    async fn has_grant(&self, user_id: i64, permission: Permission) -> Result<bool> {
        self.repo.has_grant(user_id, permission).await
    }
}

//! Database layer
//!
//! SQLite storage for:
//! - User accounts and password hashes
//! - Permission grants

pub mod user_repository;

use std::time::Duration;

use anyhow::Result;
use sqlx::{Pool, Sqlite};

use crate::config::DatabaseConfig;

pub use user_repository::{SqliteIdentityStore, SqlitePermissionStore, UserRepository};

/// Database connection pool type
pub type DbPool = Pool<Sqlite>;

/// Initialize the database connection pool
pub async fn init_pool(config: &DatabaseConfig) -> Result<DbPool> {
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
        .connect(&config.url)
        .await?;

    // Run migrations
    sqlx::migrate!("./migrations").run(&pool).await?;

    Ok(pool)
}

//! Identity and permission stores
//!
//! The pipeline depends on these traits only. The in-memory implementations
//! back tests and single-process deployments; [`crate::db`] provides the
//! SQLite-backed ones.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use anyhow::{bail, Result};
use async_trait::async_trait;

use crate::models::{Permission, UserRecord};
use crate::services::auth::PasswordHasher;

/// Read access to user records
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Match a username/password pair
    ///
    /// Unknown users and wrong passwords both yield `Ok(None)` after roughly
    /// the same amount of work.
    async fn find_by_credentials(&self, username: &str, password: &str)
        -> Result<Option<UserRecord>>;

    async fn find_by_id(&self, id: i64) -> Result<Option<UserRecord>>;
}

/// Read access to (user, permission) grants
#[async_trait]
pub trait PermissionStore: Send + Sync {
    async fn has_grant(&self, user_id: i64, permission: Permission) -> Result<bool>;
}

/// Identity store held in process memory
#[derive(Debug)]
pub struct InMemoryIdentityStore {
    users: RwLock<HashMap<String, UserRecord>>,
    hasher: Arc<PasswordHasher>,
}

impl InMemoryIdentityStore {
    pub fn new(hasher: Arc<PasswordHasher>) -> Self {
        Self {
            users: RwLock::new(HashMap::new()),
            hasher,
        }
    }

    /// Register a user, hashing the plaintext password
    pub fn add_user(&self, id: i64, name: &str, password: &str) -> Result<UserRecord> {
        let password_hash = self.hasher.hash_password(password)?;
        let record = UserRecord {
            id,
            name: name.to_string(),
            password_hash,
        };

        let mut users = self
            .users
            .write()
            .map_err(|_| anyhow::anyhow!("identity store lock poisoned"))?;
        if users.contains_key(name) || users.values().any(|u| u.id == id) {
            bail!("User {} (id {}) already exists", name, id);
        }
        users.insert(name.to_string(), record.clone());
        Ok(record)
    }

    pub fn len(&self) -> usize {
        self.users.read().map(|u| u.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl IdentityStore for InMemoryIdentityStore {
    async fn find_by_credentials(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Option<UserRecord>> {
        let record = {
            let users = self
                .users
                .read()
                .map_err(|_| anyhow::anyhow!("identity store lock poisoned"))?;
            users.get(username).cloned()
        };

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
        let users = self
            .users
            .read()
            .map_err(|_| anyhow::anyhow!("identity store lock poisoned"))?;
        Ok(users.values().find(|u| u.id == id).cloned())
    }
}

/// Permission grants held in process memory
#[derive(Debug, Default)]
pub struct InMemoryPermissionStore {
    grants: RwLock<HashSet<(i64, Permission)>>,
}

impl InMemoryPermissionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Grant a permission; returns `false` if it was already held
    pub fn grant(&self, user_id: i64, permission: Permission) -> bool {
        match self.grants.write() {
            Ok(mut grants) => grants.insert((user_id, permission)),
            Err(poisoned) => poisoned.into_inner().insert((user_id, permission)),
        }
    }

    /// Revoke a permission; returns `false` if it was not held
    pub fn revoke(&self, user_id: i64, permission: Permission) -> bool {
        match self.grants.write() {
            Ok(mut grants) => grants.remove(&(user_id, permission)),
            Err(poisoned) => poisoned.into_inner().remove(&(user_id, permission)),
        }
    }
}

#[async_trait]
impl PermissionStore for InMemoryPermissionStore {
    async fn has_grant(&self, user_id: i64, permission: Permission) -> Result<bool> {
        let grants = self
            .grants
            .read()
            .map_err(|_| anyhow::anyhow!("permission store lock poisoned"))?;
        Ok(grants.contains(&(user_id, permission)))
    }
}

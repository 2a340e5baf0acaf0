//! Authentication service
//!
//! Provides password hashing with Argon2 and the credential validation
//! capability used by the Basic scheme.

use std::sync::Arc;

use anyhow::Result;
use argon2::{
    password_hash::{PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use async_trait::async_trait;
use rand::rngs::OsRng;
use tracing::{debug, warn};

use crate::models::Identity;
use crate::services::stores::IdentityStore;
use crate::utils::Clock;

/// OWASP-recommended Argon2id memory cost, in KiB
pub const DEFAULT_MEMORY_KIB: u32 = 19 * 1024;

/// OWASP-recommended Argon2id passes
pub const DEFAULT_ITERATIONS: u32 = 2;

/// Argon2id password hashing
///
/// Holds a hash of a throwaway password computed with the same parameters,
/// so a lookup for an unknown user still pays for one verification.
#[derive(Clone)]
pub struct PasswordHasher {
    argon2: Argon2<'static>,
    dummy_hash: String,
}

impl PasswordHasher {
    /// Create a hasher with explicit cost parameters
    ///
    /// `memory_kib` and `iterations` follow the Argon2 `m_cost`/`t_cost`
    /// meaning; parallelism is fixed at 1.
    pub fn new(memory_kib: u32, iterations: u32) -> Result<Self> {
        let params = Params::new(memory_kib, iterations, 1, None)
            .map_err(|e| anyhow::anyhow!("Invalid Argon2 parameters: {}", e))?;
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
        let dummy_hash = hash_with(&argon2, "gatekeeper-timing-equaliser")?;
        Ok(Self { argon2, dummy_hash })
    }

    /// Hash a password using Argon2id
    pub fn hash_password(&self, password: &str) -> Result<String> {
        hash_with(&self.argon2, password)
    }

    /// Verify a password against a stored hash
    ///
    /// `None` (no such user) runs a verification against the dummy hash and
    /// returns `false`. Digest comparison inside `argon2` is constant-time.
    pub fn verify_password(&self, password: &str, stored_hash: Option<&str>) -> bool {
        let (hash, known) = match stored_hash {
            Some(hash) => (hash, true),
            None => (self.dummy_hash.as_str(), false),
        };

        let parsed = match PasswordHash::new(hash) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(error = %e, "Stored password hash is not a valid PHC string");
                return false;
            }
        };

        let matches = self
            .argon2
            .verify_password(password.as_bytes(), &parsed)
            .is_ok();

        matches && known
    }

    /// [`PasswordHasher::verify_password`] on the blocking thread pool
    ///
    /// Argon2 is memory- and CPU-heavy, so request handlers must not run it
    /// on a runtime worker.
    pub async fn verify_password_blocking(
        self: &Arc<Self>,
        password: &str,
        stored_hash: Option<String>,
    ) -> Result<bool> {
        let hasher = Arc::clone(self);
        let password = password.to_string();
        tokio::task::spawn_blocking(move || {
            hasher.verify_password(&password, stored_hash.as_deref())
        })
        .await
        .map_err(|e| anyhow::anyhow!("Password verification task failed: {}", e))
    }
}

impl std::fmt::Debug for PasswordHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordHasher")
            .field("params", self.argon2.params())
            .finish()
    }
}

fn hash_with(argon2: &Argon2<'_>, password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let password_hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))?
        .to_string();
    Ok(password_hash)
}

/// Authenticates a username/password pair
///
/// `Ok(None)` is a non-match; `Err` means the backing store could not answer.
#[async_trait]
pub trait CredentialValidator: Send + Sync {
    async fn validate(&self, username: &str, password: &str) -> Result<Option<Identity>>;
}

/// Credential validation against an [`IdentityStore`]
#[derive(Clone)]
pub struct StoreCredentialValidator {
    store: Arc<dyn IdentityStore>,
    clock: Arc<dyn Clock>,
}

impl StoreCredentialValidator {
    pub fn new(store: Arc<dyn IdentityStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }
}

#[async_trait]
impl CredentialValidator for StoreCredentialValidator {
    async fn validate(&self, username: &str, password: &str) -> Result<Option<Identity>> {
        let record = self.store.find_by_credentials(username, password).await?;

        match record {
            Some(record) => {
                debug!(subject = record.id, "Credentials accepted");
                Ok(Some(record.to_identity(self.clock.now())))
            }
            None => Ok(None),
        }
    }
}

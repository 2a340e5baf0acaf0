//! Gatekeeper Library
//!
//! Request gatekeeping for an HTTP API: Basic and Bearer authentication,
//! HS256 token issuance, per-endpoint permission checks and per-client rate
//! limiting, composed into one timed middleware pipeline.

use std::sync::Arc;

pub mod api;
pub mod config;
pub mod db;
pub mod middleware;
pub mod models;
pub mod services;
pub mod utils;

pub use config::{AppConfig, ConfigError};
pub use db::DbPool;
pub use middleware::{Gatekeeper, RateLimiter};

use services::{
    CredentialValidator, IdentityStore, PermissionStore, ProductCatalogue,
    StoreCredentialValidator, TokenIssuer, TokenVerifier,
};
use utils::Clock;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<AppConfig>,
    pub identities: Arc<dyn IdentityStore>,
    pub permissions: Arc<dyn PermissionStore>,
    /// Basic-scheme credential check, defaults to the identity store
    pub credentials: Arc<dyn CredentialValidator>,
    pub token_issuer: TokenIssuer,
    pub token_verifier: TokenVerifier,
    pub products: Arc<ProductCatalogue>,
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    /// Build the state, validating the configuration first
    pub fn new(
        config: AppConfig,
        identities: Arc<dyn IdentityStore>,
        permissions: Arc<dyn PermissionStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let signing = Arc::new(config.auth.signing_config()?);
        let token_issuer =
            TokenIssuer::new(signing.clone(), config.auth.token_lifetime(), clock.clone());
        let token_verifier = TokenVerifier::new(signing, clock.clone());
        let credentials: Arc<dyn CredentialValidator> = Arc::new(StoreCredentialValidator::new(
            identities.clone(),
            clock.clone(),
        ));

        Ok(Self {
            config: Arc::new(config),
            identities,
            permissions,
            credentials,
            token_issuer,
            token_verifier,
            products: Arc::new(ProductCatalogue::new()),
            clock,
        })
    }

    /// Replace the credential validator
    pub fn with_credential_validator(mut self, validator: Arc<dyn CredentialValidator>) -> Self {
        self.credentials = validator;
        self
    }

    /// A rate limiter configured from this state's settings
    pub fn rate_limiter(&self) -> RateLimiter {
        RateLimiter::new(self.config.rate_limit.clone(), self.clock.clone())
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .field("token_issuer", &self.token_issuer)
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}

//! Business logic services

pub mod auth;
pub mod products;
pub mod stores;
pub mod token;

pub use auth::{CredentialValidator, PasswordHasher, StoreCredentialValidator};
pub use products::ProductCatalogue;
pub use stores::{IdentityStore, InMemoryIdentityStore, InMemoryPermissionStore, PermissionStore};
pub use token::{AccessToken, SigningConfig, TokenIssuer, TokenRejection, TokenVerifier};

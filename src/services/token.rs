//! Bearer token issuance and verification
//!
//! Tokens are HMAC-SHA256 signed JWTs. The signing configuration is built
//! once at startup and shared read-only; it cannot exist with a key shorter
//! than [`MIN_SIGNING_KEY_LEN`].

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::config::ConfigError;
use crate::models::Identity;
use crate::utils::Clock;

/// Shortest accepted signing key, in bytes
pub const MIN_SIGNING_KEY_LEN: usize = 16;

/// Default token lifetime
pub const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 3600;

/// Longest accepted token lifetime, 30 days
pub const MAX_TOKEN_LIFETIME_SECS: i64 = 30 * 24 * 3600;

/// Supported signing algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SigningAlgorithm {
    #[default]
    #[serde(rename = "HS256")]
    HmacSha256,
}

impl SigningAlgorithm {
    fn jwt_algorithm(self) -> Algorithm {
        match self {
            SigningAlgorithm::HmacSha256 => Algorithm::HS256,
        }
    }
}

/// Process-wide signing configuration
#[derive(Clone)]
pub struct SigningConfig {
    issuer: String,
    audience: String,
    signing_key: Vec<u8>,
    algorithm: SigningAlgorithm,
}

impl SigningConfig {
    /// Validate and build a signing configuration
    pub fn new(
        issuer: impl Into<String>,
        audience: impl Into<String>,
        signing_key: impl Into<Vec<u8>>,
    ) -> Result<Self, ConfigError> {
        let issuer = issuer.into();
        let audience = audience.into();
        let signing_key = signing_key.into();

        if signing_key.len() < MIN_SIGNING_KEY_LEN {
            return Err(ConfigError::invalid(format!(
                "Signing key must be at least {} bytes, got {}",
                MIN_SIGNING_KEY_LEN,
                signing_key.len()
            )));
        }
        if issuer.trim().is_empty() {
            return Err(ConfigError::invalid("Token issuer cannot be empty"));
        }
        if audience.trim().is_empty() {
            return Err(ConfigError::invalid("Token audience cannot be empty"));
        }

        Ok(Self {
            issuer,
            audience,
            signing_key,
            algorithm: SigningAlgorithm::HmacSha256,
        })
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub fn audience(&self) -> &str {
        &self.audience
    }

    pub fn algorithm(&self) -> SigningAlgorithm {
        self.algorithm
    }
}

impl std::fmt::Debug for SigningConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningConfig")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("algorithm", &self.algorithm)
            .field("signing_key", &format_args!("<{} bytes>", self.signing_key.len()))
            .finish()
    }
}

/// Claim set carried inside an access token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject id, stringified
    pub sub: String,
    /// Display name
    pub name: String,
    pub iss: String,
    pub aud: String,
    /// Issued at (unix seconds)
    pub iat: i64,
    /// Expiry (unix seconds)
    pub exp: i64,
    /// Token id
    pub jti: String,
}

impl Claims {
    fn into_identity(self) -> Option<Identity> {
        let subject_id = self.sub.parse::<i64>().ok()?;
        let issued_at = Utc.timestamp_opt(self.iat, 0).single()?;
        Some(Identity::new(subject_id, self.name, issued_at))
    }
}

/// A freshly signed token
#[derive(Debug, Clone)]
pub struct AccessToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Builds and signs access tokens
#[derive(Clone)]
pub struct TokenIssuer {
    config: Arc<SigningConfig>,
    encoding_key: EncodingKey,
    lifetime: Duration,
    clock: Arc<dyn Clock>,
}

impl TokenIssuer {
    /// The lifetime is clamped to [`MAX_TOKEN_LIFETIME_SECS`]
    pub fn new(config: Arc<SigningConfig>, lifetime: Duration, clock: Arc<dyn Clock>) -> Self {
        let encoding_key = EncodingKey::from_secret(&config.signing_key);
        Self {
            config,
            encoding_key,
            lifetime: lifetime.min(Duration::seconds(MAX_TOKEN_LIFETIME_SECS)),
            clock,
        }
    }

    /// Issue a token for the identity, valid for the configured lifetime
    pub fn issue(&self, identity: &Identity) -> Result<AccessToken, jsonwebtoken::errors::Error> {
        let now = self.clock.now();
        let expires_at = now + self.lifetime;

        let claims = Claims {
            sub: identity.subject_id().to_string(),
            name: identity.display_name().to_string(),
            iss: self.config.issuer.clone(),
            aud: self.config.audience.clone(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        let header = Header::new(self.config.algorithm.jwt_algorithm());
        let token = encode(&header, &claims, &self.encoding_key)?;

        debug!(
            subject = identity.subject_id(),
            expires_at = %expires_at,
            "Issued access token"
        );

        Ok(AccessToken { token, expires_at })
    }

    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }
}

impl std::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("config", &self.config)
            .field("lifetime", &self.lifetime)
            .finish()
    }
}

/// Reasons a token was refused
///
/// Only logged server-side; callers see a single `InvalidToken`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenRejection {
    Signature,
    Issuer,
    Audience,
    Expired,
    Malformed,
}

/// Validates bearer tokens and reconstructs the identity they carry
#[derive(Clone)]
pub struct TokenVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
    clock: Arc<dyn Clock>,
}

impl TokenVerifier {
    pub fn new(config: Arc<SigningConfig>, clock: Arc<dyn Clock>) -> Self {
        let decoding_key = DecodingKey::from_secret(&config.signing_key);

        let mut validation = Validation::new(config.algorithm.jwt_algorithm());
        validation.set_issuer(&[config.issuer.as_str()]);
        validation.set_audience(&[config.audience.as_str()]);
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);
        // Expiry is checked against the injected clock below
        validation.validate_exp = false;
        validation.validate_nbf = false;

        Self {
            decoding_key,
            validation,
            clock,
        }
    }

    /// Check signature, issuer, audience and expiry, in that order
    pub fn verify(&self, token: &str) -> Result<Identity, TokenRejection> {
        use jsonwebtoken::errors::ErrorKind;

        let data = decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(|e| {
            match e.kind() {
                ErrorKind::InvalidSignature => TokenRejection::Signature,
                ErrorKind::InvalidIssuer => TokenRejection::Issuer,
                ErrorKind::InvalidAudience => TokenRejection::Audience,
                _ => TokenRejection::Malformed,
            }
        })?;

        if self.clock.now().timestamp() >= data.claims.exp {
            return Err(TokenRejection::Expired);
        }

        data.claims.into_identity().ok_or(TokenRejection::Malformed)
    }
}

impl std::fmt::Debug for TokenVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenVerifier")
            .field("issuer", &self.validation.iss)
            .field("audience", &self.validation.aud)
            .finish()
    }
}

//! Authentication stage
//!
//! Resolves the `Authorization` header into an [`Identity`]. Two schemes are
//! accepted: `Basic` (checked against a [`CredentialValidator`]) and `Bearer`
//! (checked by the [`TokenVerifier`]).

use std::sync::Arc;

use axum::{
    extract::FromRequestParts,
    http::{
        header::{AUTHORIZATION, WWW_AUTHENTICATE},
        request::Parts,
        HeaderMap, HeaderValue, StatusCode,
    },
    response::{IntoResponse, Response},
    Json,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use thiserror::Error;
use tracing::{debug, error};

use crate::{
    models::Identity,
    services::{auth::CredentialValidator, token::TokenVerifier},
    utils::error::ErrorResponse,
};

/// Credentials carried by the `Authorization` header
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    Basic { username: String, password: String },
    Bearer(String),
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credentials::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
            Credentials::Bearer(_) => f.write_str("Bearer(<redacted>)"),
        }
    }
}

/// Authentication failures
///
/// The caller only ever learns the variant, never which token check failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AuthFailure {
    #[error("Authentication required")]
    MissingCredentials,
    #[error("Malformed credentials")]
    MalformedCredentials,
    #[error("Invalid username or password")]
    InvalidCredentials,
    #[error("Invalid or expired token")]
    InvalidToken,
    #[error("Authentication service unavailable")]
    StoreUnavailable,
}

impl AuthFailure {
    fn error_type(&self) -> &'static str {
        match self {
            AuthFailure::MissingCredentials => "missing_credentials",
            AuthFailure::MalformedCredentials => "malformed_credentials",
            AuthFailure::InvalidCredentials => "invalid_credentials",
            AuthFailure::InvalidToken => "invalid_token",
            AuthFailure::StoreUnavailable => "service_unavailable",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AuthFailure::StoreUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::UNAUTHORIZED,
        }
    }
}

impl IntoResponse for AuthFailure {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorResponse::new(self.error_type(), self.to_string());
        let mut response = (status, Json(body)).into_response();

        if status == StatusCode::UNAUTHORIZED {
            response.headers_mut().insert(
                WWW_AUTHENTICATE,
                HeaderValue::from_static("Basic realm=\"gatekeeper\", Bearer"),
            );
        }
        response
    }
}

/// Parse the `Authorization` header
pub fn parse_authorization(headers: &HeaderMap) -> Result<Credentials, AuthFailure> {
    let value = headers
        .get(AUTHORIZATION)
        .ok_or(AuthFailure::MissingCredentials)?
        .to_str()
        .map_err(|_| AuthFailure::MalformedCredentials)?
        .trim();

    if value.is_empty() {
        return Err(AuthFailure::MissingCredentials);
    }

    let (scheme, payload) = value
        .split_once(' ')
        .ok_or(AuthFailure::MalformedCredentials)?;
    let payload = payload.trim();

    if scheme.eq_ignore_ascii_case("basic") {
        parse_basic(payload)
    } else if scheme.eq_ignore_ascii_case("bearer") {
        if payload.is_empty() {
            return Err(AuthFailure::MalformedCredentials);
        }
        Ok(Credentials::Bearer(payload.to_string()))
    } else {
        Err(AuthFailure::MalformedCredentials)
    }
}

/// Decode `base64(username:password)`
///
/// Only the first colon separates the fields; the password may contain more.
fn parse_basic(payload: &str) -> Result<Credentials, AuthFailure> {
    let decoded = STANDARD
        .decode(payload)
        .map_err(|_| AuthFailure::MalformedCredentials)?;
    let decoded = String::from_utf8(decoded).map_err(|_| AuthFailure::MalformedCredentials)?;

    let (username, password) = decoded
        .split_once(':')
        .ok_or(AuthFailure::MalformedCredentials)?;

    if username.is_empty() {
        return Err(AuthFailure::MalformedCredentials);
    }

    Ok(Credentials::Basic {
        username: username.to_string(),
        password: password.to_string(),
    })
}

/// Turns request headers into an identity
#[derive(Clone)]
pub struct Authenticator {
    validator: Arc<dyn CredentialValidator>,
    verifier: TokenVerifier,
}

impl Authenticator {
    pub fn new(validator: Arc<dyn CredentialValidator>, verifier: TokenVerifier) -> Self {
        Self {
            validator,
            verifier,
        }
    }

    /// Authenticate a request from its headers
    pub async fn authenticate(&self, headers: &HeaderMap) -> Result<Identity, AuthFailure> {
        match parse_authorization(headers)? {
            Credentials::Basic { username, password } => {
                match self.validator.validate(&username, &password).await {
                    Ok(Some(identity)) => Ok(identity),
                    Ok(None) => {
                        debug!(username = %username, "Basic credentials rejected");
                        Err(AuthFailure::InvalidCredentials)
                    }
                    Err(e) => {
                        error!(error = %e, "Credential validation failed");
                        Err(AuthFailure::StoreUnavailable)
                    }
                }
            }
            Credentials::Bearer(token) => self.verifier.verify(&token).map_err(|reason| {
                debug!(reason = ?reason, "Bearer token rejected");
                AuthFailure::InvalidToken
            }),
        }
    }
}

impl std::fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authenticator")
            .field("verifier", &self.verifier)
            .finish_non_exhaustive()
    }
}

/// Extractor for the identity the pipeline attached to the request
impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = AuthFailure;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Identity>()
            .cloned()
            .ok_or(AuthFailure::MissingCredentials)
    }
}

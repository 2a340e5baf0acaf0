//! Token issuance and current-user endpoints

use axum::{extract::State, Json};
use tracing::{error, info};
use validator::Validate;

use crate::{
    models::{CurrentUser, Identity, TokenRequest, TokenResponse},
    utils::{AppError, AppJson, AppResult},
    AppState,
};

/// Exchange a username and password for a bearer token
///
/// POST /api/users/auth
pub(super) async fn issue_token(
    State(state): State<AppState>,
    AppJson(payload): AppJson<TokenRequest>,
) -> AppResult<Json<TokenResponse>> {
    payload.validate()?;

    let identity = state
        .credentials
        .validate(&payload.user_name, &payload.password)
        .await
        .map_err(|e| {
            error!(error = %e, "Credential validation failed");
            AppError::ServiceUnavailable("Authentication service unavailable".to_string())
        })?
        .ok_or_else(|| AppError::Unauthorized("Invalid username or password".to_string()))?;

    let token = state.token_issuer.issue(&identity)?;

    info!(
        subject = identity.subject_id(),
        expires_at = %token.expires_at,
        "Access token issued"
    );

    Ok(Json(TokenResponse {
        access_token: token.token,
    }))
}

/// The caller's identity, refreshed from the identity store
///
/// GET /api/users/me
pub(super) async fn current_user(
    State(state): State<AppState>,
    identity: Identity,
) -> AppResult<Json<CurrentUser>> {
    let record = state
        .identities
        .find_by_id(identity.subject_id())
        .await?
        .ok_or_else(|| AppError::NotFound("User no longer exists".to_string()))?;

    Ok(Json(CurrentUser {
        id: record.id,
        name: record.name,
    }))
}

use axum::{
    extract::{FromRef, State},
    routing::post,
    Json, Router,
};
use tracing::{instrument, warn};
use uuid::Uuid;

use crate::{
    auth::{
        dto::{AuthResponse, RefreshRequest, SessionRequest},
        jwt::JwtKeys,
    },
    error::AppError,
    state::AppState,
    users::{
        repo::User,
        services::{find_or_create_user, profile_response},
    },
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/session", post(exchange_session))
        .route("/auth/refresh", post(refresh))
}

fn issue_tokens(keys: &JwtKeys, user_id: Uuid) -> anyhow::Result<(String, String)> {
    Ok((keys.sign_access(user_id)?, keys.sign_refresh(user_id)?))
}

/// Trade a provider ID token for our own session tokens.
#[instrument(skip(state, payload))]
pub async fn exchange_session(
    State(state): State<AppState>,
    Json(payload): Json<SessionRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let identity = state.identity.verify(payload.id_token.trim()).map_err(|e| {
        warn!(error = %e, "identity token rejected");
        AppError::Unauthorized("Invalid identity token".into())
    })?;

    let user = find_or_create_user(&state, &identity).await?;

    let keys = JwtKeys::from_ref(&state);
    let (access_token, refresh_token) = issue_tokens(&keys, user.id)?;

    Ok(Json(AuthResponse {
        access_token,
        refresh_token,
        user: profile_response(&state, user).await?,
    }))
}

#[instrument(skip(state, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let keys = JwtKeys::from_ref(&state);
    let claims = keys
        .verify_refresh(&payload.refresh_token)
        .map_err(|e| AppError::Unauthorized(e.to_string()))?;

    let user = User::find_by_id(&state.db, claims.sub)
        .await?
        .ok_or_else(|| AppError::Unauthorized("User not found".into()))?;

    let (access_token, refresh_token) = issue_tokens(&keys, user.id)?;
    Ok(Json(AuthResponse {
        access_token,
        refresh_token,
        user: profile_response(&state, user).await?,
    }))
}

use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    routing::{get, post, put},
    Json, Router,
};
use tracing::{info, instrument};

use super::dto::{AvatarResponse, ProfileCheckResponse, ProfileResponse, UpdateProfileRequest};
use super::repo::{ProfileUpdate, User};
use super::services::{
    profile_response, suggested_name, upload_avatar, validate_name, MAX_AVATAR_BYTES,
};
use crate::{auth::jwt::AuthUser, error::AppError, state::AppState};

pub fn me_routes() -> Router<AppState> {
    Router::new()
        .route("/me", get(get_me).put(update_me))
        .route("/me/profile-check", get(profile_check))
        .route("/me/complete", post(complete_profile))
        .route(
            "/me/avatar",
            put(put_avatar).layer(DefaultBodyLimit::max(MAX_AVATAR_BYTES + 64 * 1024)),
        )
}

async fn load_user(state: &AppState, user_id: uuid::Uuid) -> Result<User, AppError> {
    User::find_by_id(&state.db, user_id)
        .await?
        .ok_or_else(|| AppError::Unauthorized("User not found".into()))
}

#[instrument(skip(state))]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<ProfileResponse>, AppError> {
    let user = load_user(&state, user_id).await?;
    Ok(Json(profile_response(&state, user).await?))
}

#[instrument(skip(state))]
pub async fn profile_check(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<ProfileCheckResponse>, AppError> {
    let user = load_user(&state, user_id).await?;
    Ok(Json(ProfileCheckResponse {
        profile_completed: user.profile_completed,
        suggested_name: suggested_name(&user.name, &user.email),
    }))
}

#[instrument(skip(state, payload))]
pub async fn complete_profile(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<Json<ProfileResponse>, AppError> {
    save_profile(&state, user_id, payload, true).await
}

#[instrument(skip(state, payload))]
pub async fn update_me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<Json<ProfileResponse>, AppError> {
    save_profile(&state, user_id, payload, false).await
}

async fn save_profile(
    state: &AppState,
    user_id: uuid::Uuid,
    payload: UpdateProfileRequest,
    mark_completed: bool,
) -> Result<Json<ProfileResponse>, AppError> {
    let name = validate_name(&payload.name)?;

    // Omitted fields keep what is stored.
    let (bio, preferences) = match (payload.bio, payload.preferences) {
        (Some(bio), Some(prefs)) => (bio.trim().to_owned(), prefs),
        (bio, prefs) => {
            let current = load_user(state, user_id).await?;
            let prefs = prefs.unwrap_or_else(|| current.preferences());
            let bio = bio.map(|b| b.trim().to_owned()).unwrap_or(current.bio);
            (bio, prefs)
        }
    };

    let update = ProfileUpdate {
        name,
        bio: &bio,
        preferences,
        mark_completed,
    };
    let user = User::update_profile(&state.db, user_id, &update)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;

    info!(%user_id, completed = user.profile_completed, "profile saved");
    Ok(Json(profile_response(state, user).await?))
}

/// PUT /me/avatar (multipart, field `avatar`)
#[instrument(skip(state, mp))]
pub async fn put_avatar(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    mut mp: Multipart,
) -> Result<Json<AvatarResponse>, AppError> {
    while let Some(field) = mp
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("invalid multipart body: {e}")))?
    {
        if field.name() != Some("avatar") {
            continue;
        }
        let content_type = field
            .content_type()
            .map(str::to_owned)
            .unwrap_or_else(|| "application/octet-stream".into());
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(format!("invalid avatar upload: {e}")))?;
        let picture = upload_avatar(&state, user_id, data, &content_type).await?;
        return Ok(Json(AvatarResponse { picture }));
    }
    Err(AppError::BadRequest("avatar field is required".into()))
}

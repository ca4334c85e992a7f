use anyhow::Context;
use bytes::Bytes;
use tracing::{info, warn};
use uuid::Uuid;

use super::dto::{ProfileResponse, PublicOwner};
use super::repo::{LoginProfile, User};
use crate::auth::claims::IdentityClaims;
use crate::error::AppError;
use crate::state::AppState;

const AVATAR_URL_TTL_SECS: u64 = 30 * 60;
pub const MAX_AVATAR_BYTES: usize = 5 * 1024 * 1024;

/// Find the user behind a verified provider identity, creating them on first login.
pub async fn find_or_create_user(st: &AppState, identity: &IdentityClaims) -> anyhow::Result<User> {
    let login = LoginProfile {
        subject: &identity.sub,
        email: identity.email.as_deref().unwrap_or_default(),
        name: identity.display_name().unwrap_or_default(),
        picture: identity.picture.as_deref().unwrap_or_default(),
    };
    let (user, created) = User::upsert_login(&st.db, &login).await?;
    if created {
        info!(user_id = %user.id, subject = %user.subject, "user registered");
    } else {
        info!(user_id = %user.id, "user logged in");
    }
    Ok(user)
}

/// Build a display name from an email's local part.
///
/// `john.doe@x` and `john_doe@x` give "John Doe"; `JohnDoe42@x` is split on
/// capitals after dropping the trailing digits. Anything without `@` gives "".
pub fn parse_name_from_email(email: &str) -> String {
    let Some((local, _)) = email.split_once('@') else {
        return String::new();
    };

    let parts: Vec<String> = if local.contains('.') {
        local.split('.').map(str::to_owned).collect()
    } else if local.contains('_') {
        local.split('_').map(str::to_owned).collect()
    } else if local.contains('-') {
        local.split('-').map(str::to_owned).collect()
    } else {
        let cleaned = local.trim_end_matches(|c: char| c.is_ascii_digit());
        let mixed_case = cleaned.chars().any(|c| c.is_ascii_uppercase()) && cleaned != cleaned.to_uppercase();
        if mixed_case {
            split_on_capitals(cleaned)
        } else {
            vec![cleaned.to_owned()]
        }
    };

    parts
        .iter()
        .filter(|p| !p.is_empty())
        .map(|p| capitalize(p))
        .collect::<Vec<_>>()
        .join(" ")
}

fn split_on_capitals(s: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    for c in s.chars() {
        if c.is_ascii_uppercase() && !current.is_empty() {
            parts.push(std::mem::take(&mut current));
        }
        current.push(c);
    }
    if !current.is_empty() {
        parts.push(current);
    }
    parts
}

fn capitalize(part: &str) -> String {
    let mut chars = part.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// Name to pre-fill on the complete-profile form.
pub fn suggested_name(name: &str, email: &str) -> String {
    let name = name.trim();
    if !name.is_empty() && name != email {
        name.to_owned()
    } else {
        parse_name_from_email(email)
    }
}

pub fn validate_name(name: &str) -> Result<&str, AppError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::BadRequest("Name cannot be empty.".into()));
    }
    Ok(name)
}

/// Uploaded avatar if present, otherwise the provider picture.
pub async fn resolve_picture(st: &AppState, user: &User) -> anyhow::Result<String> {
    match &user.avatar_key {
        Some(key) => st
            .storage
            .presign_get(key, AVATAR_URL_TTL_SECS)
            .await
            .with_context(|| format!("presign avatar {key}")),
        None => Ok(user.picture.clone()),
    }
}

pub async fn profile_response(st: &AppState, user: User) -> anyhow::Result<ProfileResponse> {
    let picture = resolve_picture(st, &user).await?;
    Ok(ProfileResponse {
        id: user.id,
        preferences: user.preferences(),
        email: user.email,
        name: user.name,
        picture,
        bio: user.bio,
        profile_completed: user.profile_completed,
        created_at: user.created_at,
        last_login: user.last_login,
    })
}

/// Owner card for a shared wishlist. Bio and picture only with `public_profile`.
pub async fn public_owner(st: &AppState, user: User) -> anyhow::Result<PublicOwner> {
    let (bio, picture) = if user.public_profile {
        (Some(user.bio.clone()), Some(resolve_picture(st, &user).await?))
    } else {
        (None, None)
    };
    Ok(PublicOwner {
        id: user.id,
        name: user.name,
        bio,
        picture,
    })
}

pub fn ext_from_mime(ct: &str) -> Option<&'static str> {
    match ct {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/gif" => Some("gif"),
        _ => None,
    }
}

/// Store a new avatar and drop the one it replaces.
pub async fn upload_avatar(
    st: &AppState,
    user_id: Uuid,
    body: Bytes,
    content_type: &str,
) -> Result<String, AppError> {
    let ext = ext_from_mime(content_type)
        .ok_or_else(|| AppError::BadRequest("Avatar must be a JPEG, PNG, WebP or GIF image".into()))?;
    if body.is_empty() {
        return Err(AppError::BadRequest("Avatar file is empty".into()));
    }
    if body.len() > MAX_AVATAR_BYTES {
        return Err(AppError::BadRequest("Avatar must be at most 5 MiB".into()));
    }

    let key = format!("avatars/{}/{}.{}", user_id, Uuid::new_v4(), ext);
    st.storage.put_object(&key, body, content_type).await?;

    let previous = User::replace_avatar_key(&st.db, user_id, &key)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;

    if let Some(old) = previous {
        if let Err(e) = st.storage.delete_object(&old).await {
            warn!(error = %e, key = %old, "failed to delete replaced avatar");
        }
    }

    info!(%user_id, %key, "avatar uploaded");
    Ok(st.storage.presign_get(&key, AVATAR_URL_TTL_SECS).await?)
}

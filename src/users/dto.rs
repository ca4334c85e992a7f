use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Preferences {
    pub notify_on_share: bool,
    pub public_profile: bool,
    pub hide_reserved_items: bool,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            notify_on_share: true,
            public_profile: false,
            hide_reserved_items: false,
        }
    }
}

/// The signed-in user's own profile.
#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub picture: String,
    pub bio: String,
    pub preferences: Preferences,
    pub profile_completed: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub last_login: OffsetDateTime,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub name: String,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub preferences: Option<Preferences>,
}

#[derive(Debug, Serialize)]
pub struct ProfileCheckResponse {
    pub profile_completed: bool,
    pub suggested_name: String,
}

/// What a shared-wishlist viewer learns about the owner.
#[derive(Debug, Serialize)]
pub struct PublicOwner {
    pub id: Uuid,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AvatarResponse {
    pub picture: String,
}

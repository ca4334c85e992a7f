use serde::{Deserialize, Serialize};

use crate::users::dto::ProfileResponse;

/// Request body for exchanging a provider ID token for session tokens.
#[derive(Debug, Deserialize)]
pub struct SessionRequest {
    pub id_token: String,
}

/// Request body for token refresh.
#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Response returned after session exchange or refresh.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub user: ProfileResponse,
}

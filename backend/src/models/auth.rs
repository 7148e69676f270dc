use serde::{Deserialize, Serialize};

use super::UserResponse;

#[derive(Debug, Clone, Deserialize)]
pub struct AppleCallbackRequest {
    pub code: String,
    #[serde(default)]
    pub state: Option<String>,
    /// JSON blob Apple sends only on the first authorization.
    #[serde(default)]
    pub user: Option<String>,
}

/// Identity extracted from Apple's `id_token`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppleUserInfo {
    pub sub: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub email_verified: bool,
    #[serde(default)]
    pub is_private_email: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub user: UserResponse,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenRefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppleLoginUrl {
    pub login_url: String,
    pub state: String,
}

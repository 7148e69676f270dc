use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::config::AppleConfig;
use crate::error::AppError;
use crate::models::AppleUserInfo;

const AUTHORIZE_URL: &str = "https://appleid.apple.com/auth/authorize";
const TOKEN_URL: &str = "https://appleid.apple.com/auth/token";
const APPLE_AUDIENCE: &str = "https://appleid.apple.com";
const CLIENT_SECRET_TTL_SECS: i64 = 60 * 60;

#[async_trait]
pub trait AppleIdentityProvider: Send + Sync {
    fn authorize_url(&self, state: &str) -> Result<String, AppError>;
    async fn exchange_code(&self, code: &str) -> Result<AppleUserInfo, AppError>;
}

/// Claims of the client secret Apple expects at the token endpoint.
#[derive(Debug, Serialize, Deserialize)]
struct ClientSecretClaims {
    iss: String,
    iat: i64,
    exp: i64,
    aud: String,
    sub: String,
}

#[derive(Debug, Deserialize)]
struct AppleTokenResponse {
    #[allow(dead_code)]
    access_token: Option<String>,
    id_token: String,
}

pub struct AppleHttpClient {
    client: Client,
    config: AppleConfig,
}

impl AppleHttpClient {
    pub fn new(config: AppleConfig) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| AppError::Upstream(format!("Failed to build http client: {}", e)))?;
        Ok(Self { client, config })
    }

    /// Signs a fresh client secret with the key at `APPLE_KEY_PATH`.
    pub async fn client_secret(&self) -> Result<String, AppError> {
        let pem = tokio::fs::read(&self.config.key_path).await.map_err(|e| {
            error!(path = %self.config.key_path.display(), "failed to read Apple private key: {}", e);
            AppError::InternalServerError
        })?;
        sign_client_secret(&self.config, &pem)
    }
}

pub fn sign_client_secret(config: &AppleConfig, pem: &[u8]) -> Result<String, AppError> {
    let key = EncodingKey::from_ec_pem(pem).map_err(|e| {
        error!("failed to parse Apple private key: {}", e);
        AppError::InternalServerError
    })?;

    let now = Utc::now();
    let claims = ClientSecretClaims {
        iss: config.team_id.clone(),
        iat: now.timestamp(),
        exp: (now + Duration::seconds(CLIENT_SECRET_TTL_SECS)).timestamp(),
        aud: APPLE_AUDIENCE.to_string(),
        sub: config.client_id.clone(),
    };
    let mut header = Header::new(Algorithm::ES256);
    header.kid = Some(config.key_id.clone());

    jsonwebtoken::encode(&header, &claims, &key).map_err(|e| {
        error!("failed to sign Apple client secret: {}", e);
        AppError::InternalServerError
    })
}

fn authorize_url_with(params: &[(&str, &str)]) -> Result<String, AppError> {
    Url::parse_with_params(AUTHORIZE_URL, params)
        .map(String::from)
        .map_err(|e| {
            error!("failed to build Apple authorize URL: {}", e);
            AppError::InternalServerError
        })
}

#[async_trait]
impl AppleIdentityProvider for AppleHttpClient {
    fn authorize_url(&self, state: &str) -> Result<String, AppError> {
        authorize_url_with(&[
            ("client_id", self.config.client_id.as_str()),
            ("redirect_uri", self.config.redirect_url.as_str()),
            ("response_type", "code"),
            ("scope", "name email"),
            ("response_mode", "form_post"),
            ("state", state),
        ])
    }

    async fn exchange_code(&self, code: &str) -> Result<AppleUserInfo, AppError> {
        if !self.config.is_configured() {
            return Err(AppError::BadRequest(
                "Apple OAuth is not configured: set APPLE_TEAM_ID, APPLE_CLIENT_ID, APPLE_KEY_ID and APPLE_KEY_PATH".to_string(),
            ));
        }
        let client_secret = self.client_secret().await?;

        let form = [
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", client_secret.as_str()),
            ("code", code),
            ("grant_type", "authorization_code"),
            ("redirect_uri", self.config.redirect_url.as_str()),
        ];

        let response = self.client
            .post(TOKEN_URL)
            .form(&form)
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("Failed to reach Apple: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Unauthorized(format!(
                "Apple token exchange failed {}: {}",
                status, body
            )));
        }

        let token: AppleTokenResponse = response
            .json()
            .await
            .map_err(|e| AppError::Upstream(format!("Failed to parse Apple token response: {}", e)))?;

        let info = parse_id_token(&token.id_token)?;
        info!(
            apple_id = %info.sub,
            email_verified = info.email_verified,
            is_private_email = info.is_private_email,
            "validated Apple authorization code"
        );
        Ok(info)
    }
}

/// Reads the claims of an Apple `id_token` without checking its signature;
/// the token came straight from Apple's token endpoint over TLS.
pub fn parse_id_token(id_token: &str) -> Result<AppleUserInfo, AppError> {
    let malformed = || AppError::Unauthorized("Malformed Apple ID token".to_string());

    let payload = id_token.split('.').nth(1).ok_or_else(malformed)?;
    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|_| malformed())?;
    let claims: serde_json::Value = serde_json::from_slice(&bytes).map_err(|_| malformed())?;

    let sub = claims
        .get("sub")
        .and_then(|v| v.as_str())
        .ok_or_else(|| AppError::Unauthorized("Missing 'sub' claim in Apple ID token".to_string()))?;

    Ok(AppleUserInfo {
        sub: sub.to_string(),
        email: claims.get("email").and_then(|v| v.as_str()).map(str::to_string),
        email_verified: bool_claim(&claims, "email_verified"),
        is_private_email: bool_claim(&claims, "is_private_email"),
    })
}

// Apple sends these as either JSON booleans or the strings "true"/"false".
fn bool_claim(claims: &serde_json::Value, key: &str) -> bool {
    match claims.get(key) {
        Some(serde_json::Value::Bool(b)) => *b,
        Some(serde_json::Value::String(s)) => s == "true",
        _ => false,
    }
}

/// Fallback provider when Apple sign-in is disabled.
pub struct NoopAppleProvider;

#[async_trait]
impl AppleIdentityProvider for NoopAppleProvider {
    fn authorize_url(&self, state: &str) -> Result<String, AppError> {
        authorize_url_with(&[("state", state)])
    }

    async fn exchange_code(&self, _code: &str) -> Result<AppleUserInfo, AppError> {
        Err(AppError::BadRequest("Apple OAuth is not configured".to_string()))
    }
}

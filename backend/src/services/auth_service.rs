use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use sqlx::SqlitePool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::password;
use crate::auth::{AppleIdentityProvider, TokenIssuer, TokenType};
use crate::db::user_repository;
use crate::error::AppError;
use crate::models::{
    AppleUserInfo, LoginResponse, NewUserRequest, PROVIDER_APPLE, PROVIDER_EMAIL, User,
};
use crate::validation;

pub struct AuthService {
    db: SqlitePool,
    tokens: TokenIssuer,
    apple: Arc<dyn AppleIdentityProvider>,
    bcrypt_cost: u32,
}

/// Shape of the `user` form field Apple posts on first authorization.
#[derive(Debug, Deserialize)]
struct AppleUserPayload {
    name: Option<AppleUserName>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AppleUserName {
    first_name: Option<String>,
    last_name: Option<String>,
}

impl AuthService {
    pub fn new(
        db: SqlitePool,
        tokens: TokenIssuer,
        apple: Arc<dyn AppleIdentityProvider>,
        bcrypt_cost: u32,
    ) -> Self {
        Self {
            db,
            tokens,
            apple,
            bcrypt_cost,
        }
    }

    pub fn apple_login_url(&self, state: &str) -> Result<String, AppError> {
        self.apple.authorize_url(state)
    }

    pub async fn apple_login(
        &self,
        code: &str,
        user_json: Option<&str>,
    ) -> Result<LoginResponse, AppError> {
        let info = self.apple.exchange_code(code).await?;
        self.process_apple_login(info, user_json).await
    }

    /// Finds the account for an Apple identity, linking or creating one as needed.
    pub async fn process_apple_login(
        &self,
        info: AppleUserInfo,
        user_json: Option<&str>,
    ) -> Result<LoginResponse, AppError> {
        if let Some(user) = user_repository::fetch_user_by_apple_id(&self.db, &info.sub).await? {
            ensure_active(&user)?;
            info!(user_id = %user.id, "existing Apple user logged in");
            return self.issue_tokens(user);
        }

        if let Some(email) = info.email.as_deref() {
            if let Some(user) = user_repository::fetch_user_by_email(&self.db, email).await? {
                ensure_active(&user)?;
                user_repository::link_apple_id(&self.db, &user.id, &info.sub, info.is_private_email)
                    .await?;
                info!(user_id = %user.id, "linked Apple ID to existing account");
                let user = self.profile(&user.id).await?;
                return self.issue_tokens(user);
            }
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4().to_string(),
            email: info
                .email
                .clone()
                .unwrap_or_else(|| format!("{}@appleid.invalid", info.sub)),
            password_hash: None,
            name: apple_display_name(user_json, info.email.as_deref()),
            is_active: true,
            apple_id: Some(info.sub.clone()),
            is_private_email: info.is_private_email,
            auth_provider: PROVIDER_APPLE.to_string(),
            created_at: now,
            updated_at: now,
        };
        user_repository::insert_user(&self.db, &user)
            .await
            .map_err(unique_violation_as_conflict)?;
        info!(user_id = %user.id, apple_id = %info.sub, "created new Apple user");

        self.issue_tokens(user)
    }

    pub fn issue_tokens(&self, user: User) -> Result<LoginResponse, AppError> {
        let apple_id = user.apple_id.as_deref();
        let access_token = self.tokens.issue(&user.id, &user.email, apple_id, TokenType::Access)?;
        let refresh_token = self.tokens.issue(&user.id, &user.email, apple_id, TokenType::Refresh)?;
        Ok(LoginResponse {
            access_token,
            refresh_token,
            token_type: "Bearer".to_string(),
            expires_in: self.tokens.access_ttl_secs(),
            user: user.into(),
        })
    }

    pub async fn refresh(&self, refresh_token: &str) -> Result<LoginResponse, AppError> {
        let claims = self.tokens.verify(refresh_token, TokenType::Refresh)?;
        let user = user_repository::fetch_user_by_id(&self.db, &claims.user_id)
            .await?
            .ok_or_else(|| AppError::Unauthorized("user no longer exists".to_string()))?;
        ensure_active(&user)?;
        self.issue_tokens(user)
    }

    pub async fn register(&self, req: NewUserRequest) -> Result<User, AppError> {
        validation::validate_new_user(&req)?;
        let email = req.email.trim().to_string();

        if user_repository::fetch_user_by_email(&self.db, &email).await?.is_some() {
            return Err(AppError::Conflict("user already exists".to_string()));
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4().to_string(),
            email,
            password_hash: Some(password::hash_password(&req.password, self.bcrypt_cost)?),
            name: req.name.trim().to_string(),
            is_active: true,
            apple_id: None,
            is_private_email: false,
            auth_provider: PROVIDER_EMAIL.to_string(),
            created_at: now,
            updated_at: now,
        };
        user_repository::insert_user(&self.db, &user)
            .await
            .map_err(unique_violation_as_conflict)?;
        info!(user_id = %user.id, "user registered");
        Ok(user)
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, AppError> {
        let invalid = || AppError::Unauthorized("invalid credentials".to_string());

        let user = user_repository::fetch_user_by_email(&self.db, email.trim())
            .await?
            .ok_or_else(invalid)?;

        ensure_active(&user)?;
        if user.auth_provider != PROVIDER_EMAIL {
            return Err(AppError::Unauthorized("please use your Apple ID to login".to_string()));
        }

        let stored = user.password_hash.as_deref().ok_or_else(invalid)?;
        if !password::verify_password(password, stored) {
            warn!(user_id = %user.id, "failed login attempt");
            return Err(invalid());
        }

        self.issue_tokens(user)
    }

    pub async fn profile(&self, user_id: &str) -> Result<User, AppError> {
        user_repository::fetch_user_by_id(&self.db, user_id)
            .await?
            .ok_or(AppError::NotFound)
    }
}

fn ensure_active(user: &User) -> Result<(), AppError> {
    if user.is_active {
        Ok(())
    } else {
        warn!(user_id = %user.id, "login refused for deactivated account");
        Err(AppError::Unauthorized("user account is deactivated".to_string()))
    }
}

fn apple_display_name(user_json: Option<&str>, email: Option<&str>) -> String {
    let from_payload = user_json
        .filter(|raw| !raw.is_empty())
        .and_then(|raw| serde_json::from_str::<AppleUserPayload>(raw).ok())
        .and_then(|payload| payload.name)
        .map(|name| {
            [name.first_name, name.last_name]
                .into_iter()
                .flatten()
                .map(|part| part.trim().to_string())
                .filter(|part| !part.is_empty())
                .collect::<Vec<_>>()
                .join(" ")
        })
        .filter(|name| !name.is_empty());

    from_payload
        .or_else(|| {
            email
                .and_then(|e| e.split_once('@'))
                .map(|(local, _)| local.to_string())
                .filter(|local| !local.is_empty())
        })
        .unwrap_or_else(|| "Apple User".to_string())
}

fn unique_violation_as_conflict(err: sqlx::Error) -> AppError {
    let is_unique = err
        .as_database_error()
        .is_some_and(|db_err| db_err.is_unique_violation());
    if is_unique {
        AppError::Conflict("user already exists".to_string())
    } else {
        AppError::Database(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_name_prefers_apple_payload() {
        let json = r#"{"name":{"firstName":"Ada","lastName":"Lovelace"},"email":"a@b.c"}"#;
        assert_eq!(apple_display_name(Some(json), Some("x@example.com")), "Ada Lovelace");
    }

    #[test]
    fn display_name_falls_back_to_email_then_default() {
        assert_eq!(apple_display_name(Some("not json"), Some("ada@example.com")), "ada");
        assert_eq!(apple_display_name(Some(r#"{"name":{}}"#), None), "Apple User");
        assert_eq!(apple_display_name(None, None), "Apple User");
    }
}

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;

use crate::auth::token::TokenType;
use crate::error::AppError;
use crate::state::AppState;

/// The caller identified by a valid access token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
    pub email: String,
    pub apple_id: Option<String>,
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .ok_or_else(|| AppError::Unauthorized("Authorization header is required".to_string()))?
            .to_str()
            .map_err(|_| AppError::Unauthorized("Invalid authorization header format".to_string()))?;

        let mut pieces = header.split(' ');
        let token = match (pieces.next(), pieces.next(), pieces.next()) {
            (Some("Bearer"), Some(token), None) if !token.is_empty() => token,
            _ => {
                return Err(AppError::Unauthorized(
                    "Invalid authorization header format".to_string(),
                ))
            }
        };

        let claims = state.tokens.verify(token, TokenType::Access)?;
        Ok(AuthUser {
            user_id: claims.user_id,
            email: claims.email,
            apple_id: claims.apple_id,
        })
    }
}

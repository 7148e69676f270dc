use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::Response;
use serde::Deserialize;
use tracing::{error, info};

use crate::auth::AuthUser;
use crate::error::AppError;
use crate::models::{
    AppleCallbackRequest, AppleLoginUrl, LoginRequest, NewUserRequest, TokenRefreshRequest,
    UserResponse,
};
use crate::response;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AppleCallbackParams {
    #[serde(default)]
    code: String,
    state: Option<String>,
    user: Option<String>,
}

pub async fn apple_login(State(state): State<AppState>) -> Result<Response, AppError> {
    let oauth_state = state.oauth_states.issue().await;
    let login_url = state.auth_service().apple_login_url(&oauth_state)?;
    info!("generated Apple login URL");
    Ok(response::success(
        StatusCode::OK,
        "Apple login URL generated",
        AppleLoginUrl {
            login_url,
            state: oauth_state,
        },
    ))
}

pub async fn apple_callback(
    State(state): State<AppState>,
    Json(req): Json<AppleCallbackRequest>,
) -> Result<Response, AppError> {
    complete_apple_login(&state, &req.code, req.state.as_deref(), req.user.as_deref()).await
}

pub async fn apple_callback_url(
    State(state): State<AppState>,
    Query(params): Query<AppleCallbackParams>,
) -> Result<Response, AppError> {
    complete_apple_login(
        &state,
        &params.code,
        params.state.as_deref(),
        params.user.as_deref(),
    )
    .await
}

async fn complete_apple_login(
    state: &AppState,
    code: &str,
    oauth_state: Option<&str>,
    user_json: Option<&str>,
) -> Result<Response, AppError> {
    if code.trim().is_empty() {
        return Err(AppError::BadRequest("code parameter is required".to_string()));
    }

    if let Some(oauth_state) = oauth_state.filter(|s| !s.is_empty()) {
        if !state.oauth_states.consume(oauth_state).await {
            return Err(AppError::Unauthorized(
                "Invalid or expired state parameter".to_string(),
            ));
        }
    }

    let login = state
        .auth_service()
        .apple_login(code, user_json)
        .await
        .inspect_err(|e| error!("Apple login failed: {}", e))?;

    info!(user_id = %login.user.id, "Apple login successful");
    Ok(response::success(StatusCode::OK, "Apple login successful", login))
}

pub async fn refresh_token(
    State(state): State<AppState>,
    Json(req): Json<TokenRefreshRequest>,
) -> Result<Response, AppError> {
    let login = state.auth_service().refresh(&req.refresh_token).await?;
    Ok(response::success(StatusCode::OK, "Token refreshed successfully", login))
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<NewUserRequest>,
) -> Result<Response, AppError> {
    let user = state.auth_service().register(req).await?;
    Ok(response::success(
        StatusCode::CREATED,
        "User registered successfully",
        UserResponse::from(user),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Response, AppError> {
    let login = state.auth_service().login(&req.email, &req.password).await?;
    info!(user_id = %login.user.id, "user login successful");
    Ok(response::success(StatusCode::OK, "Login successful", login))
}

pub async fn profile(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Response, AppError> {
    let user = state.auth_service().profile(&user.user_id).await?;
    Ok(response::success(
        StatusCode::OK,
        "User profile retrieved",
        UserResponse::from(user),
    ))
}

mod auth;
mod todos;

use axum::Json;
use axum::http::{Method, header};
use axum::routing::{get, post};
use axum::{Router, extract::State, http::StatusCode};
use serde_json::{Value, json};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::error::AppError;
use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/v1/auth/apple/login", get(auth::apple_login))
        .route(
            "/api/v1/auth/apple/callback",
            get(auth::apple_callback_url).post(auth::apple_callback),
        )
        .route("/api/v1/auth/token/refresh", post(auth::refresh_token))
        .route("/api/v1/auth/register", post(auth::register))
        .route("/api/v1/auth/login", post(auth::login))
        .route("/api/v1/auth/user/profile", get(auth::profile))
        .route("/api/v1/todos", get(todos::list_todos).post(todos::create_todo))
        .route(
            "/api/v1/todos/{id}",
            get(todos::get_todo)
                .put(todos::update_todo)
                .delete(todos::delete_todo),
        )
        .layer(cors())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Any origin may call the API; credentials travel in the bearer header.
fn cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any)
        .expose_headers([header::CONTENT_LENGTH])
}

async fn health(State(state): State<AppState>) -> Result<(StatusCode, Json<Value>), AppError> {
    sqlx::query("select 1").execute(&state.db).await?;
    Ok((
        StatusCode::OK,
        Json(json!({ "status": "ok", "message": "Todo API is running" })),
    ))
}

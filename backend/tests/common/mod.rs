#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use serde_json::Value;
use tower::ServiceExt;

use todo_backend::api::router;
use todo_backend::auth::AppleIdentityProvider;
use todo_backend::config::Config;
use todo_backend::db;
use todo_backend::error::AppError;
use todo_backend::models::AppleUserInfo;
use todo_backend::state::AppState;

/// Accepts `code-<sub>` codes and answers with a fixed email per subject.
pub struct FakeApple;

#[async_trait]
impl AppleIdentityProvider for FakeApple {
    fn authorize_url(&self, state: &str) -> Result<String, AppError> {
        Ok(format!("https://appleid.apple.com/auth/authorize?state={}", state))
    }

    async fn exchange_code(&self, code: &str) -> Result<AppleUserInfo, AppError> {
        let sub = code
            .strip_prefix("code-")
            .ok_or_else(|| AppError::Unauthorized("invalid_grant".to_string()))?;
        Ok(AppleUserInfo {
            sub: sub.to_string(),
            email: Some(format!("{}@privaterelay.appleid.com", sub)),
            email_verified: true,
            is_private_email: true,
        })
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
}

pub async fn spawn_app() -> TestApp {
    let config = Config::for_tests();
    let pool = db::connect(&config.database_url)
        .await
        .expect("Failed to create database");
    let state = AppState::new(pool, config, Arc::new(FakeApple));
    TestApp {
        router: router(state.clone()),
        state,
    }
}

impl TestApp {
    pub async fn request(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("Failed to build request");

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Request failed");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("Failed to read body");
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("Response is not JSON")
        };
        (status, json)
    }

    /// Registers a user and returns its access token.
    pub async fn login_as(&self, email: &str) -> String {
        let (status, _) = self
            .request(
                "POST",
                "/api/v1/auth/register",
                None,
                Some(serde_json::json!({
                    "email": email,
                    "password": "secret-password",
                    "name": "Test User"
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, body) = self
            .request(
                "POST",
                "/api/v1/auth/login",
                None,
                Some(serde_json::json!({ "email": email, "password": "secret-password" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        body["data"]["access_token"]
            .as_str()
            .expect("missing access token")
            .to_string()
    }
}

pub mod dto;

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::RemoteError;
use dto::{Envelope, ErrorBody, PageEnvelope, RemoteTodo, TodoDraft, TodoUpdate};

const PAGE_SIZE: usize = 100;

#[async_trait]
pub trait RemoteTodoApi: Send + Sync {
    async fn list_todos(&self) -> Result<Vec<RemoteTodo>, RemoteError>;
    async fn create_todo(&self, draft: &TodoDraft) -> Result<RemoteTodo, RemoteError>;
    async fn update_todo(&self, todo: &RemoteTodo) -> Result<RemoteTodo, RemoteError>;
    async fn delete_todo(&self, server_id: &str) -> Result<(), RemoteError>;
}

#[async_trait]
pub trait Connectivity: Send + Sync {
    async fn is_online(&self) -> bool;
}

/// Connectivity flag flipped by hand; used by the CLI and tests.
#[derive(Debug, Default)]
pub struct StaticConnectivity {
    online: AtomicBool,
}

impl StaticConnectivity {
    pub fn new(online: bool) -> Self {
        Self {
            online: AtomicBool::new(online),
        }
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }
}

#[async_trait]
impl Connectivity for StaticConnectivity {
    async fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }
}

/// Talks to the todo backend's `/api/v1/todos` endpoints.
pub struct HttpTodoApi {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl HttpTodoApi {
    pub fn new(base_url: &str, token: Option<String>) -> Result<Self, RemoteError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| RemoteError::Transport(format!("Failed to build http client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Response, RemoteError> {
        let response = self
            .authorized(request)
            .send()
            .await
            .map_err(|e| RemoteError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&body)
            .map(|e| e.message)
            .unwrap_or(body);
        Err(match status {
            StatusCode::NOT_FOUND => RemoteError::NotFound,
            StatusCode::UNAUTHORIZED => RemoteError::Unauthorized(message),
            _ => RemoteError::Status {
                status: status.as_u16(),
                message,
            },
        })
    }

    async fn data<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> Result<T, RemoteError> {
        let envelope: Envelope<T> = self
            .send(request)
            .await?
            .json()
            .await
            .map_err(|e| RemoteError::Decode(e.to_string()))?;
        envelope.data.ok_or_else(|| {
            RemoteError::Decode(format!("response carried no data: {}", envelope.message))
        })
    }
}

#[async_trait]
impl RemoteTodoApi for HttpTodoApi {
    async fn list_todos(&self) -> Result<Vec<RemoteTodo>, RemoteError> {
        let mut todos = Vec::new();
        let mut page = 1;
        loop {
            let request = self
                .client
                .get(self.url("/api/v1/todos"))
                .query(&[("page", page.to_string()), ("limit", PAGE_SIZE.to_string())]);
            let body: PageEnvelope<RemoteTodo> = self
                .send(request)
                .await?
                .json()
                .await
                .map_err(|e| RemoteError::Decode(e.to_string()))?;

            debug!(page = body.pagination.page, count = body.data.len(), "fetched todo page");
            todos.extend(body.data);
            if !body.pagination.has_next {
                break;
            }
            page += 1;
        }
        Ok(todos)
    }

    async fn create_todo(&self, draft: &TodoDraft) -> Result<RemoteTodo, RemoteError> {
        let request = self.client.post(self.url("/api/v1/todos")).json(draft);
        self.data(request).await
    }

    async fn update_todo(&self, todo: &RemoteTodo) -> Result<RemoteTodo, RemoteError> {
        let request = self
            .client
            .put(self.url(&format!("/api/v1/todos/{}", todo.id)))
            .json(&TodoUpdate::from(todo));
        self.data(request).await
    }

    async fn delete_todo(&self, server_id: &str) -> Result<(), RemoteError> {
        let request = self
            .client
            .delete(self.url(&format!("/api/v1/todos/{}", server_id)));
        self.send(request).await?;
        Ok(())
    }
}

#[async_trait]
impl Connectivity for HttpTodoApi {
    async fn is_online(&self) -> bool {
        match self.client.get(self.url("/health")).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!("health check failed: {}", e);
                false
            }
        }
    }
}

/// Remote for a client with no server configured; every call fails.
pub struct NoopTodoApi;

#[async_trait]
impl RemoteTodoApi for NoopTodoApi {
    async fn list_todos(&self) -> Result<Vec<RemoteTodo>, RemoteError> {
        Err(RemoteError::Transport("no server configured".to_string()))
    }

    async fn create_todo(&self, _draft: &TodoDraft) -> Result<RemoteTodo, RemoteError> {
        Err(RemoteError::Transport("no server configured".to_string()))
    }

    async fn update_todo(&self, _todo: &RemoteTodo) -> Result<RemoteTodo, RemoteError> {
        Err(RemoteError::Transport("no server configured".to_string()))
    }

    async fn delete_todo(&self, _server_id: &str) -> Result<(), RemoteError> {
        Err(RemoteError::Transport("no server configured".to_string()))
    }
}

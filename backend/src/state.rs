use std::sync::Arc;

use sqlx::SqlitePool;

use crate::auth::{AppleIdentityProvider, TokenIssuer};
use crate::config::Config;
use crate::services::{AuthService, OAuthStateStore, TodoService};

#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub config: Arc<Config>,
    pub tokens: TokenIssuer,
    pub apple: Arc<dyn AppleIdentityProvider>,
    pub oauth_states: OAuthStateStore,
}

impl AppState {
    pub fn new(db: SqlitePool, config: Config, apple: Arc<dyn AppleIdentityProvider>) -> Self {
        let tokens = TokenIssuer::new(config.jwt_secret.as_bytes());
        Self {
            db,
            config: Arc::new(config),
            tokens,
            apple,
            oauth_states: OAuthStateStore::new(),
        }
    }

    pub fn todo_service(&self) -> TodoService {
        TodoService::new(self.db.clone())
    }

    pub fn auth_service(&self) -> AuthService {
        AuthService::new(
            self.db.clone(),
            self.tokens.clone(),
            self.apple.clone(),
            self.config.bcrypt_cost,
        )
    }
}

use std::env;
use std::path::PathBuf;

use crate::error::ClientError;
use crate::sync::ConflictPolicy;

#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub api_url: String,
    pub api_token: Option<String>,
    pub store_path: PathBuf,
    pub conflict_policy: ConflictPolicy,
    pub log_level: String,
}

impl ClientConfig {
    pub fn from_env() -> Result<Self, ClientError> {
        dotenvy::dotenv().ok();

        let conflict_policy = var_or("TODO_CONFLICT_POLICY", "merge-latest")
            .parse::<ConflictPolicy>()
            .map_err(ClientError::Config)?;
        Ok(Self {
            api_url: var_or("TODO_API_URL", "http://localhost:8080"),
            api_token: env::var("TODO_API_TOKEN").ok().filter(|t| !t.is_empty()),
            store_path: PathBuf::from(var_or("TODO_STORE_PATH", "todos.json")),
            conflict_policy,
            log_level: var_or("LOG_LEVEL", "warn"),
        })
    }
}

fn var_or(key: &str, default: &str) -> String {
    env::var(key)
        .ok()
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

use std::env;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use tracing::warn;

use crate::auth::password::DEFAULT_COST;
use crate::error::AppError;

const DEV_JWT_SECRET: &str = "dev-secret-change-me";

#[derive(Clone, Debug)]
pub struct AppleConfig {
    pub team_id: String,
    pub client_id: String,
    pub key_id: String,
    /// PKCS#8 PEM file holding the ES256 key that signs client secrets.
    pub key_path: PathBuf,
    pub redirect_url: String,
}

impl AppleConfig {
    pub fn is_configured(&self) -> bool {
        !self.team_id.is_empty()
            && !self.client_id.is_empty()
            && !self.key_id.is_empty()
            && !self.key_path.as_os_str().is_empty()
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    pub environment: String,
    pub host: IpAddr,
    pub port: u16,
    pub database_url: String,
    pub jwt_secret: String,
    pub bcrypt_cost: u32,
    pub log_level: String,
    pub apple: AppleConfig,
    pub oauth_state_sweep_secs: u64,
}

impl Config {
    pub fn new_from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();

        let host = var_or("HOST", "127.0.0.1")
            .parse()
            .map_err(|_| AppError::BadRequest("HOST is not a valid IP address".to_string()))?;
        let port = var_or("PORT", "8080")
            .parse()
            .map_err(|_| AppError::BadRequest("PORT is not a valid port".to_string()))?;
        let bcrypt_cost = var_or("BCRYPT_COST", &DEFAULT_COST.to_string())
            .parse()
            .map_err(|_| AppError::BadRequest("BCRYPT_COST must be an integer".to_string()))?;
        let oauth_state_sweep_secs = var_or("OAUTH_STATE_SWEEP_SECS", "300")
            .parse()
            .map_err(|_| AppError::BadRequest("OAUTH_STATE_SWEEP_SECS must be an integer".to_string()))?;

        let config = Self {
            environment: var_or("ENVIRONMENT", "development"),
            host,
            port,
            database_url: var_or("DATABASE_URL", "sqlite://todo.db?mode=rwc"),
            jwt_secret: var_or("JWT_SECRET", DEV_JWT_SECRET),
            bcrypt_cost,
            log_level: var_or("LOG_LEVEL", "info"),
            apple: AppleConfig {
                team_id: var_or("APPLE_TEAM_ID", ""),
                client_id: var_or("APPLE_CLIENT_ID", ""),
                key_id: var_or("APPLE_KEY_ID", ""),
                key_path: PathBuf::from(var_or("APPLE_KEY_PATH", "")),
                redirect_url: var_or(
                    "APPLE_REDIRECT_URL",
                    "http://localhost:8080/api/v1/auth/apple/callback",
                ),
            },
            oauth_state_sweep_secs,
        };

        if config.environment != "development" && config.jwt_secret == DEV_JWT_SECRET {
            warn!("JWT_SECRET is using the development default in {}", config.environment);
        }

        Ok(config)
    }

    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Settings for tests and local tooling; never reads the environment.
    pub fn for_tests() -> Self {
        Self {
            environment: "test".to_string(),
            host: IpAddr::from([127, 0, 0, 1]),
            port: 0,
            database_url: "sqlite::memory:".to_string(),
            jwt_secret: "test-secret".to_string(),
            bcrypt_cost: 4,
            log_level: "debug".to_string(),
            apple: AppleConfig {
                team_id: "test-team-id".to_string(),
                client_id: "test-client-id".to_string(),
                key_id: "test-key-id".to_string(),
                key_path: PathBuf::from("test-apple-key.p8"),
                redirect_url: "http://localhost:8080/api/v1/auth/apple/callback".to_string(),
            },
            oauth_state_sweep_secs: 300,
        }
    }
}

fn var_or(key: &str, default: &str) -> String {
    env::var(key)
        .ok()
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

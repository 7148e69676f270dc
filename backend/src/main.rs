use std::sync::Arc;

use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use todo_backend::api::router;
use todo_backend::auth::{AppleHttpClient, AppleIdentityProvider, NoopAppleProvider};
use todo_backend::config::Config;
use todo_backend::db;
use todo_backend::services::OAuthStateSweeper;
use todo_backend::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::new_from_env()?;

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| format!("todo_backend={}", config.log_level)),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let pool = db::connect(&config.database_url).await?;

    let apple: Arc<dyn AppleIdentityProvider> = if config.apple.is_configured() {
        Arc::new(AppleHttpClient::new(config.apple.clone())?)
    } else {
        warn!("Apple sign-in is not configured; Apple login endpoints will reject requests");
        Arc::new(NoopAppleProvider)
    };

    let addr = config.addr();
    let sweep_secs = config.oauth_state_sweep_secs;
    let state = AppState::new(pool, config, apple);

    let sweeper = OAuthStateSweeper::new(state.oauth_states.clone(), sweep_secs);
    tokio::spawn(sweeper.start());

    let app = router(state);

    info!("listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

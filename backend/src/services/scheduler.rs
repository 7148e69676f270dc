use std::time::Duration;

use tracing::{debug, info};

use crate::services::oauth_state::OAuthStateStore;

/// OAuth state sweeper
/// Periodically drops `state` values whose login window has passed.
pub struct OAuthStateSweeper {
    states: OAuthStateStore,
    interval: Duration,
}

impl OAuthStateSweeper {
    pub fn new(states: OAuthStateStore, interval_secs: u64) -> Self {
        Self {
            states,
            interval: Duration::from_secs(interval_secs.max(1)),
        }
    }

    /// Runs forever; abort the task to stop it.
    pub async fn start(self) {
        info!("Starting OAuth state sweeper (interval: {:?})", self.interval);

        loop {
            tokio::time::sleep(self.interval).await;
            self.run_once().await;
        }
    }

    pub async fn run_once(&self) -> usize {
        let purged = self.states.purge_expired().await;
        if purged > 0 {
            info!("Purged {} expired OAuth states", purged);
        } else {
            debug!("No expired OAuth states");
        }
        purged
    }
}

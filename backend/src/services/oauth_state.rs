use std::collections::HashMap;
use std::sync::Arc;

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;

pub const STATE_TTL_SECS: i64 = 5 * 60;

/// CSRF `state` values handed out for the Apple redirect, each usable once.
#[derive(Clone, Default)]
pub struct OAuthStateStore {
    states: Arc<Mutex<HashMap<String, DateTime<Utc>>>>,
}

impl OAuthStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn issue(&self) -> String {
        let bytes: [u8; 16] = rand::random();
        let state = URL_SAFE_NO_PAD.encode(bytes);
        let expires_at = Utc::now() + Duration::seconds(STATE_TTL_SECS);
        self.states.lock().await.insert(state.clone(), expires_at);
        state
    }

    /// Removes the state and reports whether it was known and unexpired.
    pub async fn consume(&self, state: &str) -> bool {
        match self.states.lock().await.remove(state) {
            Some(expires_at) => Utc::now() < expires_at,
            None => false,
        }
    }

    pub async fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let mut states = self.states.lock().await;
        let before = states.len();
        states.retain(|_, expires_at| *expires_at > now);
        before - states.len()
    }

    pub async fn len(&self) -> usize {
        self.states.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    #[cfg(test)]
    async fn insert_with_expiry(&self, state: &str, expires_at: DateTime<Utc>) {
        self.states.lock().await.insert(state.to_string(), expires_at);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn state_is_single_use() {
        let store = OAuthStateStore::new();
        let state = store.issue().await;
        assert!(store.consume(&state).await);
        assert!(!store.consume(&state).await);
        assert!(!store.consume("never-issued").await);
    }

    #[tokio::test]
    async fn expired_state_is_rejected_and_purged() {
        let store = OAuthStateStore::new();
        store.insert_with_expiry("old", Utc::now() - Duration::seconds(1)).await;
        store.insert_with_expiry("stale", Utc::now() - Duration::seconds(1)).await;
        let fresh = store.issue().await;

        assert!(!store.consume("old").await);
        assert_eq!(store.purge_expired().await, 1);
        assert_eq!(store.len().await, 1);
        assert!(store.consume(&fresh).await);
    }
}

//! Persistence for the on-device todo list.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::StorageError;
use crate::record::LocalTodo;

#[async_trait]
pub trait LocalStore: Send + Sync {
    /// Every stored entry, tombstones included.
    async fn load_all(&self) -> Result<Vec<LocalTodo>, StorageError>;
    /// Replaces the stored list.
    async fn save_all(&self, todos: &[LocalTodo]) -> Result<(), StorageError>;
}

/// Keeps the whole list as one JSON document. A missing file reads as empty.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "todos.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl LocalStore for JsonFileStore {
    async fn load_all(&self) -> Result<Vec<LocalTodo>, StorageError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn save_all(&self, todos: &[LocalTodo]) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let bytes = serde_json::to_vec_pretty(todos)?;
        // Readers never observe a partially written list.
        let temp = self.temp_path();
        tokio::fs::write(&temp, &bytes).await?;
        tokio::fs::rename(&temp, &self.path).await?;
        debug!(path = %self.path.display(), count = todos.len(), "saved local todos");
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryStore {
    todos: Mutex<Vec<LocalTodo>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_todos(todos: Vec<LocalTodo>) -> Self {
        Self {
            todos: Mutex::new(todos),
        }
    }
}

#[async_trait]
impl LocalStore for InMemoryStore {
    async fn load_all(&self) -> Result<Vec<LocalTodo>, StorageError> {
        Ok(self.todos.lock().await.clone())
    }

    async fn save_all(&self, todos: &[LocalTodo]) -> Result<(), StorageError> {
        *self.todos.lock().await = todos.to_vec();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Priority, TodoRecord};

    #[tokio::test]
    async fn missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("todos.json"));
        assert!(store.load_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn saves_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("nested").join("todos.json"));
        let todos = vec![LocalTodo::Active(TodoRecord::new("Buy milk", Priority::High, None))];

        store.save_all(&todos).await.unwrap();
        let reopened = JsonFileStore::new(store.path().to_path_buf());
        assert_eq!(reopened.load_all().await.unwrap(), todos);
        assert!(!store.temp_path().exists());
    }

    #[tokio::test]
    async fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("todos.json");
        std::fs::write(&path, "{not json").unwrap();
        let err = JsonFileStore::new(path).load_all().await.unwrap_err();
        assert!(matches!(err, StorageError::Serialization(_)));
    }
}

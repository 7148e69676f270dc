#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use todo_client::error::RemoteError;
use todo_client::remote::RemoteTodoApi;
use todo_client::remote::dto::{RemoteTodo, TodoDraft};
use todo_client::store::InMemoryStore;
use todo_client::{ConflictPolicy, LocalTodoService, Priority, SyncEngine};

/// In-memory server with switchable failures.
#[derive(Default)]
pub struct FakeRemote {
    todos: Mutex<Vec<RemoteTodo>>,
    next_id: AtomicU64,
    fail_list: AtomicBool,
    /// Titles or server ids whose create/update/delete calls fail.
    failing: Mutex<HashSet<String>>,
    list_delay_ms: AtomicU64,
    pub lists: AtomicUsize,
    pub creates: AtomicUsize,
    pub updates: AtomicUsize,
    pub deletes: AtomicUsize,
}

impl FakeRemote {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            next_id: AtomicU64::new(100),
            ..Default::default()
        })
    }

    pub fn with_todos(todos: Vec<RemoteTodo>) -> Arc<Self> {
        let remote = Self::new();
        *remote.todos.lock().unwrap() = todos;
        remote
    }

    pub fn todos(&self) -> Vec<RemoteTodo> {
        self.todos.lock().unwrap().clone()
    }

    pub fn find(&self, id: &str) -> Option<RemoteTodo> {
        self.todos().into_iter().find(|t| t.id == id)
    }

    /// Server-side edit, as if made from another device.
    pub fn edit(&self, id: &str, title: &str, updated_at: DateTime<Utc>) {
        let mut todos = self.todos.lock().unwrap();
        let todo = todos.iter_mut().find(|t| t.id == id).expect("unknown remote todo");
        todo.title = title.to_string();
        todo.updated_at = Some(updated_at);
    }

    pub fn set_fail_list(&self, fail: bool) {
        self.fail_list.store(fail, Ordering::SeqCst);
    }

    pub fn fail_for(&self, key: &str) {
        self.failing.lock().unwrap().insert(key.to_string());
    }

    pub fn set_list_delay(&self, delay: Duration) {
        self.list_delay_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    fn check(&self, keys: &[&str]) -> Result<(), RemoteError> {
        let failing = self.failing.lock().unwrap();
        if keys.iter().any(|k| failing.contains(*k)) {
            return Err(RemoteError::Transport("connection reset".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteTodoApi for FakeRemote {
    async fn list_todos(&self) -> Result<Vec<RemoteTodo>, RemoteError> {
        self.lists.fetch_add(1, Ordering::SeqCst);
        let delay = self.list_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if self.fail_list.load(Ordering::SeqCst) {
            return Err(RemoteError::Transport("connection refused".to_string()));
        }
        Ok(self.todos())
    }

    async fn create_todo(&self, draft: &TodoDraft) -> Result<RemoteTodo, RemoteError> {
        self.check(&[draft.title.as_str()])?;
        self.creates.fetch_add(1, Ordering::SeqCst);
        let now = Utc::now();
        let todo = RemoteTodo {
            id: self.next_id.fetch_add(1, Ordering::SeqCst).to_string(),
            title: draft.title.clone(),
            description: Some(String::new()),
            is_completed: draft.is_completed,
            priority: draft.priority,
            due_date: draft.due_date,
            created_at: now,
            updated_at: Some(now),
        };
        self.todos.lock().unwrap().push(todo.clone());
        Ok(todo)
    }

    async fn update_todo(&self, todo: &RemoteTodo) -> Result<RemoteTodo, RemoteError> {
        self.check(&[todo.title.as_str(), todo.id.as_str()])?;
        self.updates.fetch_add(1, Ordering::SeqCst);
        let mut todos = self.todos.lock().unwrap();
        let stored = todos
            .iter_mut()
            .find(|t| t.id == todo.id)
            .ok_or(RemoteError::NotFound)?;
        stored.title = todo.title.clone();
        stored.is_completed = todo.is_completed;
        stored.priority = todo.priority;
        stored.due_date = todo.due_date;
        stored.updated_at = Some(Utc::now());
        Ok(stored.clone())
    }

    async fn delete_todo(&self, server_id: &str) -> Result<(), RemoteError> {
        self.check(&[server_id])?;
        self.deletes.fetch_add(1, Ordering::SeqCst);
        let mut todos = self.todos.lock().unwrap();
        let before = todos.len();
        todos.retain(|t| t.id != server_id);
        if todos.len() == before {
            return Err(RemoteError::NotFound);
        }
        Ok(())
    }
}

pub fn remote_todo(id: &str, title: &str, updated_at: DateTime<Utc>) -> RemoteTodo {
    RemoteTodo {
        id: id.to_string(),
        title: title.to_string(),
        description: Some(String::new()),
        is_completed: false,
        priority: Priority::Medium,
        due_date: None,
        created_at: updated_at - chrono::Duration::hours(1),
        updated_at: Some(updated_at),
    }
}

pub fn local_service() -> Arc<LocalTodoService> {
    Arc::new(LocalTodoService::new(Arc::new(InMemoryStore::new())))
}

pub fn engine(
    local: &Arc<LocalTodoService>,
    remote: &Arc<FakeRemote>,
    policy: ConflictPolicy,
) -> SyncEngine {
    SyncEngine::new(local.clone(), remote.clone(), policy)
}

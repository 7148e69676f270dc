use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::ClientError;
use crate::record::{LocalTodo, Priority, TodoRecord, sort_for_display};
use crate::store::LocalStore;

/// CRUD over the local store, stamping sync metadata on every change.
///
/// All access goes through [`LocalTodoService::with_entries`], which holds a
/// single async lock across load, mutation and save.
pub struct LocalTodoService {
    store: Arc<dyn LocalStore>,
    lock: Mutex<()>,
}

impl LocalTodoService {
    pub fn new(store: Arc<dyn LocalStore>) -> Self {
        Self {
            store,
            lock: Mutex::new(()),
        }
    }

    /// Runs `f` over the stored entries and saves them if `f` changed anything.
    /// Nothing is saved when `f` fails.
    pub async fn with_entries<F, R>(&self, f: F) -> Result<R, ClientError>
    where
        F: FnOnce(&mut Vec<LocalTodo>) -> Result<R, ClientError>,
    {
        let _guard = self.lock.lock().await;
        let mut entries = self.store.load_all().await?;
        let before = entries.clone();
        let result = f(&mut entries)?;
        if entries != before {
            self.store.save_all(&entries).await?;
        }
        Ok(result)
    }

    /// Snapshot of every entry, tombstones included.
    pub async fn entries(&self) -> Result<Vec<LocalTodo>, ClientError> {
        let _guard = self.lock.lock().await;
        Ok(self.store.load_all().await?)
    }

    /// Live todos in display order.
    pub async fn list(&self) -> Result<Vec<TodoRecord>, ClientError> {
        let mut records: Vec<TodoRecord> = self
            .entries()
            .await?
            .into_iter()
            .filter_map(|entry| match entry {
                LocalTodo::Active(record) => Some(record),
                LocalTodo::Tombstoned { .. } => None,
            })
            .collect();
        sort_for_display(&mut records);
        Ok(records)
    }

    pub async fn get(&self, id: Uuid) -> Result<TodoRecord, ClientError> {
        self.entries()
            .await?
            .into_iter()
            .find_map(|entry| match entry {
                LocalTodo::Active(record) if record.id == id => Some(record),
                _ => None,
            })
            .ok_or(ClientError::NotFound(id))
    }

    pub async fn create(
        &self,
        title: &str,
        priority: Priority,
        due_date: Option<DateTime<Utc>>,
    ) -> Result<TodoRecord, ClientError> {
        let record = TodoRecord::new(title, priority, due_date);
        let created = record.clone();
        self.with_entries(move |entries| {
            entries.push(LocalTodo::Active(record));
            Ok(())
        })
        .await?;
        info!(todo_id = %created.id, "local todo created");
        Ok(created)
    }

    /// Applies the editable fields of `record` to the stored todo with the same id.
    pub async fn update(&self, record: TodoRecord) -> Result<TodoRecord, ClientError> {
        self.with_entries(|entries| {
            let stored = find_active(entries, record.id)?;
            stored.title = record.title;
            stored.is_completed = record.is_completed;
            stored.priority = record.priority;
            stored.due_date = record.due_date;
            stored.touch();
            Ok(stored.clone())
        })
        .await
    }

    pub async fn toggle(&self, id: Uuid) -> Result<TodoRecord, ClientError> {
        self.with_entries(|entries| {
            let stored = find_active(entries, id)?;
            stored.is_completed = !stored.is_completed;
            stored.touch();
            Ok(stored.clone())
        })
        .await
    }

    /// Local-only todos vanish; server-backed ones become tombstones.
    pub async fn delete(&self, id: Uuid) -> Result<(), ClientError> {
        self.with_entries(|entries| {
            let index = entries
                .iter()
                .position(|e| e.id() == id && !e.is_deleted())
                .ok_or(ClientError::NotFound(id))?;
            let entry = entries.remove(index);
            if let Some(tombstone) = entry.delete() {
                entries.insert(index, tombstone);
            }
            Ok(())
        })
        .await?;
        debug!(todo_id = %id, "local todo deleted");
        Ok(())
    }

    /// Deletes every completed todo; returns how many were removed.
    pub async fn clear_completed(&self) -> Result<usize, ClientError> {
        self.with_entries(|entries| {
            let mut cleared = 0;
            let mut kept = Vec::with_capacity(entries.len());
            for entry in entries.drain(..) {
                let completed = matches!(&entry, LocalTodo::Active(r) if r.is_completed);
                if !completed {
                    kept.push(entry);
                    continue;
                }
                cleared += 1;
                kept.extend(entry.delete());
            }
            *entries = kept;
            Ok(cleared)
        })
        .await
    }

    pub async fn replace(&self, todos: Vec<LocalTodo>) -> Result<(), ClientError> {
        self.with_entries(move |entries| {
            *entries = todos;
            Ok(())
        })
        .await
    }

    /// Upserts by local id.
    pub async fn merge(&self, todos: Vec<LocalTodo>) -> Result<(), ClientError> {
        self.with_entries(move |entries| {
            for todo in todos {
                match entries.iter_mut().find(|e| e.id() == todo.id()) {
                    Some(existing) => *existing = todo,
                    None => entries.push(todo),
                }
            }
            Ok(())
        })
        .await
    }

    /// Entries the next sync has to upload, tombstones included.
    pub async fn pending_count(&self) -> Result<usize, ClientError> {
        Ok(self
            .entries()
            .await?
            .iter()
            .filter(|e| e.has_pending_changes())
            .count())
    }
}

fn find_active(entries: &mut [LocalTodo], id: Uuid) -> Result<&mut TodoRecord, ClientError> {
    entries
        .iter_mut()
        .find_map(|entry| match entry {
            LocalTodo::Active(record) if record.id == id => Some(record),
            _ => None,
        })
        .ok_or(ClientError::NotFound(id))
}

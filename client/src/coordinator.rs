use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{ClientError, RemoteError};
use crate::local::LocalTodoService;
use crate::record::{LocalTodo, Priority, TodoRecord};
use crate::remote::dto::RemoteTodo;
use crate::remote::{Connectivity, RemoteTodoApi};
use crate::sync::{ConflictPolicy, SyncEngine, SyncReport};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Offline,
    Online,
}

/// CRUD surface shared by both modes.
#[async_trait]
pub trait TodoBackend: Send + Sync {
    async fn list(&self) -> Result<Vec<TodoRecord>, ClientError>;
    async fn create(
        &self,
        title: &str,
        priority: Priority,
        due_date: Option<DateTime<Utc>>,
    ) -> Result<TodoRecord, ClientError>;
    async fn update(&self, record: TodoRecord) -> Result<TodoRecord, ClientError>;
    async fn toggle(&self, id: Uuid) -> Result<TodoRecord, ClientError>;
    async fn delete(&self, id: Uuid) -> Result<(), ClientError>;
    async fn clear_completed(&self) -> Result<usize, ClientError>;
}

/// Offline mode: straight to the local store.
pub struct OfflineTodos {
    local: Arc<LocalTodoService>,
}

impl OfflineTodos {
    pub fn new(local: Arc<LocalTodoService>) -> Self {
        Self { local }
    }
}

#[async_trait]
impl TodoBackend for OfflineTodos {
    async fn list(&self) -> Result<Vec<TodoRecord>, ClientError> {
        self.local.list().await
    }

    async fn create(
        &self,
        title: &str,
        priority: Priority,
        due_date: Option<DateTime<Utc>>,
    ) -> Result<TodoRecord, ClientError> {
        self.local.create(title, priority, due_date).await
    }

    async fn update(&self, record: TodoRecord) -> Result<TodoRecord, ClientError> {
        self.local.update(record).await
    }

    async fn toggle(&self, id: Uuid) -> Result<TodoRecord, ClientError> {
        self.local.toggle(id).await
    }

    async fn delete(&self, id: Uuid) -> Result<(), ClientError> {
        self.local.delete(id).await
    }

    async fn clear_completed(&self) -> Result<usize, ClientError> {
        self.local.clear_completed().await
    }
}

/// Online mode: the server first, then a mirror write into the local store.
pub struct OnlineTodos {
    local: Arc<LocalTodoService>,
    remote: Arc<dyn RemoteTodoApi>,
}

impl OnlineTodos {
    pub fn new(local: Arc<LocalTodoService>, remote: Arc<dyn RemoteTodoApi>) -> Self {
        Self { local, remote }
    }

    /// Stores the server's version of the todo under `local_id`, or as a new
    /// entry when no local counterpart exists.
    async fn mirror(&self, local_id: Option<Uuid>, remote: RemoteTodo) -> Result<TodoRecord, ClientError> {
        self.local
            .with_entries(move |entries| {
                let existing = entries.iter_mut().find(|e| {
                    Some(e.id()) == local_id || e.server_id() == Some(remote.id.as_str())
                });
                match existing {
                    Some(entry) => {
                        let mut record = entry.clone().into_record();
                        record.absorb_remote(&remote);
                        *entry = LocalTodo::Active(record.clone());
                        Ok(record)
                    }
                    None => {
                        let record = TodoRecord::from_remote(&remote);
                        entries.push(LocalTodo::Active(record.clone()));
                        Ok(record)
                    }
                }
            })
            .await
    }

    /// Sends the current state of `record` to the server.
    async fn push(&self, record: &TodoRecord) -> Result<RemoteTodo, ClientError> {
        let remote = match record.to_remote() {
            Some(todo) => self.remote.update_todo(&todo).await?,
            None => self.remote.create_todo(&record.to_draft()).await?,
        };
        Ok(remote)
    }

    async fn remove(&self, record: &TodoRecord) -> Result<(), ClientError> {
        if let Some(server_id) = record.server_id.as_deref() {
            match self.remote.delete_todo(server_id).await {
                Ok(()) | Err(RemoteError::NotFound) => {}
                Err(e) => return Err(e.into()),
            }
        }
        let id = record.id;
        self.local
            .with_entries(move |entries| {
                entries.retain(|e| e.id() != id);
                Ok(())
            })
            .await
    }
}

#[async_trait]
impl TodoBackend for OnlineTodos {
    /// Refreshes the mirror from the server; entries with unsent local edits
    /// are left alone.
    async fn list(&self) -> Result<Vec<TodoRecord>, ClientError> {
        let remote = self.remote.list_todos().await?;
        self.local
            .with_entries(move |entries| {
                let index: HashMap<String, usize> = entries
                    .iter()
                    .enumerate()
                    .filter_map(|(i, e)| e.server_id().map(|sid| (sid.to_string(), i)))
                    .collect();
                for todo in &remote {
                    match index.get(&todo.id) {
                        Some(&i) => {
                            if let LocalTodo::Active(record) = &mut entries[i] {
                                if record.is_synced {
                                    record.absorb_remote(todo);
                                }
                            }
                        }
                        None => entries.push(LocalTodo::Active(TodoRecord::from_remote(todo))),
                    }
                }
                Ok(())
            })
            .await?;
        self.local.list().await
    }

    async fn create(
        &self,
        title: &str,
        priority: Priority,
        due_date: Option<DateTime<Utc>>,
    ) -> Result<TodoRecord, ClientError> {
        let draft = TodoRecord::new(title, priority, due_date).to_draft();
        let remote = self.remote.create_todo(&draft).await?;
        self.mirror(None, remote).await
    }

    async fn update(&self, record: TodoRecord) -> Result<TodoRecord, ClientError> {
        let mut stored = self.local.get(record.id).await?;
        stored.title = record.title;
        stored.is_completed = record.is_completed;
        stored.priority = record.priority;
        stored.due_date = record.due_date;
        let remote = self.push(&stored).await?;
        self.mirror(Some(stored.id), remote).await
    }

    async fn toggle(&self, id: Uuid) -> Result<TodoRecord, ClientError> {
        let mut stored = self.local.get(id).await?;
        stored.is_completed = !stored.is_completed;
        let remote = self.push(&stored).await?;
        self.mirror(Some(id), remote).await
    }

    async fn delete(&self, id: Uuid) -> Result<(), ClientError> {
        let stored = self.local.get(id).await?;
        self.remove(&stored).await
    }

    async fn clear_completed(&self) -> Result<usize, ClientError> {
        let completed: Vec<TodoRecord> = self
            .local
            .list()
            .await?
            .into_iter()
            .filter(|r| r.is_completed)
            .collect();
        for record in &completed {
            self.remove(record).await?;
        }
        Ok(completed.len())
    }
}

/// Clears the syncing flag when dropped.
struct SyncGuard<'a>(&'a AtomicBool);

impl Drop for SyncGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Switches between offline and online operation and owns the sync actions.
pub struct TodoCoordinator {
    local: Arc<LocalTodoService>,
    connectivity: Arc<dyn Connectivity>,
    engine: SyncEngine,
    offline: OfflineTodos,
    online: OnlineTodos,
    is_online: AtomicBool,
    syncing: AtomicBool,
}

impl TodoCoordinator {
    pub fn new(
        local: Arc<LocalTodoService>,
        remote: Arc<dyn RemoteTodoApi>,
        connectivity: Arc<dyn Connectivity>,
        policy: ConflictPolicy,
    ) -> Self {
        Self {
            engine: SyncEngine::new(local.clone(), remote.clone(), policy),
            offline: OfflineTodos::new(local.clone()),
            online: OnlineTodos::new(local.clone(), remote),
            local,
            connectivity,
            is_online: AtomicBool::new(false),
            syncing: AtomicBool::new(false),
        }
    }

    pub fn mode(&self) -> Mode {
        if self.is_online.load(Ordering::SeqCst) {
            Mode::Online
        } else {
            Mode::Offline
        }
    }

    pub fn is_syncing(&self) -> bool {
        self.syncing.load(Ordering::SeqCst)
    }

    pub async fn pending_count(&self) -> Result<usize, ClientError> {
        self.local.pending_count().await
    }

    fn backend(&self) -> &dyn TodoBackend {
        match self.mode() {
            Mode::Offline => &self.offline,
            Mode::Online => &self.online,
        }
    }

    /// Requires connectivity. Pending local changes are synced right away;
    /// the report of that pass is returned.
    pub async fn go_online(&self) -> Result<Option<SyncReport>, ClientError> {
        if !self.connectivity.is_online().await {
            warn!("cannot go online without connectivity");
            return Err(ClientError::Offline);
        }
        self.is_online.store(true, Ordering::SeqCst);
        info!("switched to online mode");

        if self.local.pending_count().await? == 0 {
            return Ok(None);
        }
        let _guard = self.begin_sync()?;
        Ok(Some(self.engine.sync().await?))
    }

    pub fn go_offline(&self) {
        self.is_online.store(false, Ordering::SeqCst);
        info!("switched to offline mode");
    }

    pub async fn sync_now(&self) -> Result<SyncReport, ClientError> {
        self.ensure_connected().await?;
        let _guard = self.begin_sync()?;
        self.engine.sync().await
    }

    pub async fn full_download(&self) -> Result<SyncReport, ClientError> {
        self.ensure_connected().await?;
        let _guard = self.begin_sync()?;
        self.engine.full_download().await
    }

    pub async fn full_upload(&self) -> Result<SyncReport, ClientError> {
        self.ensure_connected().await?;
        let _guard = self.begin_sync()?;
        self.engine.full_upload().await
    }

    async fn ensure_connected(&self) -> Result<(), ClientError> {
        if self.mode() != Mode::Online {
            return Err(ClientError::NotOnline);
        }
        if !self.connectivity.is_online().await {
            return Err(ClientError::Offline);
        }
        Ok(())
    }

    fn begin_sync(&self) -> Result<SyncGuard<'_>, ClientError> {
        self.syncing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| ClientError::SyncInProgress)?;
        Ok(SyncGuard(&self.syncing))
    }

    pub async fn list(&self) -> Result<Vec<TodoRecord>, ClientError> {
        self.backend().list().await
    }

    pub async fn create(
        &self,
        title: &str,
        priority: Priority,
        due_date: Option<DateTime<Utc>>,
    ) -> Result<TodoRecord, ClientError> {
        self.backend().create(title, priority, due_date).await
    }

    pub async fn update(&self, record: TodoRecord) -> Result<TodoRecord, ClientError> {
        self.backend().update(record).await
    }

    pub async fn toggle(&self, id: Uuid) -> Result<TodoRecord, ClientError> {
        self.backend().toggle(id).await
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), ClientError> {
        self.backend().delete(id).await
    }

    pub async fn clear_completed(&self) -> Result<usize, ClientError> {
        self.backend().clear_completed().await
    }
}

//! Reconciles the local store with the server in one upload, download and
//! cleanup pass.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{ClientError, RemoteError};
use crate::local::LocalTodoService;
use crate::record::{LocalTodo, TodoRecord};
use crate::remote::RemoteTodoApi;
use crate::remote::dto::RemoteTodo;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictPolicy {
    LocalWins,
    RemoteWins,
    #[default]
    MergeLatest,
    /// Leaves conflicts for the caller.
    Manual,
}

impl FromStr for ConflictPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "local-wins" => Ok(ConflictPolicy::LocalWins),
            "remote-wins" => Ok(ConflictPolicy::RemoteWins),
            "merge-latest" => Ok(ConflictPolicy::MergeLatest),
            "manual" => Ok(ConflictPolicy::Manual),
            other => Err(format!("unknown conflict policy: {}", other)),
        }
    }
}

impl fmt::Display for ConflictPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConflictPolicy::LocalWins => "local-wins",
            ConflictPolicy::RemoteWins => "remote-wins",
            ConflictPolicy::MergeLatest => "merge-latest",
            ConflictPolicy::Manual => "manual",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Resolution {
    KeepLocal,
    TakeRemote,
}

impl ConflictPolicy {
    fn resolve(self, local: &TodoRecord, remote: &RemoteTodo) -> Option<Resolution> {
        match self {
            ConflictPolicy::LocalWins => Some(Resolution::KeepLocal),
            ConflictPolicy::RemoteWins => Some(Resolution::TakeRemote),
            // Ties go to the server.
            ConflictPolicy::MergeLatest if local.modified_at() > remote.modified_at() => {
                Some(Resolution::KeepLocal)
            }
            ConflictPolicy::MergeLatest => Some(Resolution::TakeRemote),
            ConflictPolicy::Manual => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncConflict {
    pub local: TodoRecord,
    pub remote: RemoteTodo,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "message", rename_all = "snake_case")]
pub enum SyncOutcome {
    Success,
    NoChanges,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncReport {
    pub local_changes_uploaded: usize,
    pub server_changes_downloaded: usize,
    pub conflicts_resolved: usize,
    pub unresolved_conflicts: Vec<SyncConflict>,
    pub outcome: SyncOutcome,
}

impl Default for SyncReport {
    fn default() -> Self {
        Self {
            local_changes_uploaded: 0,
            server_changes_downloaded: 0,
            conflicts_resolved: 0,
            unresolved_conflicts: Vec::new(),
            outcome: SyncOutcome::NoChanges,
        }
    }
}

impl SyncReport {
    pub fn is_success(&self) -> bool {
        !matches!(self.outcome, SyncOutcome::Failed(_))
    }

    fn has_changes(&self) -> bool {
        self.local_changes_uploaded > 0
            || self.server_changes_downloaded > 0
            || self.conflicts_resolved > 0
            || !self.unresolved_conflicts.is_empty()
    }

    fn finish(mut self) -> Self {
        self.outcome = if self.has_changes() {
            SyncOutcome::Success
        } else {
            SyncOutcome::NoChanges
        };
        self
    }

    fn fail(mut self, err: &RemoteError) -> Self {
        self.outcome = SyncOutcome::Failed(format!("failed to fetch server todos: {}", err));
        self
    }
}

/// What the server did with one pending entry.
enum Uploaded {
    Created {
        id: Uuid,
        snapshot: Option<DateTime<Utc>>,
        remote: RemoteTodo,
    },
    Updated {
        id: Uuid,
        snapshot: Option<DateTime<Utc>>,
        remote: RemoteTodo,
    },
    Deleted {
        id: Uuid,
    },
}

pub struct SyncEngine {
    local: Arc<LocalTodoService>,
    remote: Arc<dyn RemoteTodoApi>,
    policy: ConflictPolicy,
}

impl SyncEngine {
    pub fn new(
        local: Arc<LocalTodoService>,
        remote: Arc<dyn RemoteTodoApi>,
        policy: ConflictPolicy,
    ) -> Self {
        Self {
            local,
            remote,
            policy,
        }
    }

    pub fn policy(&self) -> ConflictPolicy {
        self.policy
    }

    /// One sync pass. Remote failures end up in the report; only storage
    /// failures are returned as errors.
    pub async fn sync(&self) -> Result<SyncReport, ClientError> {
        info!(policy = %self.policy, "Starting sync...");
        let mut report = SyncReport::default();

        let pending: Vec<LocalTodo> = self
            .local
            .entries()
            .await?
            .into_iter()
            .filter(LocalTodo::has_pending_changes)
            .collect();

        info!("Step 1: Uploading {} local changes", pending.len());
        let uploaded = self.upload(&pending).await;
        report.local_changes_uploaded = uploaded.len();
        if !uploaded.is_empty() {
            self.local
                .with_entries(|entries| {
                    apply_uploads(entries, uploaded);
                    Ok(())
                })
                .await?;
        }

        info!("Step 2: Downloading server todos");
        let remote = match self.remote.list_todos().await {
            Ok(remote) => remote,
            Err(e) => {
                warn!("sync aborted: {}", e);
                return Ok(report.fail(&e));
            }
        };
        if pending.is_empty() && remote.is_empty() {
            info!("Nothing to sync");
            self.local
                .with_entries(|entries| {
                    entries.retain(|e| !e.is_purgeable());
                    Ok(())
                })
                .await?;
            return Ok(report.finish());
        }

        info!("Step 3: Reconciling {} server todos", remote.len());
        let policy = self.policy;
        report = self
            .local
            .with_entries(move |entries| {
                reconcile(entries, &remote, policy, &mut report);
                entries.retain(|e| !e.is_purgeable());
                Ok(report)
            })
            .await?;

        let report = report.finish();
        info!(
            uploaded = report.local_changes_uploaded,
            downloaded = report.server_changes_downloaded,
            conflicts = report.conflicts_resolved,
            unresolved = report.unresolved_conflicts.len(),
            "Sync completed"
        );
        Ok(report)
    }

    /// Pushes each pending entry; a failing entry is logged and skipped.
    async fn upload(&self, pending: &[LocalTodo]) -> Vec<Uploaded> {
        let mut uploaded = Vec::new();
        for entry in pending {
            match self.upload_one(entry).await {
                Ok(Some(done)) => uploaded.push(done),
                Ok(None) => {}
                Err(e) => warn!(todo_id = %entry.id(), "failed to upload todo: {}", e),
            }
        }
        uploaded
    }

    async fn upload_one(&self, entry: &LocalTodo) -> Result<Option<Uploaded>, RemoteError> {
        let record = entry.record();
        let snapshot = record.last_modified;
        match entry {
            LocalTodo::Tombstoned { .. } => {
                if let Some(server_id) = record.server_id.as_deref() {
                    match self.remote.delete_todo(server_id).await {
                        Ok(()) | Err(RemoteError::NotFound) => {}
                        Err(e) => return Err(e),
                    }
                }
                Ok(Some(Uploaded::Deleted { id: record.id }))
            }
            LocalTodo::Active(record) => match record.to_remote() {
                None => {
                    let remote = self.remote.create_todo(&record.to_draft()).await?;
                    Ok(Some(Uploaded::Created {
                        id: record.id,
                        snapshot,
                        remote,
                    }))
                }
                Some(todo) => match self.remote.update_todo(&todo).await {
                    Ok(remote) => Ok(Some(Uploaded::Updated {
                        id: record.id,
                        snapshot,
                        remote,
                    })),
                    Err(RemoteError::NotFound) => {
                        warn!(todo_id = %record.id, "server lost todo, creating it again");
                        let remote = self.remote.create_todo(&record.to_draft()).await?;
                        Ok(Some(Uploaded::Created {
                            id: record.id,
                            snapshot,
                            remote,
                        }))
                    }
                    Err(e) => Err(e),
                },
            },
        }
    }

    /// Replaces the local list with the server's.
    pub async fn full_download(&self) -> Result<SyncReport, ClientError> {
        let mut report = SyncReport::default();
        let remote = match self.remote.list_todos().await {
            Ok(remote) => remote,
            Err(e) => return Ok(report.fail(&e)),
        };
        report.server_changes_downloaded = remote.len();
        let todos = remote
            .iter()
            .map(|r| LocalTodo::Active(TodoRecord::from_remote(r)))
            .collect();
        self.local.replace(todos).await?;
        info!(count = report.server_changes_downloaded, "full download completed");
        Ok(report.finish())
    }

    /// Pushes every local entry regardless of its sync flag.
    pub async fn full_upload(&self) -> Result<SyncReport, ClientError> {
        let mut report = SyncReport::default();
        let entries = self.local.entries().await?;
        let uploaded = self.upload(&entries).await;
        report.local_changes_uploaded = uploaded.len();
        self.local
            .with_entries(|entries| {
                apply_uploads(entries, uploaded);
                entries.retain(|e| !e.is_purgeable());
                Ok(())
            })
            .await?;
        info!(count = report.local_changes_uploaded, "full upload completed");
        Ok(report.finish())
    }
}

/// Writes upload results back. A record edited while its upload was in
/// flight keeps its server id but stays pending.
fn apply_uploads(entries: &mut [LocalTodo], uploaded: Vec<Uploaded>) {
    let mut by_id: HashMap<Uuid, &mut LocalTodo> = entries.iter_mut().map(|e| (e.id(), e)).collect();
    for done in uploaded {
        match done {
            Uploaded::Created {
                id,
                snapshot,
                remote,
            }
            | Uploaded::Updated {
                id,
                snapshot,
                remote,
            } => {
                let Some(entry) = by_id.get_mut(&id) else {
                    continue;
                };
                let deleted = entry.is_deleted();
                let record = entry.record_mut();
                if record.last_modified == snapshot && !deleted {
                    record.absorb_remote(&remote);
                } else {
                    record.server_id = Some(remote.id.clone());
                }
            }
            Uploaded::Deleted { id } => {
                if let Some(entry) = by_id.get_mut(&id) {
                    entry.confirm_deleted();
                }
            }
        }
    }
}

fn reconcile(
    entries: &mut Vec<LocalTodo>,
    remote: &[RemoteTodo],
    policy: ConflictPolicy,
    report: &mut SyncReport,
) {
    let index: HashMap<String, usize> = entries
        .iter()
        .enumerate()
        .filter_map(|(i, e)| e.server_id().map(|sid| (sid.to_string(), i)))
        .collect();

    let mut inserted = Vec::new();
    for todo in remote {
        let Some(&i) = index.get(&todo.id) else {
            inserted.push(LocalTodo::Active(TodoRecord::from_remote(todo)));
            report.server_changes_downloaded += 1;
            continue;
        };

        let LocalTodo::Active(record) = &mut entries[i] else {
            // Pending deletions are not resurrected.
            continue;
        };
        if record.is_synced {
            if todo.modified_at() > record.modified_at() {
                record.absorb_remote(todo);
                report.server_changes_downloaded += 1;
            }
            continue;
        }

        match policy.resolve(record, todo) {
            Some(Resolution::KeepLocal) => {
                record.is_synced = true;
                report.conflicts_resolved += 1;
            }
            Some(Resolution::TakeRemote) => {
                record.absorb_remote(todo);
                report.conflicts_resolved += 1;
            }
            None => report.unresolved_conflicts.push(SyncConflict {
                local: record.clone(),
                remote: todo.clone(),
            }),
        }
    }
    entries.extend(inserted);
}

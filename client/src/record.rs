//! The on-device todo record and its sync metadata.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::remote::dto::{RemoteTodo, TodoDraft};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

impl Priority {
    fn rank(self) -> u8 {
        match self {
            Priority::High => 2,
            Priority::Medium => 1,
            Priority::Low => 0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        }
    }
}

/// `High > Medium > Low`.
impl Ord for Priority {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank().cmp(&other.rank())
    }
}

impl PartialOrd for Priority {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "high" => Ok(Priority::High),
            "medium" => Ok(Priority::Medium),
            "low" => Ok(Priority::Low),
            other => Err(format!("unknown priority: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TodoRecord {
    pub id: Uuid,
    pub server_id: Option<String>,
    pub title: String,
    pub is_completed: bool,
    pub priority: Priority,
    pub due_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub last_modified: Option<DateTime<Utc>>,
    pub is_synced: bool,
}

impl TodoRecord {
    /// A fresh local-only record. Empty titles are accepted.
    pub fn new(title: impl Into<String>, priority: Priority, due_date: Option<DateTime<Utc>>) -> Self {
        Self {
            id: Uuid::new_v4(),
            server_id: None,
            title: title.into(),
            is_completed: false,
            priority,
            due_date,
            created_at: Utc::now(),
            last_modified: None,
            is_synced: false,
        }
    }

    /// A record mirroring a server todo, already in sync.
    pub fn from_remote(remote: &RemoteTodo) -> Self {
        Self {
            id: Uuid::new_v4(),
            server_id: Some(remote.id.clone()),
            title: remote.title.clone(),
            is_completed: remote.is_completed,
            priority: remote.priority,
            due_date: remote.due_date,
            created_at: remote.created_at,
            last_modified: Some(remote.modified_at()),
            is_synced: true,
        }
    }

    pub fn is_local(&self) -> bool {
        self.server_id.is_none()
    }

    pub fn has_server_version(&self) -> bool {
        self.server_id.is_some()
    }

    /// Timestamp used to order competing versions.
    pub fn modified_at(&self) -> DateTime<Utc> {
        self.last_modified.unwrap_or(self.created_at)
    }

    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        !self.is_completed && self.due_date.is_some_and(|due| due < now)
    }

    /// Marks a local mutation.
    pub(crate) fn touch(&mut self) {
        self.last_modified = Some(Utc::now());
        self.is_synced = false;
    }

    /// Takes the server's version of every shared field, keeping the local id.
    pub(crate) fn absorb_remote(&mut self, remote: &RemoteTodo) {
        self.server_id = Some(remote.id.clone());
        self.title = remote.title.clone();
        self.is_completed = remote.is_completed;
        self.priority = remote.priority;
        self.due_date = remote.due_date;
        self.created_at = remote.created_at;
        self.last_modified = Some(remote.modified_at());
        self.is_synced = true;
    }

    pub fn to_draft(&self) -> TodoDraft {
        TodoDraft {
            title: self.title.clone(),
            is_completed: self.is_completed,
            priority: self.priority,
            due_date: self.due_date,
        }
    }

    /// Wire form for an update; `None` for records the server has never seen.
    pub fn to_remote(&self) -> Option<RemoteTodo> {
        let server_id = self.server_id.clone()?;
        Some(RemoteTodo {
            id: server_id,
            title: self.title.clone(),
            description: None,
            is_completed: self.is_completed,
            priority: self.priority,
            due_date: self.due_date,
            created_at: self.created_at,
            updated_at: self.last_modified,
        })
    }
}

/// A stored entry. Deleted records that the server still knows about stay
/// behind as tombstones until the deletion has been propagated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum LocalTodo {
    Active(TodoRecord),
    Tombstoned {
        record: TodoRecord,
        pending_remote_delete: bool,
    },
}

impl LocalTodo {
    pub fn record(&self) -> &TodoRecord {
        match self {
            LocalTodo::Active(record) | LocalTodo::Tombstoned { record, .. } => record,
        }
    }

    pub(crate) fn record_mut(&mut self) -> &mut TodoRecord {
        match self {
            LocalTodo::Active(record) | LocalTodo::Tombstoned { record, .. } => record,
        }
    }

    pub fn into_record(self) -> TodoRecord {
        match self {
            LocalTodo::Active(record) | LocalTodo::Tombstoned { record, .. } => record,
        }
    }

    pub fn id(&self) -> Uuid {
        self.record().id
    }

    pub fn server_id(&self) -> Option<&str> {
        self.record().server_id.as_deref()
    }

    pub fn is_local(&self) -> bool {
        self.record().is_local()
    }

    pub fn is_deleted(&self) -> bool {
        matches!(self, LocalTodo::Tombstoned { .. })
    }

    pub fn is_synced(&self) -> bool {
        match self {
            LocalTodo::Active(record) => record.is_synced,
            LocalTodo::Tombstoned {
                pending_remote_delete,
                ..
            } => !pending_remote_delete,
        }
    }

    /// Live record with local edits the server has not seen.
    pub fn needs_sync(&self) -> bool {
        !self.is_synced() && !self.is_deleted()
    }

    /// Anything the upload phase has to push, tombstones included.
    pub fn has_pending_changes(&self) -> bool {
        !self.is_synced()
    }

    /// Deletes the entry: `None` when it can simply disappear, otherwise a
    /// tombstone awaiting remote deletion.
    pub(crate) fn delete(self) -> Option<LocalTodo> {
        let mut record = self.into_record();
        if record.is_local() {
            return None;
        }
        record.touch();
        Some(LocalTodo::Tombstoned {
            record,
            pending_remote_delete: true,
        })
    }

    /// Records that the server has confirmed the deletion.
    pub(crate) fn confirm_deleted(&mut self) {
        if let LocalTodo::Tombstoned {
            record,
            pending_remote_delete,
        } = self
        {
            *pending_remote_delete = false;
            record.is_synced = true;
        }
    }

    /// Safe to drop from the store: tombstoned and confirmed on the server.
    pub fn is_purgeable(&self) -> bool {
        matches!(
            self,
            LocalTodo::Tombstoned {
                pending_remote_delete: false,
                ..
            }
        )
    }
}

/// Incomplete first, then priority (high first), then oldest first.
pub fn sort_for_display(records: &mut [TodoRecord]) {
    records.sort_by(|a, b| {
        a.is_completed
            .cmp(&b.is_completed)
            .then_with(|| b.priority.cmp(&a.priority))
            .then_with(|| a.created_at.cmp(&b.created_at))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn server_record() -> TodoRecord {
        let mut record = TodoRecord::new("synced", Priority::Low, None);
        record.server_id = Some("42".to_string());
        record.is_synced = true;
        record
    }

    #[test]
    fn new_record_is_local_and_unsynced() {
        let record = TodoRecord::new("Buy milk", Priority::Medium, None);
        let entry = LocalTodo::Active(record);
        assert!(entry.is_local());
        assert!(entry.needs_sync());
        assert!(!entry.is_deleted());
    }

    #[test]
    fn priority_orders_high_first() {
        assert!(Priority::High > Priority::Medium);
        assert!(Priority::Medium > Priority::Low);
        assert_eq!("HIGH".parse::<Priority>(), Ok(Priority::High));
        assert!("urgent".parse::<Priority>().is_err());
    }

    #[test]
    fn overdue_needs_past_due_and_open() {
        let now = Utc::now();
        let mut record = TodoRecord::new("t", Priority::Medium, Some(now - Duration::hours(1)));
        assert!(record.is_overdue(now));
        record.is_completed = true;
        assert!(!record.is_overdue(now));
        record.is_completed = false;
        record.due_date = Some(now + Duration::hours(1));
        assert!(!record.is_overdue(now));
        record.due_date = None;
        assert!(!record.is_overdue(now));
    }

    #[test]
    fn deleting_local_only_record_is_hard() {
        let entry = LocalTodo::Active(TodoRecord::new("t", Priority::Medium, None));
        assert!(entry.delete().is_none());
    }

    #[test]
    fn deleting_server_record_leaves_tombstone() {
        let tombstone = LocalTodo::Active(server_record())
            .delete()
            .expect("server records are tombstoned");
        assert!(tombstone.is_deleted());
        assert!(!tombstone.is_synced());
        assert!(!tombstone.needs_sync());
        assert!(tombstone.has_pending_changes());
        assert!(!tombstone.is_purgeable());

        let mut confirmed = tombstone;
        confirmed.confirm_deleted();
        assert!(confirmed.is_synced());
        assert!(confirmed.is_purgeable());
    }

    #[test]
    fn display_order() {
        let mut done = TodoRecord::new("done", Priority::High, None);
        done.is_completed = true;
        let low = TodoRecord::new("low", Priority::Low, None);
        let high = TodoRecord::new("high", Priority::High, None);
        let mut records = vec![done, low, high];
        sort_for_display(&mut records);
        let titles: Vec<_> = records.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["high", "low", "done"]);
    }

    #[test]
    fn store_format_is_tagged() {
        let entry = LocalTodo::Active(server_record()).delete().unwrap();
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["state"], "tombstoned");
        assert_eq!(json["pending_remote_delete"], true);
        let back: LocalTodo = serde_json::from_value(json).unwrap();
        assert_eq!(back, entry);
    }
}

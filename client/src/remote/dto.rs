use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::record::Priority;

/// A todo as the server sees it. Sync metadata never appears here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteTodo {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub is_completed: bool,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl RemoteTodo {
    pub fn modified_at(&self) -> DateTime<Utc> {
        self.updated_at.unwrap_or(self.created_at)
    }
}

/// Body of a create request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TodoDraft {
    pub title: String,
    pub is_completed: bool,
    pub priority: Priority,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<DateTime<Utc>>,
}

/// Body of an update request.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct TodoUpdate<'a> {
    pub title: &'a str,
    pub is_completed: bool,
    pub priority: Priority,
    /// Always sent; `null` clears the server's due date.
    pub due_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<&'a str>,
}

impl<'a> From<&'a RemoteTodo> for TodoUpdate<'a> {
    fn from(todo: &'a RemoteTodo) -> Self {
        Self {
            title: &todo.title,
            is_completed: todo.is_completed,
            priority: todo.priority,
            due_date: todo.due_date,
            description: todo.description.as_deref(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct Envelope<T> {
    #[allow(dead_code)]
    pub success: bool,
    #[serde(default)]
    pub message: String,
    pub data: Option<T>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PageEnvelope<T> {
    pub data: Vec<T>,
    pub pagination: PageInfo,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PageInfo {
    pub page: i64,
    pub has_next: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    pub message: String,
}

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::info;
use uuid::Uuid;

use crate::db::todo_repository;
use crate::error::AppError;
use crate::models::{NewTodoRequest, Todo, TodoQuery, UpdateTodoRequest};
use crate::response::Pagination;
use crate::validation;

pub const DEFAULT_PAGE_SIZE: i64 = 10;
pub const MAX_PAGE_SIZE: i64 = 100;

pub struct TodoService {
    db: SqlitePool,
}

impl TodoService {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    pub async fn create(&self, user_id: &str, req: NewTodoRequest) -> Result<Todo, AppError> {
        validation::validate_new_todo(&req)?;
        let todo = todo_repository::insert_todo(&self.db, user_id, req).await?;
        info!(todo_id = %todo.id, user_id, "todo created");
        Ok(todo)
    }

    /// Another user's todo is reported as missing rather than forbidden.
    pub async fn get(&self, user_id: &str, id: &str) -> Result<Todo, AppError> {
        let todo = self.find(id).await?;
        if todo.user_id != user_id {
            return Err(AppError::NotFound);
        }
        Ok(todo)
    }

    pub async fn list(
        &self,
        user_id: &str,
        query: TodoQuery,
    ) -> Result<(Vec<Todo>, Pagination), AppError> {
        let (page, limit) = normalize_page(query.page, query.limit);
        let offset = (page - 1) * limit;
        let (todos, total) =
            todo_repository::fetch_todos_for_user(&self.db, user_id, query.completed, offset, limit)
                .await?;
        Ok((todos, Pagination::new(page, limit, total)))
    }

    pub async fn update(
        &self,
        user_id: &str,
        id: &str,
        req: UpdateTodoRequest,
    ) -> Result<Todo, AppError> {
        validation::validate_update_todo(&req)?;
        let mut todo = self.find(id).await?;
        if todo.user_id != user_id {
            return Err(AppError::Forbidden("unauthorized to update this todo".to_string()));
        }

        if let Some(title) = req.title {
            todo.title = title.trim().to_string();
        }
        if let Some(description) = req.description {
            todo.description = description;
        }
        if let Some(is_completed) = req.is_completed {
            todo.is_completed = is_completed;
        }
        if let Some(priority) = req.priority {
            todo.priority = priority;
        }
        if let Some(due_date) = req.due_date {
            todo.due_date = due_date;
        }
        todo.updated_at = Utc::now();

        if !todo_repository::save_todo(&self.db, &todo).await? {
            return Err(AppError::NotFound);
        }
        Ok(todo)
    }

    pub async fn delete(&self, user_id: &str, id: &str) -> Result<(), AppError> {
        let todo = self.find(id).await?;
        if todo.user_id != user_id {
            return Err(AppError::Forbidden("unauthorized to delete this todo".to_string()));
        }
        if !todo_repository::soft_delete_todo(&self.db, id).await? {
            return Err(AppError::NotFound);
        }
        info!(todo_id = id, user_id, "todo deleted");
        Ok(())
    }

    async fn find(&self, id: &str) -> Result<Todo, AppError> {
        Uuid::parse_str(id).map_err(|_| AppError::BadRequest("Invalid todo ID".to_string()))?;
        todo_repository::fetch_todo(&self.db, id)
            .await?
            .ok_or(AppError::NotFound)
    }
}

fn normalize_page(page: Option<i64>, limit: Option<i64>) -> (i64, i64) {
    let page = page.filter(|p| *p >= 1).unwrap_or(1);
    let limit = match limit {
        Some(l) if l >= 1 => l.min(MAX_PAGE_SIZE),
        _ => DEFAULT_PAGE_SIZE,
    };
    (page, limit)
}

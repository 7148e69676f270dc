use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::models::{NewTodoRequest, Todo};

const TODO_COLUMNS: &str = r#"
    id, user_id, title, description, is_completed, priority,
    due_date, created_at, updated_at
"#;

pub async fn insert_todo(
    db: &SqlitePool,
    user_id: &str,
    req: NewTodoRequest,
) -> Result<Todo, sqlx::Error> {
    let now = Utc::now();
    let todo = Todo {
        id: Uuid::new_v4().to_string(),
        user_id: user_id.to_string(),
        title: req.title.trim().to_string(),
        description: req.description,
        is_completed: req.is_completed,
        priority: req.priority,
        due_date: req.due_date,
        created_at: now,
        updated_at: now,
    };

    sqlx::query(
        r#"
        INSERT INTO todos
            (id, user_id, title, description, is_completed, priority,
            due_date, created_at, updated_at, deleted_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, NULL)
        "#,
    )
    .bind(&todo.id)
    .bind(&todo.user_id)
    .bind(&todo.title)
    .bind(&todo.description)
    .bind(todo.is_completed)
    .bind(todo.priority)
    .bind(todo.due_date)
    .bind(todo.created_at)
    .bind(todo.updated_at)
    .execute(db)
    .await?;

    Ok(todo)
}

/// Soft-deleted rows are invisible here.
pub async fn fetch_todo(db: &SqlitePool, id: &str) -> Result<Option<Todo>, sqlx::Error> {
    let sql = format!(
        "SELECT {} FROM todos WHERE id = ? AND deleted_at IS NULL",
        TODO_COLUMNS
    );
    sqlx::query_as::<_, Todo>(&sql)
        .bind(id)
        .fetch_optional(db)
        .await
}

/// One page of a user's todos, newest first, plus the total row count.
pub async fn fetch_todos_for_user(
    db: &SqlitePool,
    user_id: &str,
    completed: Option<bool>,
    offset: i64,
    limit: i64,
) -> Result<(Vec<Todo>, i64), sqlx::Error> {
    let total: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM todos
        WHERE user_id = ?1 AND deleted_at IS NULL
          AND (?2 IS NULL OR is_completed = ?2)
        "#,
    )
    .bind(user_id)
    .bind(completed)
    .fetch_one(db)
    .await?;

    let sql = format!(
        r#"
        SELECT {} FROM todos
        WHERE user_id = ?1 AND deleted_at IS NULL
          AND (?2 IS NULL OR is_completed = ?2)
        ORDER BY created_at DESC, rowid DESC
        LIMIT ?3 OFFSET ?4
        "#,
        TODO_COLUMNS
    );
    let todos = sqlx::query_as::<_, Todo>(&sql)
        .bind(user_id)
        .bind(completed)
        .bind(limit)
        .bind(offset)
        .fetch_all(db)
        .await?;

    Ok((todos, total))
}

pub async fn save_todo(db: &SqlitePool, todo: &Todo) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE todos
        SET title = ?1, description = ?2, is_completed = ?3, priority = ?4,
            due_date = ?5, updated_at = ?6
        WHERE id = ?7 AND deleted_at IS NULL
        "#,
    )
    .bind(&todo.title)
    .bind(&todo.description)
    .bind(todo.is_completed)
    .bind(todo.priority)
    .bind(todo.due_date)
    .bind(todo.updated_at)
    .bind(&todo.id)
    .execute(db)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn soft_delete_todo(db: &SqlitePool, id: &str) -> Result<bool, sqlx::Error> {
    let now = Utc::now();
    let result = sqlx::query(
        "UPDATE todos SET deleted_at = ?1, updated_at = ?1 WHERE id = ?2 AND deleted_at IS NULL",
    )
    .bind(now)
    .bind(id)
    .execute(db)
    .await?;

    Ok(result.rows_affected() > 0)
}

use chrono::Utc;
use sqlx::SqlitePool;

use crate::models::User;

const USER_COLUMNS: &str = r#"
    id, email, password_hash, name, is_active, apple_id,
    is_private_email, auth_provider, created_at, updated_at
"#;

pub async fn insert_user(db: &SqlitePool, user: &User) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO users
            (id, email, password_hash, name, is_active, apple_id,
            is_private_email, auth_provider, created_at, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        "#,
    )
    .bind(&user.id)
    .bind(&user.email)
    .bind(&user.password_hash)
    .bind(&user.name)
    .bind(user.is_active)
    .bind(&user.apple_id)
    .bind(user.is_private_email)
    .bind(&user.auth_provider)
    .bind(user.created_at)
    .bind(user.updated_at)
    .execute(db)
    .await?;
    Ok(())
}

pub async fn fetch_user_by_id(db: &SqlitePool, id: &str) -> Result<Option<User>, sqlx::Error> {
    fetch_user_where(db, "id", id).await
}

pub async fn fetch_user_by_email(db: &SqlitePool, email: &str) -> Result<Option<User>, sqlx::Error> {
    fetch_user_where(db, "email", email).await
}

pub async fn fetch_user_by_apple_id(
    db: &SqlitePool,
    apple_id: &str,
) -> Result<Option<User>, sqlx::Error> {
    fetch_user_where(db, "apple_id", apple_id).await
}

async fn fetch_user_where(
    db: &SqlitePool,
    column: &'static str,
    value: &str,
) -> Result<Option<User>, sqlx::Error> {
    let sql = format!("SELECT {} FROM users WHERE {} = ?", USER_COLUMNS, column);
    sqlx::query_as::<_, User>(&sql)
        .bind(value)
        .fetch_optional(db)
        .await
}

/// Attaches an Apple identity to an existing (email) account.
pub async fn link_apple_id(
    db: &SqlitePool,
    user_id: &str,
    apple_id: &str,
    is_private_email: bool,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE users SET apple_id = ?1, is_private_email = ?2, updated_at = ?3 WHERE id = ?4",
    )
    .bind(apple_id)
    .bind(is_private_email)
    .bind(Utc::now())
    .bind(user_id)
    .execute(db)
    .await?;
    Ok(result.rows_affected() > 0)
}

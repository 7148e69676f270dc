use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Response;

use crate::auth::AuthUser;
use crate::error::AppError;
use crate::models::{NewTodoRequest, TodoQuery, UpdateTodoRequest};
use crate::response;
use crate::state::AppState;

pub async fn create_todo(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<NewTodoRequest>,
) -> Result<Response, AppError> {
    let todo = state.todo_service().create(&user.user_id, req).await?;
    Ok(response::success(StatusCode::CREATED, "Todo created successfully", todo))
}

pub async fn list_todos(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<TodoQuery>,
) -> Result<Response, AppError> {
    let (todos, pagination) = state.todo_service().list(&user.user_id, query).await?;
    Ok(response::paginated("Todos retrieved successfully", todos, pagination))
}

pub async fn get_todo(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let todo = state.todo_service().get(&user.user_id, &id).await?;
    Ok(response::success(StatusCode::OK, "Todo retrieved successfully", todo))
}

pub async fn update_todo(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    Json(req): Json<UpdateTodoRequest>,
) -> Result<Response, AppError> {
    let todo = state.todo_service().update(&user.user_id, &id, req).await?;
    Ok(response::success(StatusCode::OK, "Todo updated successfully", todo))
}

pub async fn delete_todo(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    state.todo_service().delete(&user.user_id, &id).await?;
    Ok(response::message(StatusCode::OK, "Todo deleted successfully"))
}

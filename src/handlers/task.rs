//! 任务处理器
//! 可见性与修改权限由 TaskService 判定

use crate::{
    auth::middleware::AuthContext,
    error::AppError,
    middleware::AppState,
    models::task::{CreateTaskRequest, TaskQuery, UpdateTaskRequest},
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::sync::Arc;

/// 列出任务，支持 `event_id`、`completed` 过滤
pub async fn list_tasks(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
    Query(query): Query<TaskQuery>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.task_service.list(&auth_context, query).await?))
}

pub async fn create_task(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
    Json(req): Json<CreateTaskRequest>,
) -> Result<impl IntoResponse, AppError> {
    let task = state.task_service.create(&auth_context, req).await?;
    Ok((StatusCode::CREATED, Json(task)))
}

pub async fn get_task(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.task_service.get(&auth_context, id).await?))
}

pub async fn update_task(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
    Path(id): Path<i64>,
    Json(req): Json<UpdateTaskRequest>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.task_service.update(&auth_context, id, req).await?))
}

pub async fn delete_task(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    state.task_service.delete(&auth_context, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

//! 比赛周末处理器

use crate::{
    auth::middleware::AuthContext,
    error::AppError,
    middleware::AppState,
    models::event::{CreateEventRequest, UpdateEventRequest},
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::sync::Arc;

pub async fn list_events(
    State(state): State<Arc<AppState>>,
    _auth_context: AuthContext,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.event_service.list().await?))
}

pub async fn get_event(
    State(state): State<Arc<AppState>>,
    _auth_context: AuthContext,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.event_service.get(id).await?))
}

/// 创建事件（仅管理员）
pub async fn create_event(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
    Json(req): Json<CreateEventRequest>,
) -> Result<impl IntoResponse, AppError> {
    let event = state.event_service.create(&auth_context, req).await?;
    Ok((StatusCode::CREATED, Json(event)))
}

/// 修改事件（仅管理员）
pub async fn update_event(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
    Path(id): Path<i64>,
    Json(req): Json<UpdateEventRequest>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.event_service.update(&auth_context, id, req).await?))
}

/// 删除事件及其任务（仅管理员）
pub async fn delete_event(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    state.event_service.delete(&auth_context, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

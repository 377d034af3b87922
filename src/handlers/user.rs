//! 用户管理处理器

use crate::{
    auth::middleware::AuthContext,
    error::AppError,
    middleware::AppState,
    models::user::{Role, UpdateRoleRequest, UserResponse},
};
use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use std::sync::Arc;

/// 修改用户角色（仅管理员）
pub async fn update_role(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
    Path(user_id): Path<i64>,
    Json(req): Json<UpdateRoleRequest>,
) -> Result<impl IntoResponse, AppError> {
    auth_context.require_role(Role::Admin)?;

    let user = state.auth_service.set_role(user_id, req.role).await?;

    tracing::info!(
        actor_id = auth_context.user_id,
        target_id = user.id,
        role = %user.role,
        "Role changed by admin"
    );

    Ok(Json(UserResponse::from(user)))
}

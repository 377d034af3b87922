//! 路由注册
//! 创建所有 API 路由并应用中间件

use axum::{
    routing::{get, patch, post},
    Router,
};
use std::sync::Arc;
use tower_http::limit::RequestBodyLimitLayer;

use crate::{handlers, middleware::AppState};

/// 请求体上限
const MAX_BODY_BYTES: usize = 64 * 1024;

/// 创建应用路由
pub fn create_router(state: Arc<AppState>) -> Router {
    // 公开端点（健康检查）
    let public_routes = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/ready", get(handlers::health::readiness_check));

    // 认证路由（无需认证）
    let auth_routes = Router::new()
        .route("/v1/auth/register", post(handlers::auth::register))
        .route("/v1/auth/login", post(handlers::auth::login));

    // 需要认证的路由，认证之后按用户限流
    // route_layer 只作用于已匹配的路由，未知路径仍返回 404
    let authenticated_routes = Router::new()
        .route("/v1/auth/me", get(handlers::auth::get_current_user))
        .route("/v1/users/{id}/role", patch(handlers::user::update_role))
        .route(
            "/v1/events",
            get(handlers::event::list_events).post(handlers::event::create_event),
        )
        .route(
            "/v1/events/{id}",
            get(handlers::event::get_event)
                .patch(handlers::event::update_event)
                .delete(handlers::event::delete_event),
        )
        .route(
            "/v1/tasks",
            get(handlers::task::list_tasks).post(handlers::task::create_task),
        )
        .route(
            "/v1/tasks/{id}",
            get(handlers::task::get_task)
                .patch(handlers::task::update_task)
                .delete(handlers::task::delete_task),
        )
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            crate::middleware::rate_limit_middleware,
        ))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            crate::auth::middleware::jwt_auth_middleware,
        ));

    // 组合所有路由
    Router::new()
        .merge(public_routes)
        .merge(auth_routes)
        .merge(authenticated_routes)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(axum::middleware::from_fn(crate::middleware::request_tracking_middleware))
        .with_state(state)
}

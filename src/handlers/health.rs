//! 健康检查处理器
//! 提供 /health 和 /ready 端点

use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;

use crate::middleware::AppState;

/// 存活探针响应
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: i64,
}

/// 就绪探针响应
#[derive(Serialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    pub checks: Vec<HealthCheck>,
}

/// 健康检查项
#[derive(Serialize)]
pub struct HealthCheck {
    pub name: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// 存活探针
/// 快速响应，不检查依赖
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: (Utc::now() - state.started_at).num_seconds(),
    })
}

/// 就绪探针
/// 检查数据库和计数存储
pub async fn readiness_check(
    State(state): State<Arc<AppState>>,
) -> (StatusCode, Json<ReadinessResponse>) {
    let db_health = state.users.ping().await;
    let store_health = state.rate_limiter.store().ping().await;

    let checks = vec![
        HealthCheck {
            name: "database".to_string(),
            status: if db_health.is_ok() { "healthy" } else { "unhealthy" }.to_string(),
            message: db_health.err().map(|e| e.user_message()),
        },
        HealthCheck {
            name: "counter_store".to_string(),
            status: if store_health.is_ok() { "healthy" } else { "unhealthy" }.to_string(),
            message: store_health.err().map(|e| e.to_string()),
        },
    ];

    let ready = checks.iter().all(|c| c.status == "healthy");
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status, Json(ReadinessResponse { ready, checks }))
}

//! HTTP 中间件
//! 请求追踪、按用户限流

use crate::{
    auth::{AuthContext, CredentialHasher, PasswordPolicy, TokenService},
    config::{AppConfig, StoreFailurePolicy},
    error::AppError,
    rate_limit::{store::CounterStore, RateLimiter},
    repository::{Repositories, UserRepository},
    services::{AuthService, EventService, TaskService},
};
use axum::{
    extract::{Request, State},
    http::{HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Instant;
use tracing::Instrument;
use uuid::Uuid;

/// 应用状态
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub repos: Repositories,
    pub users: Arc<dyn UserRepository>,
    pub auth_service: Arc<AuthService>,
    pub event_service: Arc<EventService>,
    pub task_service: Arc<TaskService>,
    pub token_service: Arc<TokenService>,
    /// 用户级限流器
    pub rate_limiter: Arc<RateLimiter>,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    /// 按配置装配所有服务
    pub fn new(
        config: AppConfig,
        repos: Repositories,
        counter_store: Arc<dyn CounterStore>,
    ) -> Result<Self, AppError> {
        let users = repos.users.clone();
        let hasher = Arc::new(CredentialHasher::from_config(&config.security)?);
        let token_service = Arc::new(TokenService::from_config(&config.security)?);
        let auth_service = Arc::new(AuthService::new(
            users.clone(),
            hasher,
            token_service.clone(),
            PasswordPolicy::from_config(&config.security),
        )?);
        let event_service = Arc::new(EventService::new(repos.events.clone(), repos.tasks.clone()));
        let task_service = Arc::new(TaskService::new(
            repos.tasks.clone(),
            repos.events.clone(),
            users.clone(),
        ));
        let rate_limiter = Arc::new(RateLimiter::new(counter_store, &config.rate_limit)?);

        Ok(Self {
            config,
            repos,
            users,
            auth_service,
            event_service,
            task_service,
            token_service,
            rate_limiter,
            started_at: Utc::now(),
        })
    }
}

/// 请求追踪中间件
/// 为每个请求生成 trace_id 和 request_id，并记录指标
pub async fn request_tracking_middleware(req: Request, next: Next) -> Response {
    let trace_id = extract_or_generate_trace_id(req.headers());
    let request_id = Uuid::new_v4().to_string();

    let method = req.method().to_string();
    let path = req.uri().path().to_string();

    let span = tracing::info_span!(
        "http_request",
        trace_id = %trace_id,
        request_id = %request_id,
        method = %method,
        path = %path,
    );

    async move {
        let start = Instant::now();

        let mut response = next.run(req).await;

        let elapsed = start.elapsed();
        let status = response.status().as_u16();

        // 指标标签只使用有限取值
        let method_name = match method.as_str() {
            "GET" => "GET",
            "POST" => "POST",
            "PUT" => "PUT",
            "DELETE" => "DELETE",
            "PATCH" => "PATCH",
            _ => "UNKNOWN",
        };
        let status_code = match status {
            200 => "200",
            201 => "201",
            204 => "204",
            400 => "400",
            401 => "401",
            403 => "403",
            404 => "404",
            409 => "409",
            422 => "422",
            429 => "429",
            500 => "500",
            503 => "503",
            _ => "other",
        };

        metrics::counter!(crate::telemetry::HTTP_REQUESTS_TOTAL, "method" => method_name, "status" => status_code)
            .increment(1);
        metrics::histogram!(crate::telemetry::HTTP_REQUEST_DURATION_SECONDS).record(elapsed.as_secs_f64());

        tracing::info!(
            method = %method,
            path = %path,
            status = status,
            elapsed_ms = elapsed.as_millis(),
            "Request completed"
        );

        if let Ok(value) = HeaderValue::from_str(&trace_id) {
            response.headers_mut().insert("x-trace-id", value);
        }
        if let Ok(value) = HeaderValue::from_str(&request_id) {
            response.headers_mut().insert("x-request-id", value);
        }

        response
    }
    .instrument(span)
    .await
}

/// 从请求头中提取或生成 trace_id
fn extract_or_generate_trace_id(headers: &HeaderMap) -> String {
    headers
        .get("x-trace-id")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

/// 速率限制中间件
/// 以已认证用户 ID 为限流键，必须挂在 JWT 认证中间件之内
pub async fn rate_limit_middleware(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let identity = req
        .extensions()
        .get::<AuthContext>()
        .map(|ctx| ctx.user_id.to_string())
        .ok_or_else(|| AppError::unauthorized("Missing bearer token."))?;

    match state.rate_limiter.check_and_increment(&identity).await {
        Ok(status) if status.allowed => {
            let mut response = next.run(req).await;
            status.apply_headers(response.headers_mut());
            Ok(response)
        }
        Ok(status) => {
            tracing::warn!(
                user_id = %identity,
                path = %req.uri().path(),
                limit = status.limit,
                reset_at = status.reset_at,
                "Rate limit exceeded"
            );
            Err(AppError::RateLimitExceeded(status))
        }
        Err(e) => {
            let policy = state.rate_limiter.failure_policy();
            metrics::counter!(crate::telemetry::RATE_LIMIT_STORE_FAILURES_TOTAL, "policy" => policy.as_str())
                .increment(1);

            match policy {
                StoreFailurePolicy::Open => {
                    tracing::warn!(user_id = %identity, error = %e, "Rate limit store unavailable, failing open");
                    Ok(next.run(req).await)
                }
                StoreFailurePolicy::Closed => {
                    tracing::error!(user_id = %identity, error = %e, "Rate limit store unavailable, failing closed");
                    Err(AppError::RateLimitStore(e))
                }
            }
        }
    }
}

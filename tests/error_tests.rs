//! 错误处理单元测试
//!
//! 测试应用错误类型的各种行为

use axum::{http::StatusCode, response::IntoResponse};
use http_body_util::BodyExt;
use race_weekend_api::{
    auth::TokenError,
    error::AppError,
    rate_limit::{store::StoreError, RateLimitStatus},
};
use std::time::Duration;

// ==================== 错误状态码测试 ====================

#[test]
fn test_error_status_codes() {
    assert_eq!(AppError::unauthorized("Invalid token.").status_code(), StatusCode::UNAUTHORIZED);
    assert_eq!(AppError::Forbidden.status_code(), StatusCode::FORBIDDEN);
    assert_eq!(AppError::NotFound("resource".to_string()).status_code(), StatusCode::NOT_FOUND);
    assert_eq!(
        AppError::BadRequest("invalid".to_string()).status_code(),
        StatusCode::BAD_REQUEST
    );
    assert_eq!(
        AppError::Validation("error".to_string()).status_code(),
        StatusCode::UNPROCESSABLE_ENTITY
    );
    assert_eq!(AppError::Conflict("dup".to_string()).status_code(), StatusCode::CONFLICT);
    assert_eq!(
        AppError::RateLimitStore(StoreError::Timeout(Duration::from_millis(250))).status_code(),
        StatusCode::SERVICE_UNAVAILABLE
    );
    assert_eq!(
        AppError::Config("bad".to_string()).status_code(),
        StatusCode::INTERNAL_SERVER_ERROR
    );
}

// ==================== 令牌错误转换 ====================

#[test]
fn test_token_errors_become_unauthorized() {
    let expired: AppError = TokenError::Expired.into();
    assert_eq!(expired.status_code(), StatusCode::UNAUTHORIZED);
    assert_eq!(expired.user_message(), "Token expired.");

    let invalid: AppError = TokenError::Invalid.into();
    assert_eq!(invalid.status_code(), StatusCode::UNAUTHORIZED);
    assert_eq!(invalid.user_message(), "Invalid token.");
}

// ==================== 用户消息测试 ====================

#[test]
fn test_user_messages_no_sensitive_info() {
    let store_error = AppError::from(StoreError::Unavailable("redis://10.0.0.5 refused".to_string()));
    let message = store_error.user_message();
    assert_eq!(message, "Service temporarily unavailable");
    assert!(!message.contains("redis"));

    let config_error = AppError::Config("Missing JWT secret".to_string());
    assert_eq!(config_error.user_message(), "Configuration error");

    let internal = AppError::internal_error("Password hashing task failed");
    assert_eq!(internal.user_message(), "Internal server error");
}

#[test]
fn test_user_messages_for_client_errors() {
    assert_eq!(AppError::Forbidden.user_message(), "Access denied");
    assert_eq!(
        AppError::not_found("user 7").user_message(),
        "Resource not found: user 7"
    );
    assert_eq!(
        AppError::validation("Password must contain at least one digit").user_message(),
        "Password must contain at least one digit"
    );
}

// ==================== 响应格式测试 ====================

#[tokio::test]
async fn test_error_response_body() {
    let response = AppError::unauthorized("Invalid credentials.").into_response();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();

    assert_eq!(json["error"]["code"], 401);
    assert_eq!(json["error"]["message"], "Invalid credentials.");
    assert!(json["error"]["request_id"].is_string());
}

#[test]
fn test_rate_limited_response_has_headers() {
    let response = AppError::RateLimitExceeded(RateLimitStatus {
        allowed: false,
        limit: 100,
        remaining: 0,
        reset_at: 1_700_000_040,
    })
    .into_response();

    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(response.headers().get("X-RateLimit-Limit").unwrap(), "100");
    assert_eq!(response.headers().get("X-RateLimit-Remaining").unwrap(), "0");
    assert_eq!(response.headers().get("X-RateLimit-Reset").unwrap(), "1700000040");
}

#[test]
fn test_other_errors_have_no_rate_limit_headers() {
    let response = AppError::Forbidden.into_response();
    assert!(response.headers().get("X-RateLimit-Limit").is_none());
}

// ==================== 错误显示测试 ====================

#[test]
fn test_error_display() {
    assert_eq!(format!("{}", AppError::Forbidden), "Access denied");
    assert_eq!(
        format!("{}", AppError::BadRequest("Invalid input".to_string())),
        "Invalid request: Invalid input"
    );
    assert_eq!(
        format!("{}", AppError::RateLimitStore(StoreError::Unavailable("down".to_string()))),
        "Rate limit store unavailable: counter store unavailable: down"
    );
}

#[tokio::test]
async fn test_database_error_hides_driver_detail() {
    let error = AppError::from(sqlx::Error::Protocol(
        "password authentication failed for user race".to_string(),
    ));
    assert_eq!(error.status_code(), StatusCode::INTERNAL_SERVER_ERROR);

    let response = error.into_response();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();

    assert_eq!(json["error"]["message"], "Database error occurred");
    assert!(!bytes.windows(8).any(|w| w == b"password"));
}

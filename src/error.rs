//! 统一错误模型
//! 定义所有错误类型和错误响应格式

use crate::{
    auth::jwt::TokenError,
    rate_limit::{store::StoreError, RateLimitStatus},
};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use thiserror::Error;

/// 结果类型别名
pub type Result<T> = std::result::Result<T, AppError>;

/// 应用错误类型
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    /// 401，消息原样返回给客户端
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Access denied")]
    Forbidden,

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded(RateLimitStatus),

    #[error("Rate limit store unavailable: {0}")]
    RateLimitStore(#[from] StoreError),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// 获取 HTTP 状态码
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::RateLimitExceeded(_) => StatusCode::TOO_MANY_REQUESTS,
            AppError::RateLimitStore(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Database(_) | AppError::Config(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// 获取用户友好的错误消息（不包含敏感信息）
    pub fn user_message(&self) -> String {
        match self {
            AppError::Unauthorized(msg) => msg.clone(),
            AppError::Forbidden => "Access denied".to_string(),
            AppError::NotFound(msg) => format!("Resource not found: {}", msg),
            AppError::BadRequest(msg) => msg.clone(),
            AppError::Validation(msg) => msg.clone(),
            AppError::Conflict(msg) => msg.clone(),
            AppError::RateLimitExceeded(_) => "Rate limit exceeded".to_string(),
            AppError::RateLimitStore(_) => "Service temporarily unavailable".to_string(),
            AppError::Database(_) => "Database error occurred".to_string(),
            AppError::Config(_) => "Configuration error".to_string(),
            AppError::Internal(_) => "Internal server error".to_string(),
        }
    }

    /// 获取错误码
    pub fn code(&self) -> u16 {
        self.status_code().as_u16()
    }

    // 便捷方法
    pub fn unauthorized(msg: &str) -> Self {
        AppError::Unauthorized(msg.to_string())
    }

    pub fn not_found(msg: &str) -> Self {
        AppError::NotFound(msg.to_string())
    }

    pub fn validation(msg: &str) -> Self {
        AppError::Validation(msg.to_string())
    }

    pub fn internal_error(msg: &str) -> Self {
        AppError::Internal(msg.to_string())
    }
}

/// 错误响应 DTO
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: u16,
    pub message: String,
    pub request_id: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let request_id = uuid::Uuid::new_v4().to_string();

        let error_response = ErrorResponse {
            error: ErrorDetail {
                code: self.code(),
                message: self.user_message(),
                request_id,
            },
        };

        // 记录错误日志
        if status.is_server_error() {
            tracing::error!(
                code = self.code(),
                message = %self,
                request_id = %error_response.error.request_id,
                "Application error"
            );
        } else {
            tracing::debug!(
                code = self.code(),
                message = %self,
                request_id = %error_response.error.request_id,
                "Request rejected"
            );
        }

        let mut response = (status, Json(error_response)).into_response();

        // 429 必须携带配额头，客户端据此退避
        if let AppError::RateLimitExceeded(rate_status) = &self {
            rate_status.apply_headers(response.headers_mut());
        }

        response
    }
}

/// 令牌错误统一折叠为 401，只保留消息文本上的区别
impl From<TokenError> for AppError {
    fn from(e: TokenError) -> Self {
        AppError::Unauthorized(e.to_string())
    }
}

/// 从 config::ConfigError 转换
impl From<config::ConfigError> for AppError {
    fn from(e: config::ConfigError) -> Self {
        AppError::Config(e.to_string())
    }
}

/// 请求体校验失败
impl From<validator::ValidationErrors> for AppError {
    fn from(e: validator::ValidationErrors) -> Self {
        AppError::Validation(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(AppError::unauthorized("Invalid token.").code(), 401);
        assert_eq!(AppError::Forbidden.code(), 403);
        assert_eq!(AppError::NotFound("test".to_string()).code(), 404);
        assert_eq!(AppError::BadRequest("test".to_string()).code(), 400);
        assert_eq!(AppError::validation("weak").code(), 422);
        assert_eq!(AppError::Conflict("dup".to_string()).code(), 409);
        assert_eq!(
            AppError::RateLimitStore(StoreError::Unavailable("down".to_string())).code(),
            503
        );
    }

    #[test]
    fn test_token_errors_collapse_to_unauthorized() {
        let expired: AppError = TokenError::Expired.into();
        let invalid: AppError = TokenError::Invalid.into();

        assert_eq!(expired.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(invalid.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(expired.user_message(), "Token expired.");
        assert_eq!(invalid.user_message(), "Invalid token.");
    }

    #[test]
    fn test_user_message_no_sensitive_info() {
        let error = AppError::RateLimitStore(StoreError::Unavailable(
            "redis://:hunter2@10.0.0.5 refused".to_string(),
        ));
        let message = error.user_message();
        assert_eq!(message, "Service temporarily unavailable");
        assert!(!message.contains("hunter2"));
    }
}

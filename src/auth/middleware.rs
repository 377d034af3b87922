//! JWT 认证中间件

use crate::{
    auth::jwt::TokenError, error::AppError, middleware::AppState, models::user::Role,
    telemetry::TOKEN_REJECTIONS_TOTAL,
};
use axum::{
    extract::{FromRequestParts, Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

/// 认证上下文（附加到请求扩展）
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: i64,
    pub email: String,
    pub role: Role,
}

impl AuthContext {
    /// 角色不匹配时返回 Forbidden
    pub fn require_role(&self, role: Role) -> Result<(), AppError> {
        if self.role == role {
            Ok(())
        } else {
            tracing::debug!(user_id = self.user_id, role = %self.role, required = %role, "Role check failed");
            Err(AppError::Forbidden)
        }
    }
}

// 实现 FromRequestParts 以便在 handler 中直接提取 AuthContext
impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthContext>()
            .cloned()
            .ok_or_else(|| AppError::unauthorized("Missing bearer token."))
    }
}

/// 从 Authorization 头提取令牌
pub fn extract_token(headers: &HeaderMap) -> Result<&str, AppError> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split_once(' '))
        .filter(|(scheme, token)| scheme.eq_ignore_ascii_case("bearer") && !token.trim().is_empty())
        .map(|(_, token)| token.trim())
        .ok_or_else(|| AppError::unauthorized("Missing bearer token."))
}

/// JWT 认证中间件 - 必须认证
///
/// 角色以用户记录为准，而不是令牌里签发时的角色。
pub async fn jwt_auth_middleware(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let claims = {
        let token = extract_token(req.headers())?;
        state.token_service.decode_token(token).map_err(|e| {
            let reason = match e {
                TokenError::Expired => "expired",
                TokenError::Invalid => "invalid",
            };
            metrics::counter!(TOKEN_REJECTIONS_TOTAL, "reason" => reason).increment(1);
            AppError::from(e)
        })?
    };

    let user_id: i64 = claims.sub.parse().map_err(|_| {
        tracing::debug!(sub = %claims.sub, "Token subject is not a user id");
        AppError::unauthorized("Invalid token.")
    })?;

    let user = state.users.find_by_id(user_id).await?.ok_or_else(|| {
        tracing::debug!(user_id, "Token subject no longer exists");
        AppError::unauthorized("Invalid token.")
    })?;

    if user.role.as_str() != claims.role {
        tracing::debug!(user_id, token_role = %claims.role, current_role = %user.role, "Role changed since token issue");
    }

    req.extensions_mut().insert(AuthContext {
        user_id: user.id,
        email: user.email,
        role: user.role,
    });

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_token_valid() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", "Bearer test_token_123".parse().unwrap());
        assert_eq!(extract_token(&headers).unwrap(), "test_token_123");

        headers.insert("authorization", "bearer lower_case".parse().unwrap());
        assert_eq!(extract_token(&headers).unwrap(), "lower_case");
    }

    #[test]
    fn test_extract_token_missing() {
        let headers = HeaderMap::new();
        assert!(extract_token(&headers).is_err());
    }

    #[test]
    fn test_extract_token_invalid_format() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", "InvalidFormat".parse().unwrap());
        assert!(extract_token(&headers).is_err());

        headers.insert("authorization", "Basic dXNlcjpwYXNz".parse().unwrap());
        assert!(extract_token(&headers).is_err());

        headers.insert("authorization", "Bearer ".parse().unwrap());
        assert!(extract_token(&headers).is_err());
    }

    #[test]
    fn test_require_role() {
        let ctx = AuthContext {
            user_id: 1,
            email: "u@x.com".to_string(),
            role: Role::User,
        };
        assert!(matches!(ctx.require_role(Role::Admin), Err(AppError::Forbidden)));
        assert!(ctx.require_role(Role::User).is_ok());
    }
}

//! 认证服务：注册、登录、角色变更

use crate::{
    auth::{CredentialHasher, PasswordPolicy, TokenService},
    error::AppError,
    models::{auth::*, user::*},
    repository::UserRepository,
    telemetry::{AUTH_LOGINS_TOTAL, TOKENS_ISSUED_TOTAL},
};
use std::sync::Arc;
use validator::Validate;

/// Login failure message; identical for unknown email and wrong password.
const INVALID_CREDENTIALS: &str = "Invalid credentials.";

pub struct AuthService {
    users: Arc<dyn UserRepository>,
    hasher: Arc<CredentialHasher>,
    token_service: Arc<TokenService>,
    policy: PasswordPolicy,
    /// 未知邮箱时用于比对的哈希，使耗时与密码错误一致
    dummy_hash: String,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        hasher: Arc<CredentialHasher>,
        token_service: Arc<TokenService>,
        policy: PasswordPolicy,
    ) -> Result<Self, AppError> {
        let dummy_hash = hasher.hash_password(&uuid::Uuid::new_v4().to_string())?;

        Ok(Self {
            users,
            hasher,
            token_service,
            policy,
            dummy_hash,
        })
    }

    /// 在阻塞线程池上计算哈希，不占用异步工作线程
    pub async fn hash_password(&self, password: String) -> Result<String, AppError> {
        let hasher = self.hasher.clone();
        tokio::task::spawn_blocking(move || hasher.hash_password(&password))
            .await
            .map_err(|e| AppError::Internal(format!("Password hashing task failed: {}", e)))?
    }

    /// 在阻塞线程池上校验密码
    pub async fn verify_password(&self, password: String, stored_hash: String) -> Result<bool, AppError> {
        let hasher = self.hasher.clone();
        tokio::task::spawn_blocking(move || hasher.verify_password(&password, &stored_hash))
            .await
            .map_err(|e| AppError::Internal(format!("Password verification task failed: {}", e)))
    }

    /// 用户注册
    pub async fn register(&self, req: RegisterRequest) -> Result<User, AppError> {
        req.validate()?;
        self.policy.validate(&req.password)?;

        if self.users.find_by_email(&req.email).await?.is_some() {
            return Err(AppError::Conflict("Email already registered.".to_string()));
        }

        let password_hash = self.hash_password(req.password).await?;

        let user = self
            .users
            .create(NewUser {
                email: req.email,
                password_hash,
                role: Role::User,
            })
            .await?;

        tracing::info!(user_id = user.id, "User registered");

        Ok(user)
    }

    /// 用户登录
    pub async fn login(&self, req: LoginRequest) -> Result<TokenResponse, AppError> {
        req.validate()?;

        let user = self.users.find_by_email(&req.email).await?;

        // 用户不存在时也完整执行一次校验
        let stored_hash = user
            .as_ref()
            .map(|u| u.password_hash.clone())
            .unwrap_or_else(|| self.dummy_hash.clone());
        let password_ok = self.verify_password(req.password, stored_hash).await?;

        let user = match user {
            Some(user) if password_ok => user,
            _ => {
                metrics::counter!(AUTH_LOGINS_TOTAL, "outcome" => "failure").increment(1);
                tracing::info!("Login failed");
                return Err(AppError::unauthorized(INVALID_CREDENTIALS));
            }
        };

        let access_token = self
            .token_service
            .create_access_token(user.id, user.role.as_str())?;

        metrics::counter!(AUTH_LOGINS_TOTAL, "outcome" => "success").increment(1);
        metrics::counter!(TOKENS_ISSUED_TOTAL).increment(1);
        tracing::info!(user_id = user.id, "User logged in");

        Ok(TokenResponse {
            access_token,
            token_type: "bearer".to_string(),
            expires_in: self.token_service.lifetime_secs(),
        })
    }

    /// 变更用户角色
    pub async fn set_role(&self, user_id: i64, role: Role) -> Result<User, AppError> {
        let user = self
            .users
            .update_role(user_id, role)
            .await?
            .ok_or_else(|| AppError::not_found(&format!("user {}", user_id)))?;

        tracing::info!(user_id, role = %role, "User role updated");

        Ok(user)
    }

    /// 确保存在指定邮箱的管理员：不存在则创建，已存在则提升为管理员
    ///
    /// 新建账号同样受密码策略约束；已存在账号的密码保持不变。
    pub async fn ensure_admin(&self, email: &str, password: &str) -> Result<User, AppError> {
        if let Some(user) = self.users.find_by_email(email).await? {
            if user.role == Role::Admin {
                return Ok(user);
            }
            tracing::info!(user_id = user.id, "Promoting bootstrap account to admin");
            return self.set_role(user.id, Role::Admin).await;
        }

        let req = RegisterRequest {
            email: email.to_string(),
            password: password.to_string(),
        };
        req.validate()?;
        self.policy.validate(&req.password)?;

        let password_hash = self.hash_password(req.password).await?;
        let user = self
            .users
            .create(NewUser {
                email: req.email,
                password_hash,
                role: Role::Admin,
            })
            .await?;

        tracing::info!(user_id = user.id, "Bootstrap admin created");

        Ok(user)
    }
}

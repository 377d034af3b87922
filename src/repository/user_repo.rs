//! User repository (数据访问层)

use crate::{error::AppError, models::user::*};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::{mapref::entry::Entry, DashMap};
use sqlx::PgPool;
use std::sync::atomic::{AtomicI64, Ordering};

/// Persistence seam for user records
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// 根据 ID 查找用户
    async fn find_by_id(&self, id: i64) -> Result<Option<User>, AppError>;

    /// 根据邮箱查找用户
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError>;

    /// 创建用户，邮箱重复时返回 Conflict
    async fn create(&self, new_user: NewUser) -> Result<User, AppError>;

    /// 更新角色
    async fn update_role(&self, id: i64, role: Role) -> Result<Option<User>, AppError>;

    /// 存储连通性检查
    async fn ping(&self) -> Result<(), AppError> {
        Ok(())
    }
}

/// 邮箱按小写、去空白后比较和存储
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Process-local user store
#[derive(Default)]
pub struct InMemoryUserRepository {
    users: DashMap<i64, User>,
    /// lowercase email -> id
    email_index: DashMap<String, i64>,
    next_id: AtomicI64,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn find_by_id(&self, id: i64) -> Result<Option<User>, AppError> {
        Ok(self.users.get(&id).map(|u| u.clone()))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let Some(id) = self
            .email_index
            .get(&normalize_email(email))
            .map(|id| *id)
        else {
            return Ok(None);
        };

        self.find_by_id(id).await
    }

    async fn create(&self, new_user: NewUser) -> Result<User, AppError> {
        let email = normalize_email(&new_user.email);

        // 在邮箱索引的条目锁内分配 ID，保证并发注册时邮箱唯一
        match self.email_index.entry(email.clone()) {
            Entry::Occupied(_) => Err(AppError::Conflict("Email already registered.".to_string())),
            Entry::Vacant(slot) => {
                let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
                let user = User {
                    id,
                    email,
                    password_hash: new_user.password_hash,
                    role: new_user.role,
                    created_at: Utc::now(),
                };
                self.users.insert(id, user.clone());
                slot.insert(id);
                Ok(user)
            }
        }
    }

    async fn update_role(&self, id: i64, role: Role) -> Result<Option<User>, AppError> {
        Ok(self.users.get_mut(&id).map(|mut user| {
            user.role = role;
            user.clone()
        }))
    }
}

// ==================== PostgreSQL ====================

#[derive(sqlx::FromRow)]
struct UserRow {
    id: i64,
    email: String,
    password_hash: String,
    role: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = AppError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let role = row.role.parse::<Role>().map_err(|e| {
            tracing::error!(user_id = row.id, "Corrupt role column: {}", e);
            AppError::Internal(format!("Invalid role for user {}: {}", row.id, e))
        })?;

        Ok(User {
            id: row.id,
            email: row.email,
            password_hash: row.password_hash,
            role,
            created_at: row.created_at,
        })
    }
}

/// PostgreSQL-backed users
pub struct PgUserRepository {
    db: PgPool,
}

impl PgUserRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn find_by_id(&self, id: i64) -> Result<Option<User>, AppError> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, email, password_hash, role, created_at FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;

        row.map(User::try_from).transpose()
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, email, password_hash, role, created_at FROM users WHERE email = $1",
        )
        .bind(normalize_email(email))
        .fetch_optional(&self.db)
        .await?;

        row.map(User::try_from).transpose()
    }

    async fn create(&self, new_user: NewUser) -> Result<User, AppError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            INSERT INTO users (email, password_hash, role)
            VALUES ($1, $2, $3)
            RETURNING id, email, password_hash, role, created_at
            "#,
        )
        .bind(normalize_email(&new_user.email))
        .bind(&new_user.password_hash)
        .bind(new_user.role.as_str())
        .fetch_one(&self.db)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                AppError::Conflict("Email already registered.".to_string())
            }
            other => AppError::Database(other),
        })?;

        User::try_from(row)
    }

    async fn update_role(&self, id: i64, role: Role) -> Result<Option<User>, AppError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            UPDATE users
            SET role = $2
            WHERE id = $1
            RETURNING id, email, password_hash, role, created_at
            "#,
        )
        .bind(id)
        .bind(role.as_str())
        .fetch_optional(&self.db)
        .await?;

        row.map(User::try_from).transpose()
    }

    async fn ping(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1").execute(&self.db).await?;
        Ok(())
    }
}

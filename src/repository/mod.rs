//! Repository layer

pub mod event_repo;
pub mod task_repo;
pub mod user_repo;

pub use event_repo::*;
pub use task_repo::*;
pub use user_repo::*;

use sqlx::PgPool;
use std::sync::Arc;

/// 应用使用的全部存储
#[derive(Clone)]
pub struct Repositories {
    pub users: Arc<dyn UserRepository>,
    pub events: Arc<dyn EventRepository>,
    pub tasks: Arc<dyn TaskRepository>,
}

impl Repositories {
    /// PostgreSQL 存储
    pub fn postgres(pool: PgPool) -> Self {
        Self {
            users: Arc::new(PgUserRepository::new(pool.clone())),
            events: Arc::new(PgEventRepository::new(pool.clone())),
            tasks: Arc::new(PgTaskRepository::new(pool)),
        }
    }

    /// 进程内存储，用于测试
    pub fn in_memory() -> Self {
        Self {
            users: Arc::new(InMemoryUserRepository::new()),
            events: Arc::new(InMemoryEventRepository::new()),
            tasks: Arc::new(InMemoryTaskRepository::new()),
        }
    }
}

//! Task repository

use crate::{error::AppError, models::task::*};
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use sqlx::PgPool;
use std::sync::atomic::{AtomicI64, Ordering};

#[async_trait]
pub trait TaskRepository: Send + Sync {
    /// 按优先级、ID 升序
    async fn list(&self, filter: &TaskFilter) -> Result<Vec<Task>, AppError>;

    async fn find_by_id(&self, id: i64) -> Result<Option<Task>, AppError>;

    async fn create(&self, new_task: NewTask) -> Result<Task, AppError>;

    async fn update(&self, id: i64, req: &UpdateTaskRequest) -> Result<Option<Task>, AppError>;

    async fn delete(&self, id: i64) -> Result<bool, AppError>;

    /// 删除某个事件下的全部任务，返回删除数量
    async fn delete_by_event(&self, event_id: i64) -> Result<u64, AppError>;
}

#[derive(Default)]
pub struct InMemoryTaskRepository {
    tasks: DashMap<i64, Task>,
    next_id: AtomicI64,
}

impl InMemoryTaskRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TaskRepository for InMemoryTaskRepository {
    async fn list(&self, filter: &TaskFilter) -> Result<Vec<Task>, AppError> {
        let mut tasks: Vec<Task> = self
            .tasks
            .iter()
            .filter(|t| filter.matches(t.value()))
            .map(|t| t.value().clone())
            .collect();
        tasks.sort_by_key(|t| (t.priority, t.id));
        Ok(tasks)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Task>, AppError> {
        Ok(self.tasks.get(&id).map(|t| t.clone()))
    }

    async fn create(&self, new_task: NewTask) -> Result<Task, AppError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let now = Utc::now();
        let task = Task {
            id,
            event_id: new_task.event_id,
            title: new_task.title,
            description: new_task.description,
            category: new_task.category,
            priority: new_task.priority,
            assignee_id: new_task.assignee_id,
            completed: false,
            created_at: now,
            updated_at: now,
        };
        self.tasks.insert(id, task.clone());
        Ok(task)
    }

    async fn update(&self, id: i64, req: &UpdateTaskRequest) -> Result<Option<Task>, AppError> {
        Ok(self.tasks.get_mut(&id).map(|mut task| {
            req.apply(&mut task);
            task.clone()
        }))
    }

    async fn delete(&self, id: i64) -> Result<bool, AppError> {
        Ok(self.tasks.remove(&id).is_some())
    }

    async fn delete_by_event(&self, event_id: i64) -> Result<u64, AppError> {
        let before = self.tasks.len();
        self.tasks.retain(|_, t| t.event_id != event_id);
        Ok(before.saturating_sub(self.tasks.len()) as u64)
    }
}

// ==================== PostgreSQL ====================

pub struct PgTaskRepository {
    db: PgPool,
}

impl PgTaskRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl TaskRepository for PgTaskRepository {
    async fn list(&self, filter: &TaskFilter) -> Result<Vec<Task>, AppError> {
        let tasks = sqlx::query_as::<_, Task>(
            r#"
            SELECT * FROM tasks
            WHERE ($1::BIGINT IS NULL OR event_id = $1)
              AND ($2::BOOLEAN IS NULL OR completed = $2)
              AND ($3::BIGINT IS NULL OR assignee_id IS NULL OR assignee_id = $3)
            ORDER BY priority, id
            "#,
        )
        .bind(filter.event_id)
        .bind(filter.completed)
        .bind(filter.visible_to)
        .fetch_all(&self.db)
        .await?;

        Ok(tasks)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Task>, AppError> {
        let task = sqlx::query_as::<_, Task>("SELECT * FROM tasks WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.db)
            .await?;

        Ok(task)
    }

    async fn create(&self, new_task: NewTask) -> Result<Task, AppError> {
        let task = sqlx::query_as::<_, Task>(
            r#"
            INSERT INTO tasks (event_id, title, description, category, priority, assignee_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(new_task.event_id)
        .bind(&new_task.title)
        .bind(&new_task.description)
        .bind(&new_task.category)
        .bind(new_task.priority)
        .bind(new_task.assignee_id)
        .fetch_one(&self.db)
        .await?;

        Ok(task)
    }

    async fn update(&self, id: i64, req: &UpdateTaskRequest) -> Result<Option<Task>, AppError> {
        let task = sqlx::query_as::<_, Task>(
            r#"
            UPDATE tasks
            SET
                title = COALESCE($2, title),
                description = COALESCE($3, description),
                category = COALESCE($4, category),
                priority = COALESCE($5, priority),
                assignee_id = COALESCE($6, assignee_id),
                completed = COALESCE($7, completed),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&req.title)
        .bind(&req.description)
        .bind(&req.category)
        .bind(req.priority)
        .bind(req.assignee_id)
        .bind(req.completed)
        .fetch_optional(&self.db)
        .await?;

        Ok(task)
    }

    async fn delete(&self, id: i64) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_by_event(&self, event_id: i64) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM tasks WHERE event_id = $1")
            .bind(event_id)
            .execute(&self.db)
            .await?;

        Ok(result.rows_affected())
    }
}

//! 任务服务
//!
//! 可见性：管理员看到全部任务；普通用户看到指派给自己的任务和未指派的全队任务，
//! 看不到的任务一律按不存在处理。普通用户只能修改、删除指派给自己的任务，
//! 不能把任务转给别人。

use std::sync::Arc;
use tracing::{info, instrument};
use validator::Validate;

use crate::auth::AuthContext;
use crate::error::{AppError, Result};
use crate::models::{task::*, user::Role};
use crate::repository::{EventRepository, TaskRepository, UserRepository};

pub struct TaskService {
    tasks: Arc<dyn TaskRepository>,
    events: Arc<dyn EventRepository>,
    users: Arc<dyn UserRepository>,
}

impl TaskService {
    pub fn new(
        tasks: Arc<dyn TaskRepository>,
        events: Arc<dyn EventRepository>,
        users: Arc<dyn UserRepository>,
    ) -> Self {
        Self { tasks, events, users }
    }

    /// 按优先级列出当前用户可见的任务
    pub async fn list(&self, actor: &AuthContext, query: TaskQuery) -> Result<Vec<Task>> {
        self.tasks
            .list(&TaskFilter {
                event_id: query.event_id,
                completed: query.completed,
                visible_to: visibility_scope(actor),
            })
            .await
    }

    pub async fn get(&self, actor: &AuthContext, id: i64) -> Result<Task> {
        self.find_visible(actor, id).await
    }

    #[instrument(skip(self, actor, req), fields(actor_id = actor.user_id))]
    pub async fn create(&self, actor: &AuthContext, req: CreateTaskRequest) -> Result<Task> {
        req.validate()?;

        if actor.role != Role::Admin && req.assignee_id.is_some_and(|id| id != actor.user_id) {
            return Err(AppError::Forbidden);
        }
        if self.events.find_by_id(req.event_id).await?.is_none() {
            return Err(AppError::not_found(&format!("event {}", req.event_id)));
        }
        if let Some(assignee_id) = req.assignee_id {
            self.ensure_assignee_exists(assignee_id).await?;
        }

        let task = self
            .tasks
            .create(NewTask {
                event_id: req.event_id,
                title: req.title,
                description: req.description,
                category: req.category,
                priority: req.priority,
                assignee_id: req.assignee_id,
            })
            .await?;
        info!(task_id = task.id, event_id = task.event_id, "Task created");

        Ok(task)
    }

    #[instrument(skip(self, actor, req), fields(actor_id = actor.user_id))]
    pub async fn update(&self, actor: &AuthContext, id: i64, req: UpdateTaskRequest) -> Result<Task> {
        req.validate()?;

        let task = self.find_visible(actor, id).await?;
        self.ensure_can_modify(actor, &task)?;

        if let Some(assignee_id) = req.assignee_id {
            if actor.role != Role::Admin && assignee_id != actor.user_id {
                return Err(AppError::Forbidden);
            }
            self.ensure_assignee_exists(assignee_id).await?;
        }

        let task = self
            .tasks
            .update(id, &req)
            .await?
            .ok_or_else(|| AppError::not_found(&format!("task {}", id)))?;
        info!(task_id = task.id, completed = task.completed, "Task updated");

        Ok(task)
    }

    #[instrument(skip(self, actor), fields(actor_id = actor.user_id))]
    pub async fn delete(&self, actor: &AuthContext, id: i64) -> Result<()> {
        let task = self.find_visible(actor, id).await?;
        self.ensure_can_modify(actor, &task)?;

        if !self.tasks.delete(id).await? {
            return Err(AppError::not_found(&format!("task {}", id)));
        }
        info!(task_id = id, "Task deleted");

        Ok(())
    }

    async fn find_visible(&self, actor: &AuthContext, id: i64) -> Result<Task> {
        self.tasks
            .find_by_id(id)
            .await?
            .filter(|task| {
                TaskFilter {
                    visible_to: visibility_scope(actor),
                    ..Default::default()
                }
                .matches(task)
            })
            .ok_or_else(|| AppError::not_found(&format!("task {}", id)))
    }

    /// 全队任务只有管理员能改
    fn ensure_can_modify(&self, actor: &AuthContext, task: &Task) -> Result<()> {
        if actor.role == Role::Admin || task.assignee_id == Some(actor.user_id) {
            Ok(())
        } else {
            Err(AppError::Forbidden)
        }
    }

    async fn ensure_assignee_exists(&self, assignee_id: i64) -> Result<()> {
        match self.users.find_by_id(assignee_id).await? {
            Some(_) => Ok(()),
            None => Err(AppError::Validation(format!(
                "Assignee {} does not exist",
                assignee_id
            ))),
        }
    }
}

fn visibility_scope(actor: &AuthContext) -> Option<i64> {
    match actor.role {
        Role::Admin => None,
        Role::User => Some(actor.user_id),
    }
}

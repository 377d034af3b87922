//! Event task models
//!
//! A task with no assignee is team-wide: every signed-in user can see it,
//! only admins can change it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Task {
    pub id: i64,
    pub event_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub category: String,
    /// 1 最高
    pub priority: i32,
    pub assignee_id: Option<i64>,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateTaskRequest {
    pub event_id: i64,
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[validate(length(min = 1, max = 32))]
    pub category: String,
    #[validate(range(min = 1, max = 5))]
    #[serde(default = "default_priority")]
    pub priority: i32,
    pub assignee_id: Option<i64>,
}

fn default_priority() -> i32 {
    3
}

/// Partial update; absent fields are left unchanged
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateTaskRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[validate(length(min = 1, max = 32))]
    pub category: Option<String>,
    #[validate(range(min = 1, max = 5))]
    pub priority: Option<i32>,
    pub assignee_id: Option<i64>,
    pub completed: Option<bool>,
}

impl UpdateTaskRequest {
    /// 是否修改了完成状态以外的字段
    pub fn touches_details(&self) -> bool {
        self.title.is_some()
            || self.description.is_some()
            || self.category.is_some()
            || self.priority.is_some()
            || self.assignee_id.is_some()
    }

    pub fn apply(&self, task: &mut Task) {
        if let Some(title) = &self.title {
            task.title = title.clone();
        }
        if let Some(description) = &self.description {
            task.description = Some(description.clone());
        }
        if let Some(category) = &self.category {
            task.category = category.clone();
        }
        if let Some(priority) = self.priority {
            task.priority = priority;
        }
        if let Some(assignee_id) = self.assignee_id {
            task.assignee_id = Some(assignee_id);
        }
        if let Some(completed) = self.completed {
            task.completed = completed;
        }
        task.updated_at = Utc::now();
    }
}

/// New task record handed to the repository
#[derive(Debug, Clone)]
pub struct NewTask {
    pub event_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub category: String,
    pub priority: i32,
    pub assignee_id: Option<i64>,
}

/// `GET /v1/tasks` 查询参数
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskQuery {
    pub event_id: Option<i64>,
    pub completed: Option<bool>,
}

/// Repository-level list filter
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub event_id: Option<i64>,
    pub completed: Option<bool>,
    /// 只返回该用户可见的任务（指派给他或未指派）
    pub visible_to: Option<i64>,
}

impl TaskFilter {
    pub fn matches(&self, task: &Task) -> bool {
        self.event_id.map_or(true, |id| task.event_id == id)
            && self.completed.map_or(true, |c| task.completed == c)
            && self
                .visible_to
                .map_or(true, |user_id| task.assignee_id.map_or(true, |a| a == user_id))
    }
}

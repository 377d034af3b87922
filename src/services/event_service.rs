//! 比赛周末服务
//! 所有登录用户可查看，只有管理员可以创建、修改、删除

use std::sync::Arc;
use tracing::{info, instrument};
use validator::Validate;

use crate::auth::AuthContext;
use crate::error::{AppError, Result};
use crate::models::{event::*, user::Role};
use crate::repository::{EventRepository, TaskRepository};

pub struct EventService {
    events: Arc<dyn EventRepository>,
    tasks: Arc<dyn TaskRepository>,
}

impl EventService {
    pub fn new(events: Arc<dyn EventRepository>, tasks: Arc<dyn TaskRepository>) -> Self {
        Self { events, tasks }
    }

    pub async fn list(&self) -> Result<Vec<Event>> {
        self.events.list().await
    }

    pub async fn get(&self, id: i64) -> Result<Event> {
        self.events
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found(&format!("event {}", id)))
    }

    #[instrument(skip(self, actor, req), fields(actor_id = actor.user_id))]
    pub async fn create(&self, actor: &AuthContext, req: CreateEventRequest) -> Result<Event> {
        actor.require_role(Role::Admin)?;
        req.validate()?;

        let event = self.events.create(&req).await?;
        info!(event_id = event.id, name = %event.name, "Event created");

        Ok(event)
    }

    #[instrument(skip(self, actor, req), fields(actor_id = actor.user_id))]
    pub async fn update(&self, actor: &AuthContext, id: i64, req: UpdateEventRequest) -> Result<Event> {
        actor.require_role(Role::Admin)?;
        req.validate()?;

        let event = self
            .events
            .update(id, &req)
            .await?
            .ok_or_else(|| AppError::not_found(&format!("event {}", id)))?;
        info!(event_id = event.id, "Event updated");

        Ok(event)
    }

    /// 删除事件及其下所有任务
    #[instrument(skip(self, actor), fields(actor_id = actor.user_id))]
    pub async fn delete(&self, actor: &AuthContext, id: i64) -> Result<()> {
        actor.require_role(Role::Admin)?;

        let removed_tasks = self.tasks.delete_by_event(id).await?;
        if !self.events.delete(id).await? {
            return Err(AppError::not_found(&format!("event {}", id)));
        }
        info!(event_id = id, removed_tasks, "Event deleted");

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::task::{NewTask, TaskFilter};
    use crate::repository::{InMemoryEventRepository, InMemoryTaskRepository};
    use chrono::NaiveDate;

    fn actor(role: Role) -> AuthContext {
        AuthContext {
            user_id: 1,
            email: "crew@test.com".to_string(),
            role,
        }
    }

    fn ncm_weekend() -> CreateEventRequest {
        CreateEventRequest {
            name: "NCM Weekend".to_string(),
            track_name: "NCM Motorsports Park".to_string(),
            city: "Bowling Green".to_string(),
            state: "KY".to_string(),
            event_date: NaiveDate::from_ymd_opt(2026, 1, 10).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_only_admin_can_create() {
        let service = EventService::new(
            Arc::new(InMemoryEventRepository::new()),
            Arc::new(InMemoryTaskRepository::new()),
        );

        let denied = service.create(&actor(Role::User), ncm_weekend()).await;
        assert!(matches!(denied, Err(AppError::Forbidden)));

        let event = service.create(&actor(Role::Admin), ncm_weekend()).await.unwrap();
        assert_eq!(service.get(event.id).await.unwrap().name, "NCM Weekend");
        assert!(matches!(service.get(99).await, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_removes_event_tasks() {
        let tasks = Arc::new(InMemoryTaskRepository::new());
        let service = EventService::new(Arc::new(InMemoryEventRepository::new()), tasks.clone());
        let event = service.create(&actor(Role::Admin), ncm_weekend()).await.unwrap();

        tasks
            .create(NewTask {
                event_id: event.id,
                title: "Load bike into trailer".to_string(),
                description: None,
                category: "travel".to_string(),
                priority: 2,
                assignee_id: None,
            })
            .await
            .unwrap();

        service.delete(&actor(Role::Admin), event.id).await.unwrap();
        assert!(tasks.list(&TaskFilter::default()).await.unwrap().is_empty());
        assert!(matches!(
            service.delete(&actor(Role::Admin), event.id).await,
            Err(AppError::NotFound(_))
        ));
    }
}

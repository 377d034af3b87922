//! Event repository

use crate::{error::AppError, models::event::*};
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use sqlx::PgPool;
use std::sync::atomic::{AtomicI64, Ordering};

#[async_trait]
pub trait EventRepository: Send + Sync {
    /// 按日期升序
    async fn list(&self) -> Result<Vec<Event>, AppError>;

    async fn find_by_id(&self, id: i64) -> Result<Option<Event>, AppError>;

    async fn find_by_name(&self, name: &str) -> Result<Option<Event>, AppError>;

    async fn create(&self, req: &CreateEventRequest) -> Result<Event, AppError>;

    async fn update(&self, id: i64, req: &UpdateEventRequest) -> Result<Option<Event>, AppError>;

    /// 删除事件，返回是否存在
    async fn delete(&self, id: i64) -> Result<bool, AppError>;
}

#[derive(Default)]
pub struct InMemoryEventRepository {
    events: DashMap<i64, Event>,
    next_id: AtomicI64,
}

impl InMemoryEventRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EventRepository for InMemoryEventRepository {
    async fn list(&self) -> Result<Vec<Event>, AppError> {
        let mut events: Vec<Event> = self.events.iter().map(|e| e.value().clone()).collect();
        events.sort_by_key(|e| (e.event_date, e.id));
        Ok(events)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Event>, AppError> {
        Ok(self.events.get(&id).map(|e| e.clone()))
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Event>, AppError> {
        Ok(self
            .events
            .iter()
            .find(|e| e.name == name)
            .map(|e| e.value().clone()))
    }

    async fn create(&self, req: &CreateEventRequest) -> Result<Event, AppError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let event = Event {
            id,
            name: req.name.clone(),
            track_name: req.track_name.clone(),
            city: req.city.clone(),
            state: req.state.clone(),
            event_date: req.event_date,
            created_at: Utc::now(),
        };
        self.events.insert(id, event.clone());
        Ok(event)
    }

    async fn update(&self, id: i64, req: &UpdateEventRequest) -> Result<Option<Event>, AppError> {
        Ok(self.events.get_mut(&id).map(|mut event| {
            req.apply(&mut event);
            event.clone()
        }))
    }

    async fn delete(&self, id: i64) -> Result<bool, AppError> {
        Ok(self.events.remove(&id).is_some())
    }
}

// ==================== PostgreSQL ====================

pub struct PgEventRepository {
    db: PgPool,
}

impl PgEventRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl EventRepository for PgEventRepository {
    async fn list(&self) -> Result<Vec<Event>, AppError> {
        let events = sqlx::query_as::<_, Event>("SELECT * FROM events ORDER BY event_date, id")
            .fetch_all(&self.db)
            .await?;

        Ok(events)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Event>, AppError> {
        let event = sqlx::query_as::<_, Event>("SELECT * FROM events WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.db)
            .await?;

        Ok(event)
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Event>, AppError> {
        let event = sqlx::query_as::<_, Event>("SELECT * FROM events WHERE name = $1 LIMIT 1")
            .bind(name)
            .fetch_optional(&self.db)
            .await?;

        Ok(event)
    }

    async fn create(&self, req: &CreateEventRequest) -> Result<Event, AppError> {
        let event = sqlx::query_as::<_, Event>(
            r#"
            INSERT INTO events (name, track_name, city, state, event_date)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(&req.name)
        .bind(&req.track_name)
        .bind(&req.city)
        .bind(&req.state)
        .bind(req.event_date)
        .fetch_one(&self.db)
        .await?;

        Ok(event)
    }

    async fn update(&self, id: i64, req: &UpdateEventRequest) -> Result<Option<Event>, AppError> {
        let event = sqlx::query_as::<_, Event>(
            r#"
            UPDATE events
            SET
                name = COALESCE($2, name),
                track_name = COALESCE($3, track_name),
                city = COALESCE($4, city),
                state = COALESCE($5, state),
                event_date = COALESCE($6, event_date)
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&req.name)
        .bind(&req.track_name)
        .bind(&req.city)
        .bind(&req.state)
        .bind(req.event_date)
        .fetch_optional(&self.db)
        .await?;

        Ok(event)
    }

    async fn delete(&self, id: i64) -> Result<bool, AppError> {
        // 任务随外键级联删除
        let result = sqlx::query("DELETE FROM events WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn request(name: &str, day: u32) -> CreateEventRequest {
        CreateEventRequest {
            name: name.to_string(),
            track_name: "NCM Motorsports Park".to_string(),
            city: "Bowling Green".to_string(),
            state: "KY".to_string(),
            event_date: NaiveDate::from_ymd_opt(2026, 1, day).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_list_is_ordered_by_date() {
        let repo = InMemoryEventRepository::new();
        repo.create(&request("Late", 20)).await.unwrap();
        repo.create(&request("Early", 10)).await.unwrap();

        let names: Vec<String> = repo.list().await.unwrap().into_iter().map(|e| e.name).collect();
        assert_eq!(names, vec!["Early", "Late"]);
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let repo = InMemoryEventRepository::new();
        let event = repo.create(&request("NCM Weekend", 10)).await.unwrap();

        let updated = repo
            .update(
                event.id,
                &UpdateEventRequest {
                    track_name: Some("Road Atlanta".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.track_name, "Road Atlanta");
        assert_eq!(repo.find_by_name("NCM Weekend").await.unwrap().unwrap().id, event.id);

        assert!(repo.delete(event.id).await.unwrap());
        assert!(!repo.delete(event.id).await.unwrap());
        assert!(repo.update(event.id, &UpdateEventRequest::default()).await.unwrap().is_none());
    }
}

//! Race event models

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// 比赛周末
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Event {
    pub id: i64,
    pub name: String,
    pub track_name: String,
    pub city: String,
    pub state: String,
    pub event_date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

/// Create event request (admin only)
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateEventRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(min = 1, max = 200))]
    pub track_name: String,
    #[validate(length(min = 1, max = 100))]
    pub city: String,
    #[validate(length(min = 1, max = 64))]
    pub state: String,
    pub event_date: NaiveDate,
}

/// Partial update; absent fields are left unchanged
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateEventRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    #[validate(length(min = 1, max = 200))]
    pub track_name: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub city: Option<String>,
    #[validate(length(min = 1, max = 64))]
    pub state: Option<String>,
    pub event_date: Option<NaiveDate>,
}

impl UpdateEventRequest {
    /// 把变更应用到已有记录上
    pub fn apply(&self, event: &mut Event) {
        if let Some(name) = &self.name {
            event.name = name.clone();
        }
        if let Some(track_name) = &self.track_name {
            event.track_name = track_name.clone();
        }
        if let Some(city) = &self.city {
            event.city = city.clone();
        }
        if let Some(state) = &self.state {
            event.state = state.clone();
        }
        if let Some(event_date) = self.event_date {
            event.event_date = event_date;
        }
    }
}

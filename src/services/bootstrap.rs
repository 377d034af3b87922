//! 启动时的管理员引导与演示数据

use chrono::NaiveDate;
use tracing::info;

use crate::config::BootstrapConfig;
use crate::error::{AppError, Result};
use crate::models::{
    event::{CreateEventRequest, Event},
    task::{NewTask, TaskFilter},
    user::User,
};
use crate::repository::Repositories;
use crate::services::AuthService;

pub const DEMO_EVENT_NAME: &str = "NCM Weekend";

/// 按配置创建或提升管理员；未配置时返回 None
pub async fn bootstrap_admin(auth: &AuthService, config: &BootstrapConfig) -> Result<Option<User>> {
    let Some((email, password)) = config.admin() else {
        info!("No bootstrap admin configured");
        return Ok(None);
    };

    let admin = auth.ensure_admin(email, password).await?;
    info!(user_id = admin.id, "Bootstrap admin ready");

    Ok(Some(admin))
}

/// 写入一个演示周末及其任务，可重复执行
///
/// 个人任务指派给 `owner`，其余为全队任务。
pub async fn seed_demo_weekend(repos: &Repositories, owner: &User) -> Result<Event> {
    let event = match repos.events.find_by_name(DEMO_EVENT_NAME).await? {
        Some(event) => event,
        None => {
            let event_date = NaiveDate::from_ymd_opt(2026, 1, 10)
                .ok_or_else(|| AppError::internal_error("invalid seed date"))?;
            repos
                .events
                .create(&CreateEventRequest {
                    name: DEMO_EVENT_NAME.to_string(),
                    track_name: "NCM Motorsports Park".to_string(),
                    city: "Bowling Green".to_string(),
                    state: "KY".to_string(),
                    event_date,
                })
                .await?
        }
    };

    let existing = repos
        .tasks
        .list(&TaskFilter {
            event_id: Some(event.id),
            ..Default::default()
        })
        .await?;
    if !existing.is_empty() {
        info!(event_id = event.id, "Seed data already present");
        return Ok(event);
    }

    let tasks = [
        ("Load bike into trailer", "travel", 2, None),
        ("Set tire pressures (cold)", "pit", 1, Some(owner.id)),
        ("Safety wire drain bolt", "tech", 1, Some(owner.id)),
        ("Pack spare levers + tools", "prep", 2, None),
        ("Check brake pad thickness", "safety", 1, Some(owner.id)),
    ];
    for (title, category, priority, assignee_id) in tasks {
        repos
            .tasks
            .create(NewTask {
                event_id: event.id,
                title: title.to_string(),
                description: None,
                category: category.to_string(),
                priority,
                assignee_id,
            })
            .await?;
    }

    info!(event_id = event.id, tasks = tasks.len(), "Seed complete");

    Ok(event)
}

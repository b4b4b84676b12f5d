use super::user_by_address;
use crate::db::{DbScheduler, SchedulerPatch, SchedulerStatus};
use crate::error::OpenEduError;
use crate::scheduler::DeliveryReport;
use crate::server::router::OpenEduState;
use axum::{
    Json,
    extract::{Path, State},
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

#[derive(Debug, Serialize)]
pub struct SchedulerView {
    pub id: i64,
    pub user_id: i64,
    pub chat_id: i64,
    pub day: i64,
    pub total_days: i64,
    pub content: String,
    pub breakdown: Vec<String>,
    pub status: SchedulerStatus,
    pub next_run_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<DbScheduler> for SchedulerView {
    fn from(row: DbScheduler) -> Self {
        Self {
            breakdown: row.breakdown(),
            status: row.status(),
            id: row.id,
            user_id: row.user_id,
            chat_id: row.chat_id,
            day: row.day,
            total_days: row.total_days,
            content: row.content,
            next_run_at: row.next_run_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// GET /users/{address}/schedulers
pub async fn list_user_schedulers(
    State(state): State<OpenEduState>,
    Path(address): Path<String>,
) -> Result<Json<Vec<SchedulerView>>, OpenEduError> {
    let user = user_by_address(&state, &address).await?;
    let rows = state.services.db.list_schedulers(user.id).await?;
    Ok(Json(rows.into_iter().map(SchedulerView::from).collect()))
}

/// GET /schedulers/{id}
pub async fn get_scheduler(
    State(state): State<OpenEduState>,
    Path(id): Path<i64>,
) -> Result<Json<SchedulerView>, OpenEduError> {
    Ok(Json(state.services.db.get_scheduler(id).await?.into()))
}

/// POST /schedulers/{id}/deliver
///
/// Runs today's delivery now instead of waiting for the timer.
pub async fn deliver_scheduler(
    State(state): State<OpenEduState>,
    Path(id): Path<i64>,
) -> Result<Json<DeliveryReport>, OpenEduError> {
    // 404 up front rather than a skipped report for unknown ids.
    state.services.db.get_scheduler(id).await?;
    Ok(Json(state.services.scheduler.deliver_now(id).await?))
}

/// POST /schedulers/{id}/cancel
pub async fn cancel_scheduler(
    State(state): State<OpenEduState>,
    Path(id): Path<i64>,
) -> Result<Json<SchedulerView>, OpenEduError> {
    let db = &state.services.db;
    let row = db.get_scheduler(id).await?;

    match row.status() {
        SchedulerStatus::Active => {
            let patch = SchedulerPatch {
                status: Some(SchedulerStatus::Cancelled),
                expected_revision: Some(row.revision),
                ..Default::default()
            };
            db.patch_scheduler(id, patch).await?;
            state.services.scheduler.cancel(id)?;
            info!(scheduler_id = id, "series cancelled");
        }
        SchedulerStatus::Cancelled => {}
        SchedulerStatus::Completed => {
            return Err(OpenEduError::Conflict(format!(
                "scheduler {id} is already completed"
            )));
        }
    }

    Ok(Json(db.get_scheduler(id).await?.into()))
}

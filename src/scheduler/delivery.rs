use crate::db::{DbActorHandle, DbScheduler, SchedulerPatch, SchedulerStatus};
use crate::error::OpenEduError;
use crate::learning::quiz_link;
use crate::llm::LlmClient;
use crate::telegram::TelegramClient;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// Everything one delivery needs; cloned into each pipeline job.
#[derive(Clone)]
pub struct DeliveryContext {
    pub db: DbActorHandle,
    pub llm: Arc<LlmClient>,
    pub telegram: Arc<TelegramClient>,
    pub web_base_url: Url,
    pub questions_per_quiz: usize,
    pub interval: Duration,
}

impl DeliveryContext {
    pub fn next_run_from(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now + chrono::Duration::from_std(self.interval).unwrap_or(chrono::Duration::days(1))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DeliveryReport {
    Delivered {
        scheduler_id: i64,
        /// Days delivered so far, including this one.
        day: i64,
        total_days: i64,
        quiz_public_id: String,
        quiz_url: String,
        completed: bool,
        next_run_at: Option<DateTime<Utc>>,
    },
    Skipped {
        scheduler_id: i64,
        reason: String,
    },
}

impl DeliveryReport {
    /// When the timer for this series should fire again, if at all.
    pub fn next_run_at(&self) -> Option<DateTime<Utc>> {
        match self {
            DeliveryReport::Delivered { next_run_at, .. } => *next_run_at,
            DeliveryReport::Skipped { .. } => None,
        }
    }
}

/// Delivers the current day of one series.
///
/// On failure the day is left untouched and `next_run_at` is pushed back by one interval.
pub async fn deliver(ctx: &DeliveryContext, id: i64) -> Result<DeliveryReport, OpenEduError> {
    let row = ctx.db.get_scheduler(id).await?;

    if !row.is_active() {
        return Ok(DeliveryReport::Skipped {
            scheduler_id: id,
            reason: format!("series is {}", row.status()),
        });
    }
    if row.day >= row.total_days {
        return Ok(DeliveryReport::Skipped {
            scheduler_id: id,
            reason: "all days delivered".to_string(),
        });
    }

    match deliver_day(ctx, &row).await {
        Ok(report) => Ok(report),
        Err(e) => {
            let next_run_at = ctx.next_run_from(Utc::now());
            warn!(
                scheduler_id = id,
                day = row.day + 1,
                error = %e,
                next_run_at = %next_run_at,
                "scheduled delivery failed, postponing"
            );
            let patch = SchedulerPatch {
                next_run_at: Some(next_run_at),
                expected_revision: Some(row.revision),
                ..Default::default()
            };
            match ctx.db.patch_scheduler(id, patch).await {
                Ok(()) => {}
                Err(OpenEduError::Conflict(_)) => {
                    debug!(scheduler_id = id, "series changed during failed delivery, not postponed");
                }
                Err(patch_err) => {
                    warn!(scheduler_id = id, error = %patch_err, "failed to postpone series");
                }
            }
            Err(e)
        }
    }
}

async fn deliver_day(ctx: &DeliveryContext, row: &DbScheduler) -> Result<DeliveryReport, OpenEduError> {
    let topic = row.current_topic();
    let day = row.day + 1;

    let material = if topic == row.content {
        topic.clone()
    } else {
        format!("{topic}\n\n(Part of a study series on: {})", row.content)
    };
    let questions = ctx
        .llm
        .generate_quiz(&material, ctx.questions_per_quiz)
        .await?;

    let note = ctx
        .db
        .create_note(row.user_id, format!("Day {day}/{}: {topic}", row.total_days))
        .await?;
    let quiz = ctx.db.create_quiz(note.id, questions).await?;
    let url = quiz_link(&ctx.web_base_url, &quiz.public_id);

    let text = format!(
        "Day {day}/{}: {topic}\nYour daily quiz is ready.",
        row.total_days
    );
    ctx.telegram
        .send_message(row.chat_id, &text, Some(("Open quiz", url.as_str())))
        .await?;

    let completed = day >= row.total_days;
    let next_run_at = (!completed).then(|| ctx.next_run_from(Utc::now()));
    let patch = SchedulerPatch {
        day: Some(day),
        status: completed.then_some(SchedulerStatus::Completed),
        next_run_at,
        expected_revision: Some(row.revision),
    };
    // The row may have been replaced or stopped while the quiz was being built and sent.
    match ctx.db.patch_scheduler(row.id, patch).await {
        Ok(()) => {}
        Err(OpenEduError::Conflict(_)) => {
            info!(
                scheduler_id = row.id,
                day,
                quiz = %quiz.public_id,
                "series changed during delivery, progress not recorded"
            );
            return Ok(DeliveryReport::Skipped {
                scheduler_id: row.id,
                reason: "series changed during delivery".to_string(),
            });
        }
        Err(e) => return Err(e),
    }

    info!(
        scheduler_id = row.id,
        user_id = row.user_id,
        day,
        total_days = row.total_days,
        completed,
        quiz = %quiz.public_id,
        "scheduled quiz delivered"
    );

    Ok(DeliveryReport::Delivered {
        scheduler_id: row.id,
        day,
        total_days: row.total_days,
        quiz_public_id: quiz.public_id,
        quiz_url: url,
        completed,
        next_run_at,
    })
}

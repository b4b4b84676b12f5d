//! RecordPatch -> DbPatchable implementation.
//!
//! This sits in the `db` module because it contains SQL/table knowledge.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

use super::patch::{DbPatchable, FlashcardPatch, RecordPatch, SchedulerPatch};
use crate::error::OpenEduError;

#[async_trait]
impl DbPatchable for RecordPatch {
    async fn apply_patch(&self, pool: &SqlitePool) -> Result<(), OpenEduError> {
        match self {
            RecordPatch::Scheduler { id, patch } => {
                let SchedulerPatch {
                    day,
                    status,
                    next_run_at,
                    expected_revision,
                } = patch.clone();

                let day_set = day.is_some();
                let status_set = status.is_some();
                let next_run_at_set = next_run_at.is_some();
                let updated_at = Utc::now();

                let res = sqlx::query(
                    r#"
                    UPDATE schedulers
                    SET
                        day = COALESCE(?, day),
                        status = COALESCE(?, status),
                        revision = revision + (CASE WHEN ? THEN 1 ELSE 0 END),
                        next_run_at = COALESCE(?, next_run_at),
                        updated_at = ?
                    WHERE id = ?
                      AND (? IS NULL OR (revision = ? AND status = 'active'))
                    "#,
                )
                .bind(day)
                .bind(status.map(|s| s.as_str()))
                .bind(status_set)
                .bind(next_run_at)
                .bind(updated_at)
                .bind(id)
                .bind(expected_revision)
                .bind(expected_revision)
                .execute(pool)
                .await?;

                let affected = res.rows_affected();
                debug!(
                    table = "schedulers",
                    id,
                    affected,
                    updated_at = %updated_at,
                    day_set,
                    status_set,
                    next_run_at_set,
                    expected_revision,
                    "db patch applied"
                );

                if affected == 0 {
                    return Err(match expected_revision {
                        Some(revision) => OpenEduError::Conflict(format!(
                            "scheduler {id} is no longer active at revision {revision}"
                        )),
                        None => OpenEduError::NotFound(format!("scheduler {id}")),
                    });
                }

                Ok(())
            }

            RecordPatch::Flashcard { id, patch } => {
                let FlashcardPatch {
                    ease_factor,
                    interval_days,
                    repetitions,
                    due_at,
                } = patch.clone();

                if ease_factor.is_some_and(|e| !e.is_finite() || e <= 0.0)
                    || interval_days.is_some_and(|d| d < 0)
                    || repetitions.is_some_and(|r| r < 0)
                {
                    return Err(OpenEduError::InvalidInput(
                        "flashcard review fields must be non-negative".to_string(),
                    ));
                }

                let res = sqlx::query(
                    r#"
                    UPDATE flashcards
                    SET
                        ease_factor = COALESCE(?, ease_factor),
                        interval_days = COALESCE(?, interval_days),
                        repetitions = COALESCE(?, repetitions),
                        due_at = CASE WHEN ? THEN ? ELSE due_at END
                    WHERE id = ?
                    "#,
                )
                .bind(ease_factor)
                .bind(interval_days)
                .bind(repetitions)
                .bind(due_at.is_some())
                .bind(due_at.flatten())
                .bind(id)
                .execute(pool)
                .await?;

                let affected = res.rows_affected();
                debug!(table = "flashcards", id, affected, "db patch applied");

                if affected == 0 {
                    return Err(OpenEduError::NotFound(format!("flashcard {id}")));
                }

                Ok(())
            }
        }
    }
}

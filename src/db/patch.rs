//! Create/patch payloads accepted by the database actor.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::SqlitePool;

use super::models::SchedulerStatus;
use crate::error::OpenEduError;

/// Abstraction for applying a patch payload/envelope to the database.
#[async_trait]
pub trait DbPatchable {
    async fn apply_patch(&self, pool: &SqlitePool) -> Result<(), OpenEduError>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerCreate {
    pub user_id: i64,
    pub chat_id: i64,
    pub total_days: i64,
    pub content: String,
    pub breakdown: Vec<String>,
    pub next_run_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchedulerPatch {
    /// `None` => do not change; `Some(v)` => update
    pub day: Option<i64>,
    pub status: Option<SchedulerStatus>,
    pub next_run_at: Option<DateTime<Utc>>,
    /// When set, the patch only applies to a row that is still `active` at this revision.
    /// A row that moved on is reported as `Conflict`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_revision: Option<i64>,
}

/// Manual edits of the stored spaced-repetition fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FlashcardPatch {
    pub ease_factor: Option<f64>,
    pub interval_days: Option<i64>,
    pub repetitions: Option<i64>,
    /// Absent => unchanged; `null` => cleared.
    #[serde(
        default,
        deserialize_with = "deserialize_nullable",
        skip_serializing_if = "Option::is_none"
    )]
    pub due_at: Option<Option<DateTime<Utc>>>,
}

fn deserialize_nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
#[serde(rename_all = "snake_case")]
pub enum RecordPatch {
    Scheduler { id: i64, patch: SchedulerPatch },
    Flashcard { id: i64, patch: FlashcardPatch },
}

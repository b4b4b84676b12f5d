use chrono::{DateTime, Utc};
use openedu_schema::QuizQuestion;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::{fmt, str::FromStr};

use crate::error::OpenEduError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
pub struct DbUser {
    pub id: i64,
    pub address: Option<String>,
    pub telegram_chat_id: Option<i64>,
    pub credits: i64,
    pub xp: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
pub struct DbNote {
    pub id: i64,
    pub user_id: i64,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
pub struct DbQuiz {
    pub id: i64,
    pub public_id: String,
    pub note_id: i64,
    /// Raw JSON array; see [`DbQuiz::questions`].
    pub questions: String,
    pub created_at: DateTime<Utc>,
}

impl DbQuiz {
    pub fn questions(&self) -> Result<Vec<QuizQuestion>, OpenEduError> {
        Ok(serde_json::from_str(&self.questions)?)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
pub struct DbFlashcard {
    pub id: i64,
    pub note_id: i64,
    pub front: String,
    pub back: String,
    pub ease_factor: f64,
    pub interval_days: i64,
    pub repetitions: i64,
    pub due_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
pub struct DbScheduler {
    pub id: i64,
    pub user_id: i64,
    pub chat_id: i64,
    pub day: i64,
    pub total_days: i64,
    pub content: String,
    /// Raw JSON array of strings; see [`DbScheduler::breakdown`].
    pub breakdown: String,
    pub status: String,
    /// Changes whenever the series is replaced or stops being active.
    pub revision: i64,
    pub next_run_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DbScheduler {
    pub fn breakdown(&self) -> Vec<String> {
        serde_json::from_str(&self.breakdown).unwrap_or_default()
    }

    pub fn status(&self) -> SchedulerStatus {
        self.status.parse().unwrap_or(SchedulerStatus::Cancelled)
    }

    pub fn is_active(&self) -> bool {
        self.status() == SchedulerStatus::Active
    }

    /// Topic for the upcoming day; falls back to the whole content.
    pub fn current_topic(&self) -> String {
        usize::try_from(self.day)
            .ok()
            .and_then(|day| self.breakdown().into_iter().nth(day))
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| self.content.clone())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
pub struct DbRoundup {
    pub id: i64,
    pub user_id: i64,
    pub total_cents: i64,
    pub deposit_cents: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct RoundupSummary {
    pub count: i64,
    pub total_deposit_cents: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerStatus {
    Active,
    Completed,
    Cancelled,
}

impl SchedulerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SchedulerStatus::Active => "active",
            SchedulerStatus::Completed => "completed",
            SchedulerStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for SchedulerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SchedulerStatus {
    type Err = OpenEduError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(SchedulerStatus::Active),
            "completed" => Ok(SchedulerStatus::Completed),
            "cancelled" => Ok(SchedulerStatus::Cancelled),
            other => Err(OpenEduError::UnexpectedError(format!(
                "unknown scheduler status {other:?}"
            ))),
        }
    }
}

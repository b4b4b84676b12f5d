use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Quiz-series scheduler settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SchedulerConfig {
    /// Delay between two deliveries of the same series, in seconds.
    /// TOML: `scheduler.interval_secs`. Default: `86400` (one day).
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Upper bound on the length of a series.
    /// TOML: `scheduler.max_days`. Default: `30`.
    #[serde(default = "default_max_days")]
    pub max_days: u32,

    /// Questions generated per quiz (scheduled and on-demand).
    /// TOML: `scheduler.questions_per_quiz`. Default: `5`.
    #[serde(default = "default_questions_per_quiz")]
    pub questions_per_quiz: usize,

    /// Deliveries processed concurrently by the worker pipeline.
    /// TOML: `scheduler.concurrency`. Default: `4`.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl SchedulerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            max_days: default_max_days(),
            questions_per_quiz: default_questions_per_quiz(),
            concurrency: default_concurrency(),
        }
    }
}

/// Credits and XP bookkeeping.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RewardsConfig {
    /// Credits granted to a freshly created user.
    /// TOML: `rewards.starting_credits`. Default: `10`.
    #[serde(default = "default_starting_credits")]
    pub starting_credits: i64,

    /// Credits spent per generated quiz or flashcard set.
    /// TOML: `rewards.generation_cost`. Default: `1`.
    #[serde(default = "default_generation_cost")]
    pub generation_cost: i64,

    /// XP per correctly answered question.
    /// TOML: `rewards.xp_per_correct`. Default: `10`.
    #[serde(default = "default_xp_per_correct")]
    pub xp_per_correct: i64,
}

impl Default for RewardsConfig {
    fn default() -> Self {
        Self {
            starting_credits: default_starting_credits(),
            generation_cost: default_generation_cost(),
            xp_per_correct: default_xp_per_correct(),
        }
    }
}

fn default_interval_secs() -> u64 {
    24 * 60 * 60
}

fn default_max_days() -> u32 {
    30
}

fn default_questions_per_quiz() -> usize {
    5
}

fn default_concurrency() -> usize {
    4
}

fn default_starting_credits() -> i64 {
    10
}

fn default_generation_cost() -> i64 {
    1
}

fn default_xp_per_correct() -> i64 {
    10
}

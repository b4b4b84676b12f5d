//! Database module: models and schema for persistent storage.
//!
//! Layout:
//! - `models.rs`: Rust structs mirroring DB rows
//! - `schema.rs`: SQL DDL for initializing the database (SQLite-first)
//! - `patch.rs`: create/patch payloads routed through the actor

pub mod actor;
pub mod models;
pub mod patch;
pub mod schema;

mod patch_impl;

pub use models::{
    DbFlashcard, DbNote, DbQuiz, DbRoundup, DbScheduler, DbUser, RoundupSummary, SchedulerStatus,
};
pub use patch::{FlashcardPatch, RecordPatch, SchedulerCreate, SchedulerPatch};
pub use schema::SQLITE_INIT;

pub use actor::{DbActorHandle, spawn};

//! Groq-hosted LLM access: one OpenAI-compatible client plus the learning operations built on it.

mod client;
mod ops;
mod parse;
mod prompts;

pub use client::LlmClient;
pub use ops::{DEFAULT_SCHEDULE_DAYS, normalize_breakdown, normalize_decision};
pub use parse::extract_json;

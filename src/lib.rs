pub mod config;
pub mod db;
pub mod error;
pub mod learning;
pub mod llm;
pub mod scheduler;
pub mod server;
pub mod services;
pub mod telegram;

pub(crate) mod utils;

pub use error::OpenEduError;
pub use services::Services;

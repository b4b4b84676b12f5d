pub mod auth;
pub mod telegram;

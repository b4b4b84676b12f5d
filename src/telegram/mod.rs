//! Telegram Bot API: outbound client, command grammar, and update dispatch.

mod bot;
mod client;
mod command;

pub use bot::{HELP_TEXT, handle_message};
pub use client::TelegramClient;
pub use command::{BotCommand, ParsedInput, parse_input};

//! Telegram Bot API subset used by the OpenEdu bot.
//!
//! Reference: https://core.telegram.org/bots/api

mod send_message;
mod update;

pub use send_message::{
    InlineKeyboardButton, InlineKeyboardMarkup, SendMessageRequest, TelegramApiResponse,
};
pub use update::{TelegramChat, TelegramMessage, TelegramUpdate, TelegramUser};

use serde::{Deserialize, Serialize};

/// Incoming webhook payload. Unknown update kinds deserialize with every optional field unset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramUpdate {
    pub update_id: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<TelegramMessage>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edited_message: Option<TelegramMessage>,
}

impl TelegramUpdate {
    /// The message carrying user text, preferring fresh messages over edits.
    pub fn text_message(&self) -> Option<(&TelegramMessage, &str)> {
        self.message
            .as_ref()
            .or(self.edited_message.as_ref())
            .and_then(|msg| {
                msg.text
                    .as_deref()
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .map(|t| (msg, t))
            })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramMessage {
    pub message_id: i64,
    #[serde(default)]
    pub date: i64,
    pub chat: TelegramChat,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<TelegramUser>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramChat {
    pub id: i64,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramUser {
    pub id: i64,
    #[serde(default)]
    pub is_bot: bool,
    #[serde(default)]
    pub first_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

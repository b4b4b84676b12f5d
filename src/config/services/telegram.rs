use serde::{Deserialize, Serialize};
use url::Url;

use super::ServiceDefaults;

/// Telegram Bot API configuration managed by Figment.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TelegramConfig {
    /// Bot API base URL.
    /// TOML: `services.telegram.api_base`. Default: `https://api.telegram.org`.
    #[serde(default = "default_api_base")]
    pub api_base: Url,

    /// Bot token issued by BotFather.
    /// TOML: `services.telegram.bot_token`.
    #[serde(default)]
    pub bot_token: String,

    /// Secret expected in `X-Telegram-Bot-Api-Secret-Token` on webhook calls.
    /// TOML: `services.telegram.webhook_secret`. Unset disables the check.
    #[serde(default)]
    pub webhook_secret: Option<String>,

    /// Outgoing messages per second.
    /// TOML: `services.telegram.send_tps`. Default: `20`.
    #[serde(default = "default_send_tps")]
    pub send_tps: u32,

    /// TOML: `services.telegram.proxy`. Falls back to `services.defaults.proxy`.
    #[serde(default)]
    pub proxy: Option<Url>,

    /// TOML: `services.telegram.enable_multiplexing`.
    #[serde(default)]
    pub enable_multiplexing: Option<bool>,

    /// TOML: `services.telegram.retry_max_times`.
    #[serde(default)]
    pub retry_max_times: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct TelegramResolvedConfig {
    pub api_base: Url,
    pub bot_token: String,
    pub webhook_secret: Option<String>,
    pub send_tps: u32,
    pub proxy: Option<Url>,
    pub enable_multiplexing: bool,
    pub retry_max_times: usize,
}

impl TelegramConfig {
    pub fn resolve(&self, defaults: &ServiceDefaults) -> TelegramResolvedConfig {
        TelegramResolvedConfig {
            api_base: self.api_base.clone(),
            bot_token: self.bot_token.clone(),
            webhook_secret: self
                .webhook_secret
                .clone()
                .filter(|s| !s.trim().is_empty()),
            send_tps: self.send_tps.max(1),
            proxy: self.proxy.clone().or_else(|| defaults.proxy.clone()),
            enable_multiplexing: self
                .enable_multiplexing
                .unwrap_or(defaults.enable_multiplexing),
            retry_max_times: self.retry_max_times.unwrap_or(defaults.retry_max_times),
        }
    }
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            bot_token: String::new(),
            webhook_secret: None,
            send_tps: default_send_tps(),
            proxy: None,
            enable_multiplexing: None,
            retry_max_times: None,
        }
    }
}

fn default_api_base() -> Url {
    Url::parse("https://api.telegram.org").expect("valid default Telegram API base")
}

fn default_send_tps() -> u32 {
    20
}

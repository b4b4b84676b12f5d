mod llm;
mod telegram;

pub use llm::{LlmConfig, LlmResolvedConfig};
pub use telegram::{TelegramConfig, TelegramResolvedConfig};

use serde::{Deserialize, Serialize};
use url::Url;

/// Global upstream defaults (used when service-level config is unset).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceDefaults {
    /// Optional upstream HTTP proxy. If set, used for reqwest clients.
    /// TOML: `services.defaults.proxy`. Example: `http://127.0.0.1:1080`.
    #[serde(default)]
    pub proxy: Option<Url>,

    /// Allow HTTP/2 multiplexing for reqwest clients; disabled forces HTTP/1.
    /// TOML: `services.defaults.enable_multiplexing`. Default: `false`.
    #[serde(default = "default_enable_multiplexing")]
    pub enable_multiplexing: bool,

    /// Max retry attempts for upstream calls.
    /// TOML: `services.defaults.retry_max_times`. Default: `3`.
    #[serde(default = "default_retry_max_times")]
    pub retry_max_times: usize,
}

impl Default for ServiceDefaults {
    fn default() -> Self {
        Self {
            proxy: None,
            enable_multiplexing: default_enable_multiplexing(),
            retry_max_times: default_retry_max_times(),
        }
    }
}

/// All upstream service configurations.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct ServicesConfig {
    /// Global defaults for services (overridden per service if set).
    #[serde(default)]
    pub defaults: ServiceDefaults,

    /// Groq-hosted (OpenAI-compatible) LLM.
    #[serde(default)]
    pub llm: LlmConfig,

    /// Telegram Bot API.
    #[serde(default)]
    pub telegram: TelegramConfig,
}

fn default_enable_multiplexing() -> bool {
    false
}

fn default_retry_max_times() -> usize {
    3
}

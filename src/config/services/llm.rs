use serde::{Deserialize, Serialize};
use url::Url;

use super::ServiceDefaults;

/// LLM service configuration managed by Figment.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LlmConfig {
    /// Chat completions endpoint.
    /// TOML: `services.llm.api_url`. Default: Groq's OpenAI-compatible endpoint.
    #[serde(default = "default_api_url")]
    pub api_url: Url,

    /// Bearer token for the endpoint.
    /// TOML: `services.llm.api_key`.
    #[serde(default)]
    pub api_key: String,

    /// Model name sent with every request.
    /// TOML: `services.llm.model`. Default: `llama-3.3-70b-versatile`.
    #[serde(default = "default_model")]
    pub model: String,

    /// Sampling temperature for generation calls. Classification always uses `0`.
    /// TOML: `services.llm.temperature`. Default: `0.7`.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Optional upstream HTTP proxy.
    /// TOML: `services.llm.proxy`. Falls back to `services.defaults.proxy`.
    #[serde(default)]
    pub proxy: Option<Url>,

    /// TOML: `services.llm.enable_multiplexing`.
    /// Falls back to `services.defaults.enable_multiplexing`.
    #[serde(default)]
    pub enable_multiplexing: Option<bool>,

    /// TOML: `services.llm.retry_max_times`.
    /// Falls back to `services.defaults.retry_max_times`.
    #[serde(default)]
    pub retry_max_times: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct LlmResolvedConfig {
    pub api_url: Url,
    pub api_key: String,
    pub model: String,
    pub temperature: f32,
    pub proxy: Option<Url>,
    pub enable_multiplexing: bool,
    pub retry_max_times: usize,
}

impl LlmConfig {
    pub fn resolve(&self, defaults: &ServiceDefaults) -> LlmResolvedConfig {
        LlmResolvedConfig {
            api_url: self.api_url.clone(),
            api_key: self.api_key.clone(),
            model: self.model.clone(),
            temperature: self.temperature,
            proxy: self.proxy.clone().or_else(|| defaults.proxy.clone()),
            enable_multiplexing: self
                .enable_multiplexing
                .unwrap_or(defaults.enable_multiplexing),
            retry_max_times: self.retry_max_times.unwrap_or(defaults.retry_max_times),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            api_key: String::new(),
            model: default_model(),
            temperature: default_temperature(),
            proxy: None,
            enable_multiplexing: None,
            retry_max_times: None,
        }
    }
}

fn default_api_url() -> Url {
    Url::parse("https://api.groq.com/openai/v1/chat/completions")
        .expect("valid default Groq chat completions URL")
}

fn default_model() -> String {
    "llama-3.3-70b-versatile".to_string()
}

fn default_temperature() -> f32 {
    0.7
}

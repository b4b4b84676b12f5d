mod basic;
mod learning;
mod services;

pub use basic::BasicConfig;
pub use learning::{RewardsConfig, SchedulerConfig};
pub use services::{
    LlmConfig, LlmResolvedConfig, ServiceDefaults, ServicesConfig, TelegramConfig,
    TelegramResolvedConfig,
};

use figment::{
    Figment,
    providers::{Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Application configuration managed by Figment.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    /// Core server configuration (see `basic` table in config.toml).
    #[serde(default)]
    pub basic: BasicConfig,

    /// Upstream settings (see `services` table in config.toml).
    #[serde(default)]
    pub services: ServicesConfig,

    #[serde(default)]
    pub scheduler: SchedulerConfig,

    #[serde(default)]
    pub rewards: RewardsConfig,
}

const DEFAULT_CONFIG_FILE: &str = "config.toml";

impl Config {
    /// Builds a Figment that merges defaults and a config TOML file.
    pub fn figment() -> Figment {
        let figment = Figment::new().merge(Serialized::defaults(Config::default()));
        if PathBuf::from(DEFAULT_CONFIG_FILE).is_file() {
            figment.merge(Toml::file(DEFAULT_CONFIG_FILE))
        } else {
            figment
        }
    }

    /// Loads configuration from the TOML file (with defaults) and validates required fields.
    pub fn from_toml() -> Self {
        if !PathBuf::from(DEFAULT_CONFIG_FILE).is_file() {
            panic!("config file not found: {}", DEFAULT_CONFIG_FILE);
        }
        let cfg: Self = Self::figment().extract().unwrap_or_else(|err| {
            panic!(
                "failed to extract configuration from {}: {err}",
                DEFAULT_CONFIG_FILE
            )
        });
        if cfg.basic.openedu_key.trim().is_empty() {
            panic!("basic.openedu_key must be set and non-empty");
        }
        cfg
    }

    pub fn llm(&self) -> LlmResolvedConfig {
        self.services.llm.resolve(&self.services.defaults)
    }

    pub fn telegram(&self) -> TelegramResolvedConfig {
        self.services.telegram.resolve(&self.services.defaults)
    }
}

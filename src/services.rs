use crate::config::{Config, RewardsConfig, SchedulerConfig, TelegramResolvedConfig};
use crate::db::DbActorHandle;
use crate::error::OpenEduError;
use crate::llm::LlmClient;
use crate::scheduler::{DeliveryContext, SchedulerHandle};
use crate::telegram::TelegramClient;
use std::sync::Arc;
use tracing::info;
use url::Url;

/// Settings the request handlers and the bot read at runtime.
#[derive(Debug, Clone)]
pub struct Settings {
    pub web_base_url: Url,
    pub scheduler: SchedulerConfig,
    pub rewards: RewardsConfig,
}

/// Aggregates handles for every long-lived component.
#[derive(Clone)]
pub struct Services {
    pub db: DbActorHandle,
    pub llm: Arc<LlmClient>,
    pub telegram: Arc<TelegramClient>,
    pub telegram_cfg: Arc<TelegramResolvedConfig>,
    pub scheduler: SchedulerHandle,
    pub settings: Arc<Settings>,
}

impl Services {
    pub async fn spawn(db: DbActorHandle, cfg: &Config) -> Result<Self, OpenEduError> {
        let service_defaults = &cfg.services.defaults;
        let llm_cfg = Arc::new(cfg.llm());
        let telegram_cfg = Arc::new(cfg.telegram());

        // Log resolved service configs here so `main` stays wiring-only.
        info!(
            services_defaults_proxy = %service_defaults.proxy.as_ref().map(|u| u.as_str()).unwrap_or("<none>"),
            services_defaults_enable_multiplexing = service_defaults.enable_multiplexing,
            services_defaults_retry_max_times = service_defaults.retry_max_times,
            "Service defaults loaded"
        );
        info!(
            llm_api_url = %llm_cfg.api_url.as_str(),
            llm_model = %llm_cfg.model,
            llm_temperature = llm_cfg.temperature,
            llm_api_key_set = !llm_cfg.api_key.is_empty(),
            llm_proxy = %llm_cfg.proxy.as_ref().map(|u| u.as_str()).unwrap_or("<none>"),
            llm_enable_multiplexing = llm_cfg.enable_multiplexing,
            llm_retry_max_times = llm_cfg.retry_max_times,
            "LLM config (effective)"
        );
        info!(
            telegram_api_base = %telegram_cfg.api_base.as_str(),
            telegram_bot_token_set = !telegram_cfg.bot_token.is_empty(),
            telegram_webhook_secret_set = telegram_cfg.webhook_secret.is_some(),
            telegram_send_tps = telegram_cfg.send_tps,
            telegram_proxy = %telegram_cfg.proxy.as_ref().map(|u| u.as_str()).unwrap_or("<none>"),
            telegram_enable_multiplexing = telegram_cfg.enable_multiplexing,
            telegram_retry_max_times = telegram_cfg.retry_max_times,
            "Telegram config (effective)"
        );
        info!(
            scheduler_interval_secs = cfg.scheduler.interval_secs,
            scheduler_max_days = cfg.scheduler.max_days,
            scheduler_questions_per_quiz = cfg.scheduler.questions_per_quiz,
            scheduler_concurrency = cfg.scheduler.concurrency,
            rewards_starting_credits = cfg.rewards.starting_credits,
            rewards_generation_cost = cfg.rewards.generation_cost,
            rewards_xp_per_correct = cfg.rewards.xp_per_correct,
            "Learning config (effective)"
        );

        let llm = Arc::new(LlmClient::new(llm_cfg.clone())?);
        let telegram = Arc::new(TelegramClient::new(telegram_cfg.clone())?);

        let ctx = DeliveryContext {
            db: db.clone(),
            llm: llm.clone(),
            telegram: telegram.clone(),
            web_base_url: cfg.basic.web_base_url.clone(),
            questions_per_quiz: cfg.scheduler.questions_per_quiz,
            interval: cfg.scheduler.interval(),
        };
        let scheduler = crate::scheduler::spawn(ctx, cfg.scheduler.concurrency).await?;

        Ok(Self {
            db,
            llm,
            telegram,
            telegram_cfg,
            scheduler,
            settings: Arc::new(Settings {
                web_base_url: cfg.basic.web_base_url.clone(),
                scheduler: cfg.scheduler.clone(),
                rewards: cfg.rewards.clone(),
            }),
        })
    }
}

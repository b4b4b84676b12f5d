use crate::config::TelegramResolvedConfig;
use crate::error::{IsRetryable, OpenEduError};
use crate::utils::http::{build_client, post_json_with_retry, redact_path};
use backon::{ExponentialBuilder, Retryable};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use openedu_schema::SendMessageRequest;
use openedu_schema::telegram::TelegramApiResponse;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Outbound Bot API client, paced to `send_tps` messages per second.
pub struct TelegramClient {
    client: reqwest::Client,
    send_url: Url,
    limiter: DefaultDirectRateLimiter,
    retry_policy: ExponentialBuilder,
}

impl TelegramClient {
    pub fn new(cfg: Arc<TelegramResolvedConfig>) -> Result<Self, OpenEduError> {
        let client = build_client(
            cfg.proxy.as_ref(),
            cfg.enable_multiplexing,
            Duration::from_secs(30),
        )?;

        // `api_base` is treated as a directory so a path prefix survives the join.
        let mut base = cfg.api_base.clone();
        if !base.path().ends_with('/') {
            base.set_path(&format!("{}/", base.path()));
        }
        let send_url = base.join(&format!("bot{}/sendMessage", cfg.bot_token))?;

        let tps = NonZeroU32::new(cfg.send_tps).unwrap_or(NonZeroU32::MIN);
        let limiter = RateLimiter::direct(Quota::per_second(tps));

        let retry_policy = ExponentialBuilder::default()
            .with_min_delay(Duration::from_millis(500))
            .with_max_delay(Duration::from_secs(5))
            .with_max_times(cfg.retry_max_times)
            .with_jitter();

        if cfg.bot_token.is_empty() {
            warn!("services.telegram.bot_token is empty; outgoing messages will fail");
        }

        Ok(Self {
            client,
            send_url,
            limiter,
            retry_policy,
        })
    }

    /// Sends a plain message, optionally with one inline URL button.
    pub async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        link: Option<(&str, &str)>,
    ) -> Result<(), OpenEduError> {
        let mut request = SendMessageRequest::text(chat_id, text);
        if let Some((label, url)) = link {
            request = request.with_link_button(label, url);
        }

        let op = || async {
            self.limiter.until_ready().await;
            self.send_once(chat_id, &request).await
        };

        op.retry(&self.retry_policy)
            .when(|err: &OpenEduError| err.is_retryable())
            .notify(|err, dur: Duration| {
                warn!(chat_id, "telegram send retrying after error {} in {:?}", err, dur);
            })
            .await
    }

    async fn send_once(&self, chat_id: i64, request: &SendMessageRequest) -> Result<(), OpenEduError> {
        let resp =
            post_json_with_retry("telegram", &self.client, &self.send_url, None, request).await?;
        let status = resp.status();
        let bytes = resp.bytes().await?;

        let envelope = serde_json::from_slice::<TelegramApiResponse<serde_json::Value>>(&bytes).ok();
        match envelope {
            Some(env) if status.is_success() && env.ok => {
                debug!(chat_id, url = %redact_path(&self.send_url), "telegram message sent");
                Ok(())
            }
            Some(env) => Err(OpenEduError::Telegram {
                status: Some(status),
                description: env
                    .description
                    .unwrap_or_else(|| format!("sendMessage failed with {status}")),
            }),
            None => Err(OpenEduError::Telegram {
                status: Some(status),
                description: format!("sendMessage returned a non-JSON body ({status})"),
            }),
        }
    }
}

use crate::config::LlmResolvedConfig;
use crate::error::{IsRetryable, LlmError, OpenEduError};
use crate::utils::http::{UPSTREAM_BODY_PREVIEW_CHARS, build_client, post_json_with_retry};
use crate::utils::logging::with_pretty_json_debug;
use backon::{ExponentialBuilder, Retryable};
use openedu_schema::{ChatCompletionRequest, ChatCompletionResponse, OpenaiErrorBody};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Chat completions client for the configured OpenAI-compatible endpoint.
pub struct LlmClient {
    client: reqwest::Client,
    cfg: Arc<LlmResolvedConfig>,
    headers: HeaderMap,
    retry_policy: ExponentialBuilder,
}

impl LlmClient {
    pub fn new(cfg: Arc<LlmResolvedConfig>) -> Result<Self, OpenEduError> {
        let client = build_client(
            cfg.proxy.as_ref(),
            cfg.enable_multiplexing,
            Duration::from_secs(120),
        )?;

        let mut headers = HeaderMap::new();
        if !cfg.api_key.is_empty() {
            let value = HeaderValue::from_str(&format!("Bearer {}", cfg.api_key)).map_err(|e| {
                OpenEduError::UnexpectedError(format!("invalid services.llm.api_key: {e}"))
            })?;
            headers.insert(AUTHORIZATION, value);
        }

        let max_attempts = cfg.retry_max_times.max(1);
        let retry_policy = ExponentialBuilder::default()
            .with_min_delay(Duration::from_millis(200))
            .with_max_delay(Duration::from_secs(2))
            .with_max_times(max_attempts)
            .with_jitter();

        Ok(Self {
            client,
            cfg,
            headers,
            retry_policy,
        })
    }

    pub fn model(&self) -> &str {
        &self.cfg.model
    }

    pub fn temperature(&self) -> f32 {
        self.cfg.temperature
    }

    /// Sends one completion request and returns the trimmed text of the first choice.
    pub(crate) async fn complete(
        &self,
        label: &'static str,
        request: ChatCompletionRequest,
    ) -> Result<String, LlmError> {
        with_pretty_json_debug(&request, |pretty| {
            debug!(op = label, body = %pretty, "[LLM] request payload");
        });

        let op = || {
            let client = self.client.clone();
            let headers = self.headers.clone();
            let request = &request;
            async move {
                let start = Instant::now();
                let resp = post_json_with_retry(
                    "llm",
                    &client,
                    &self.cfg.api_url,
                    Some(headers),
                    request,
                )
                .await?;

                let status = resp.status();
                if !status.is_success() {
                    return Err(upstream_status_error(resp).await);
                }

                let body: ChatCompletionResponse = resp.json().await?;
                let content = body
                    .first_content()
                    .map(str::trim)
                    .filter(|c| !c.is_empty())
                    .ok_or(LlmError::EmptyCompletion)?
                    .to_string();

                info!(
                    op = label,
                    model = %body.model,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    completion_tokens = body.usage.map(|u| u.completion_tokens).unwrap_or(0),
                    "[LLM] completion received"
                );
                Ok(content)
            }
        };

        op.retry(&self.retry_policy)
            .when(|err: &LlmError| err.is_retryable())
            .notify(|err, dur: Duration| {
                tracing::warn!(op = label, "LLM retrying after error {} in {:?}", err, dur);
            })
            .await
    }
}

async fn upstream_status_error(resp: reqwest::Response) -> LlmError {
    let status = resp.status();
    let bytes = resp.bytes().await.unwrap_or_default();

    match serde_json::from_slice::<OpenaiErrorBody>(&bytes) {
        Ok(body) => LlmError::UpstreamStatus {
            status,
            message: body.inner.message.clone(),
            body: Some(body),
        },
        Err(_) => {
            let raw = String::from_utf8_lossy(&bytes);
            LlmError::UpstreamStatus {
                status,
                message: format!("{:.len$}", raw, len = UPSTREAM_BODY_PREVIEW_CHARS),
                body: None,
            }
        }
    }
}

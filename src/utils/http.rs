use backon::{ExponentialBuilder, Retryable};
use reqwest::header::{CONNECTION, HeaderMap, HeaderValue};
use std::sync::LazyLock;
use std::time::Duration;
use url::Url;

use crate::error::OpenEduError;

pub const UPSTREAM_BODY_PREVIEW_CHARS: usize = 300;

pub const OPENEDU_USER_AGENT: &str = concat!("openedu/", env!("CARGO_PKG_VERSION"));

static NETWORK_RETRY_POLICY: LazyLock<ExponentialBuilder> = LazyLock::new(|| {
    ExponentialBuilder::default()
        .with_min_delay(Duration::from_millis(100))
        .with_max_delay(Duration::from_millis(300))
        .with_max_times(2)
        .with_jitter()
});

/// Builds the outbound HTTP client for one upstream service.
pub fn build_client(
    proxy: Option<&Url>,
    enable_multiplexing: bool,
    timeout: Duration,
) -> Result<reqwest::Client, OpenEduError> {
    let mut headers = HeaderMap::new();

    let mut builder = reqwest::Client::builder()
        .user_agent(OPENEDU_USER_AGENT)
        .redirect(reqwest::redirect::Policy::none())
        .connect_timeout(Duration::from_secs(10))
        .timeout(timeout);

    if let Some(proxy_url) = proxy {
        builder = builder.proxy(reqwest::Proxy::all(proxy_url.as_str())?);
    }

    if !enable_multiplexing {
        headers.insert(CONNECTION, HeaderValue::from_static("close"));

        builder = builder
            .http1_only()
            .pool_max_idle_per_host(0)
            .pool_idle_timeout(Duration::from_secs(0));
    } else {
        builder = builder.http2_adaptive_window(true);
    }

    Ok(builder.default_headers(headers).build()?)
}

/// POSTs a JSON body, retrying only when the upstream answers 5xx or the send itself fails.
///
/// Callers still see non-5xx error statuses as `Ok(resp)` and classify them themselves.
pub(crate) async fn post_json_with_retry<T>(
    service: &'static str,
    client: &reqwest::Client,
    url: &Url,
    headers: Option<HeaderMap>,
    body: &T,
) -> Result<reqwest::Response, reqwest::Error>
where
    T: serde::Serialize,
{
    (|| {
        let client = client.clone();
        let url = url.clone();
        let headers = headers.clone();

        async move {
            let mut request = client.post(url.clone());
            if let Some(headers) = &headers {
                request = request.headers(headers.clone());
            }

            let resp = request.json(body).send().await?;

            if let Err(err) = resp.error_for_status_ref()
                && resp.status().is_server_error()
            {
                let status = resp.status();

                let body_preview = match resp.bytes().await {
                    Ok(bytes) => {
                        let raw_body = String::from_utf8_lossy(&bytes);
                        format!("{:.len$}", raw_body, len = UPSTREAM_BODY_PREVIEW_CHARS)
                    }
                    Err(e) => format!("<failed to read body: {e}>"),
                };

                tracing::debug!(
                    service,
                    %status,
                    url = %redact_path(&url),
                    body = %body_preview,
                    "[{service}] Upstream server error (will retry)"
                );

                return Err(err);
            }

            Ok(resp)
        }
    })
    .retry(*NETWORK_RETRY_POLICY)
    .await
}

/// Host-only rendering of an upstream URL; Telegram puts the bot token in the path.
pub(crate) fn redact_path(url: &Url) -> String {
    format!("{}://{}/...", url.scheme(), url.host_str().unwrap_or("-"))
}

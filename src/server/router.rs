use crate::server::guards::auth::RequireKeyAuth;
use crate::server::guards::telegram::RequireTelegramSecret;
use crate::server::routes;
use crate::services::Services;

use axum::{
    Router,
    extract::Request,
    http::{HeaderName, StatusCode, Version, header::USER_AGENT},
    middleware::{self, Next},
    response::Response,
    routing::get,
};
use base64::Engine as _;
use rand::RngCore;
use reqwest::header::HeaderValue;
use std::time::Instant;
use std::{sync::Arc, time::Duration};
use tracing::{error, info, warn};

const MAX_REQUEST_ID_LEN: usize = 128;
const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Telegram redelivers unacknowledged updates; ids seen within this window are skipped.
const UPDATE_DEDUP_TTL: Duration = Duration::from_secs(10 * 60);

fn generate_request_id() -> String {
    // 96 bits => 16 chars base64url (no padding).
    let mut bytes = [0u8; 12];
    rand::rng().fill_bytes(&mut bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

fn format_http_version(version: Version) -> &'static str {
    match version {
        Version::HTTP_09 => "HTTP/0.9",
        Version::HTTP_10 => "HTTP/1.0",
        Version::HTTP_11 => "HTTP/1.1",
        Version::HTTP_2 => "HTTP/2",
        Version::HTTP_3 => "HTTP/3",
        _ => "HTTP/?",
    }
}

#[derive(Clone)]
pub struct OpenEduState {
    pub services: Services,
    pub openedu_key: Arc<str>,
    pub webhook_secret: Option<Arc<str>>,
    pub seen_updates: moka::sync::Cache<i64, ()>,
}

impl OpenEduState {
    pub fn new(services: Services, openedu_key: Arc<str>) -> Self {
        let webhook_secret = services
            .telegram_cfg
            .webhook_secret
            .as_deref()
            .map(Arc::from);

        let seen_updates = moka::sync::Cache::builder()
            .max_capacity(100_000)
            .time_to_live(UPDATE_DEDUP_TTL)
            .build();

        Self {
            services,
            openedu_key,
            webhook_secret,
            seen_updates,
        }
    }

    /// Records an update id; `false` when it was already seen inside the window.
    pub fn first_sighting(&self, update_id: i64) -> bool {
        self.seen_updates.entry(update_id).or_insert(()).is_fresh()
    }

    /// Drops an update id so a redelivery is processed again.
    pub fn forget_update(&self, update_id: i64) {
        self.seen_updates.invalidate(&update_id);
    }
}

async fn not_found_handler() -> StatusCode {
    StatusCode::NOT_FOUND
}

async fn access_log(req: Request, next: Next) -> Response {
    // Capture request metadata before moving `req` into the handler stack.
    let method = req.method().clone();
    let uri = req.uri().clone();
    let version = req.version();

    let request_id = req
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty() && v.len() <= MAX_REQUEST_ID_LEN)
        .map(str::to_string)
        .unwrap_or_else(generate_request_id);

    let user_agent = req
        .headers()
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
        .to_string();

    let start = Instant::now();
    let mut resp = next.run(req).await;

    // Always reflect `x-request-id`, even if the client didn't send one.
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        resp.headers_mut().insert(X_REQUEST_ID, value);
    }

    let status = resp.status();
    let latency_ms = start.elapsed().as_millis() as u64;
    // Never log the query string: `?key=` carries the API key.
    let path = uri.path();
    let protocol = format_http_version(version);

    if status.is_server_error() {
        error!(
            "| {:>3} | {} | {:^7} | {:<8} | {} | {}ms | {}",
            status.as_u16(),
            request_id,
            method.as_str(),
            protocol,
            path,
            latency_ms,
            user_agent
        );
    } else if status.is_client_error() {
        warn!(
            "| {:>3} | {} | {:^7} | {:<8} | {} | {}ms | {}",
            status.as_u16(),
            request_id,
            method.as_str(),
            protocol,
            path,
            latency_ms,
            user_agent
        );
    } else {
        info!(
            "| {:>3} | {} | {:^7} | {:<8} | {} | {}ms | {}",
            status.as_u16(),
            request_id,
            method.as_str(),
            protocol,
            path,
            latency_ms,
            user_agent
        );
    }

    resp
}

pub fn openedu_router(state: OpenEduState) -> Router {
    let api = routes::api_router().layer(middleware::from_extractor_with_state::<
        RequireKeyAuth,
        _,
    >(state.clone()));

    let telegram = routes::telegram::router().layer(middleware::from_extractor_with_state::<
        RequireTelegramSecret,
        _,
    >(state.clone()));

    Router::new()
        .route("/healthz", get(routes::health::healthz))
        .merge(api)
        .merge(telegram)
        .fallback(not_found_handler)
        .with_state(state)
        .layer(middleware::from_fn(access_log))
}

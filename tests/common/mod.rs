#![allow(dead_code)]

use axum::{
    Json, Router,
    extract::State,
    http::{StatusCode, header::CONTENT_TYPE},
    response::{IntoResponse, Response},
    routing::post,
};
use openedu::config::Config;
use serde_json::{Value, json};
use std::{
    sync::{Arc, Mutex},
    time::{Duration, Instant, SystemTime, UNIX_EPOCH},
};
use tokio::net::TcpListener;
use url::Url;

pub const API_KEY: &str = "pwd";
pub const BOT_TOKEN: &str = "TEST";
pub const WEBHOOK_SECRET: &str = "hook-secret";
pub const WEB_BASE: &str = "https://openedu.test";
pub const ALICE: &str = "0x52908400098527886E0F7030069857D2E4169EE7";

pub fn temp_database_url(label: &str) -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system time before UNIX_EPOCH")
        .as_nanos();

    let mut temp_path = std::env::temp_dir();
    temp_path.push(format!(
        "openedu-{}-{}-{}.sqlite",
        label,
        std::process::id(),
        nanos
    ));
    format!("sqlite:{}", temp_path.display())
}

pub async fn spawn_test_server(app: Router) -> Url {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind listener");
    let addr = listener.local_addr().expect("local addr");
    let base = Url::parse(&format!("http://{}", addr)).expect("valid base url");

    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("server run");
    });

    base
}

/// Records what the fake upstream saw and lets a test override LLM output.
#[derive(Clone, Default)]
pub struct FakeUpstream {
    pub sent_messages: Arc<Mutex<Vec<Value>>>,
    pub llm_requests: Arc<Mutex<Vec<Value>>>,
    /// When set, every completion returns this text verbatim.
    pub llm_override: Arc<Mutex<Option<String>>>,
    /// When set, `sendMessage` answers with this status and raw body instead of `ok: true`.
    pub telegram_override: Arc<Mutex<Option<(StatusCode, String)>>>,
    /// Held before `sendMessage` records and answers.
    pub send_delay: Arc<Mutex<Duration>>,
    /// `sendMessage` calls received so far, counted on arrival.
    pub send_attempts: Arc<Mutex<usize>>,
}

impl FakeUpstream {
    pub fn sent(&self) -> Vec<Value> {
        self.sent_messages.lock().unwrap().clone()
    }

    pub fn set_llm_output(&self, text: Option<&str>) {
        *self.llm_override.lock().unwrap() = text.map(str::to_string);
    }

    pub fn set_telegram_failure(&self, failure: Option<(StatusCode, &str)>) {
        *self.telegram_override.lock().unwrap() = failure.map(|(status, body)| (status, body.to_string()));
    }

    pub fn set_send_delay(&self, delay: Duration) {
        *self.send_delay.lock().unwrap() = delay;
    }

    /// Waits until `n` sendMessage calls have arrived, answered or not.
    pub async fn wait_for_send_attempts(&self, n: usize) {
        let deadline = Instant::now() + Duration::from_secs(10);
        while *self.send_attempts.lock().unwrap() < n && Instant::now() <= deadline {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    pub async fn wait_for_messages(&self, n: usize) -> Vec<Value> {
        let deadline = Instant::now() + Duration::from_secs(10);
        loop {
            let sent = self.sent();
            if sent.len() >= n || Instant::now() > deadline {
                return sent;
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
    }
}

async fn send_message_handler(
    State(fake): State<FakeUpstream>,
    Json(body): Json<Value>,
) -> Response {
    *fake.send_attempts.lock().unwrap() += 1;
    let delay = *fake.send_delay.lock().unwrap();
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }

    let failure = fake.telegram_override.lock().unwrap().clone();
    if let Some((status, raw)) = failure {
        return (status, [(CONTENT_TYPE, "application/json")], raw).into_response();
    }

    fake.sent_messages.lock().unwrap().push(body);
    Json(json!({ "ok": true, "result": { "message_id": 1 } })).into_response()
}

fn fake_completion(system: &str, user: &str) -> Value {
    if system.contains("route messages") {
        let lower = user.to_lowercase();
        if lower.contains("days") {
            json!({ "intent": "quiz_scheduling", "topic": "rust ownership", "days": 3 })
        } else if lower.contains("quiz") {
            json!({ "intent": "quiz_now", "topic": "photosynthesis" })
        } else {
            json!({ "intent": "general" })
        }
    } else if system.contains("multiple-choice") {
        json!({
            "questions": [
                { "question": "What do plants make?", "options": ["Glucose", "Iron"], "answer": 0 },
                { "question": "Which gas is released?", "options": ["CO2", "O2", "N2"], "answer": "O2",
                  "explanation": "Oxygen is a by-product." },
                { "question": "broken", "options": ["only"], "answer": 0 }
            ]
        })
    } else if system.contains("flashcards") {
        json!({
            "flashcards": [
                { "front": "Chlorophyll", "back": "Green pigment" },
                { "front": "", "back": "dropped" }
            ]
        })
    } else if system.contains("multi-day") {
        json!({ "topics": ["ownership", "borrowing"] })
    } else {
        Value::String("Happy to help you study!".to_string())
    }
}

async fn chat_completions_handler(
    State(fake): State<FakeUpstream>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    fake.llm_requests.lock().unwrap().push(body.clone());

    let system = body["messages"][0]["content"].as_str().unwrap_or_default();
    let user = body["messages"][1]["content"].as_str().unwrap_or_default();

    let content = match fake.llm_override.lock().unwrap().clone() {
        Some(text) => text,
        None => match fake_completion(system, user) {
            Value::String(s) => s,
            other => other.to_string(),
        },
    };

    (
        StatusCode::OK,
        Json(json!({
            "id": "chatcmpl-test",
            "object": "chat.completion",
            "model": "fake-model",
            "choices": [
                { "index": 0, "message": { "role": "assistant", "content": content }, "finish_reason": "stop" }
            ],
            "usage": { "prompt_tokens": 1, "completion_tokens": 1, "total_tokens": 2 }
        })),
    )
}

/// One local server acting as both the LLM endpoint and the Bot API.
pub async fn spawn_fake_upstream() -> (FakeUpstream, Url) {
    let fake = FakeUpstream::default();
    let app = Router::new()
        .route("/v1/chat/completions", post(chat_completions_handler))
        .route(&format!("/bot{BOT_TOKEN}/sendMessage"), post(send_message_handler))
        .with_state(fake.clone());
    let base = spawn_test_server(app).await;
    (fake, base)
}

pub fn test_config(upstream: &Url) -> Config {
    let mut cfg = Config::default();
    cfg.basic.openedu_key = API_KEY.to_string();
    cfg.basic.web_base_url = Url::parse(WEB_BASE).unwrap();

    cfg.services.llm.api_url = upstream.join("/v1/chat/completions").unwrap();
    cfg.services.llm.api_key = "llm-key".to_string();
    cfg.services.llm.retry_max_times = Some(1);

    cfg.services.telegram.api_base = upstream.clone();
    cfg.services.telegram.bot_token = BOT_TOKEN.to_string();
    cfg.services.telegram.webhook_secret = Some(WEBHOOK_SECRET.to_string());
    cfg.services.telegram.retry_max_times = Some(1);

    // Long enough that no timer re-fires inside a test.
    cfg.scheduler.interval_secs = 3600;
    cfg
}

pub async fn spawn_state(label: &str, cfg: &Config) -> openedu::server::router::OpenEduState {
    spawn_state_at(&temp_database_url(label), cfg).await
}

pub async fn spawn_state_at(database_url: &str, cfg: &Config) -> openedu::server::router::OpenEduState {
    let db = openedu::db::spawn(database_url)
        .await
        .expect("spawn db actor");
    let services = openedu::Services::spawn(db, cfg)
        .await
        .expect("spawn services");
    openedu::server::router::OpenEduState::new(services, Arc::from(cfg.basic.openedu_key.as_str()))
}

pub fn json_request(method: &str, uri: &str, body: Option<Value>) -> axum::http::Request<axum::body::Body> {
    let builder = axum::http::Request::builder()
        .method(method)
        .uri(uri)
        .header("x-api-key", API_KEY);
    match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(axum::body::Body::from(body.to_string())),
        None => builder.body(axum::body::Body::empty()),
    }
    .expect("failed to build request")
}

pub async fn read_json(resp: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("response is JSON")
}

mod common;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use common::{FakeUpstream, WEBHOOK_SECRET};
use openedu::db::SchedulerStatus;
use openedu::server::router::{OpenEduState, openedu_router};
use serde_json::{Value, json};
use tower::ServiceExt as _;

const CHAT_ID: i64 = 5150;

async fn app(label: &str) -> (Router, OpenEduState, FakeUpstream) {
    let (fake, upstream) = common::spawn_fake_upstream().await;
    let cfg = common::test_config(&upstream);
    let state = common::spawn_state(label, &cfg).await;
    (openedu_router(state.clone()), state, fake)
}

fn text_update(update_id: i64, text: &str) -> Value {
    json!({
        "update_id": update_id,
        "message": {
            "message_id": update_id,
            "date": 1_700_000_000,
            "chat": { "id": CHAT_ID, "type": "private" },
            "from": { "id": CHAT_ID, "is_bot": false, "first_name": "Ada" },
            "text": text
        }
    })
}

fn webhook(update: &Value, secret: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/telegram/webhook")
        .header("content-type", "application/json");
    if let Some(secret) = secret {
        builder = builder.header("x-telegram-bot-api-secret-token", secret);
    }
    builder
        .body(Body::from(update.to_string()))
        .expect("failed to build request")
}

async fn post_update(app: &Router, update: Value) -> StatusCode {
    app.clone()
        .oneshot(webhook(&update, Some(WEBHOOK_SECRET)))
        .await
        .expect("request failed")
        .status()
}

#[tokio::test]
async fn webhook_rejects_missing_or_wrong_secret() {
    let (app, _state, fake) = app("tg-secret").await;

    let resp = app
        .clone()
        .oneshot(webhook(&text_update(1, "/help"), None))
        .await
        .expect("request failed");
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = app
        .clone()
        .oneshot(webhook(&text_update(1, "/help"), Some("nope")))
        .await
        .expect("request failed");
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    // The API key is not a substitute for the webhook secret.
    let resp = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/telegram/webhook")
                .header("content-type", "application/json")
                .header("x-api-key", common::API_KEY)
                .body(Body::from(text_update(1, "/help").to_string()))
                .expect("failed to build request"),
        )
        .await
        .expect("request failed");
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    assert!(fake.sent().is_empty());
}

#[tokio::test]
async fn duplicate_and_non_text_updates_are_acknowledged_once() {
    let (app, _state, fake) = app("tg-dedupe").await;

    assert_eq!(post_update(&app, text_update(10, "/help")).await, StatusCode::OK);
    assert_eq!(post_update(&app, text_update(10, "/help")).await, StatusCode::OK);

    let sticker = json!({
        "update_id": 11,
        "message": { "message_id": 11, "chat": { "id": CHAT_ID, "type": "private" } }
    });
    assert_eq!(post_update(&app, sticker).await, StatusCode::OK);

    let sent = fake.wait_for_messages(1).await;
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;
    let sent_after = fake.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent_after.len(), 1);
    assert_eq!(sent_after[0]["chat_id"], CHAT_ID);
    assert!(
        sent_after[0]["text"]
            .as_str()
            .expect("text")
            .contains("/schedule")
    );
}

#[tokio::test]
async fn quiz_command_sends_a_link_button() {
    let (app, state, fake) = app("tg-quiz").await;

    assert_eq!(
        post_update(&app, text_update(20, "/quiz photosynthesis")).await,
        StatusCode::OK
    );

    let sent = fake.wait_for_messages(1).await;
    assert_eq!(sent.len(), 1);
    let text = sent[0]["text"].as_str().expect("text");
    assert!(text.contains("photosynthesis"), "unexpected text: {text}");
    assert!(text.contains("2 questions"), "unexpected text: {text}");

    let button = &sent[0]["reply_markup"]["inline_keyboard"][0][0];
    assert_eq!(button["text"], "Open quiz");
    let url = button["url"].as_str().expect("button url");
    let public_id = url
        .strip_prefix(&format!("{}/quiz/", common::WEB_BASE))
        .expect("quiz link prefix");

    let quiz = state
        .services
        .db
        .get_quiz_by_public_id(public_id.to_string())
        .await
        .expect("quiz stored");
    assert_eq!(quiz.questions().expect("questions").len(), 2);

    // Chat quizzes do not cost credits.
    let user = state
        .services
        .db
        .upsert_user_by_chat(CHAT_ID, 0)
        .await
        .expect("chat user");
    assert_eq!(user.credits, 10);
}

#[tokio::test]
async fn free_text_schedules_a_series_and_stop_cancels_it() {
    let (app, state, fake) = app("tg-series").await;

    assert_eq!(
        post_update(&app, text_update(30, "teach me rust over 3 days")).await,
        StatusCode::OK
    );

    // Confirmation first, then the first day's quiz from the scheduler.
    let sent = fake.wait_for_messages(2).await;
    assert_eq!(sent.len(), 2, "messages: {sent:?}");
    assert!(
        sent[0]["text"]
            .as_str()
            .expect("text")
            .contains("3-day quiz series on rust ownership")
    );
    assert!(
        sent[1]["text"]
            .as_str()
            .expect("text")
            .starts_with("Day 1/3: ownership")
    );

    let user = state
        .services
        .db
        .upsert_user_by_chat(CHAT_ID, 0)
        .await
        .expect("chat user");
    let rows = state
        .services
        .db
        .list_schedulers(user.id)
        .await
        .expect("list schedulers");
    assert_eq!(rows.len(), 1);
    let row = &rows[0];
    assert_eq!(
        row.breakdown(),
        vec!["ownership", "borrowing", "ownership"]
    );

    // The day counter is written after the message is sent.
    let mut day = 0;
    for _ in 0..100 {
        day = state.services.db.get_scheduler(row.id).await.expect("row").day;
        if day == 1 {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(25)).await;
    }
    assert_eq!(day, 1);

    assert_eq!(post_update(&app, text_update(31, "/status")).await, StatusCode::OK);
    let sent = fake.wait_for_messages(3).await;
    assert!(sent[2]["text"].as_str().expect("text").contains("day 1/3"));

    assert_eq!(post_update(&app, text_update(32, "/stop")).await, StatusCode::OK);
    let sent = fake.wait_for_messages(4).await;
    assert_eq!(sent[3]["text"], "Stopped your quiz series.");

    let row = state.services.db.get_scheduler(row.id).await.expect("row");
    assert_eq!(row.status(), SchedulerStatus::Cancelled);
    assert!(
        !state
            .services
            .scheduler
            .armed()
            .await
            .expect("armed timers")
            .contains(&row.id)
    );
}

#[tokio::test]
async fn general_chat_and_link_commands() {
    let (app, state, fake) = app("tg-chat").await;

    assert_eq!(post_update(&app, text_update(40, "hello there")).await, StatusCode::OK);
    let sent = fake.wait_for_messages(1).await;
    assert_eq!(sent[0]["text"], "Happy to help you study!");
    assert!(sent[0].get("reply_markup").is_none());

    assert_eq!(post_update(&app, text_update(41, "/link 0x123")).await, StatusCode::OK);
    let sent = fake.wait_for_messages(2).await;
    assert!(sent[1]["text"].as_str().expect("text").starts_with("Usage: /link"));

    state
        .services
        .db
        .upsert_user_by_address(common::ALICE.to_lowercase(), 10)
        .await
        .expect("web user");
    assert_eq!(
        post_update(&app, text_update(42, &format!("/link {}", common::ALICE))).await,
        StatusCode::OK
    );
    let sent = fake.wait_for_messages(3).await;
    assert_eq!(
        sent[2]["text"],
        "That wallet is already linked to another account."
    );

    assert_eq!(post_update(&app, text_update(43, "/balance")).await, StatusCode::OK);
    let sent = fake.wait_for_messages(4).await;
    assert_eq!(sent[3]["text"], "Credits: 10\nXP: 0");
}

#[tokio::test]
async fn failed_handling_is_answered_with_an_apology() {
    let (app, _state, fake) = app("tg-apology").await;
    fake.set_llm_output(Some("I would rather not."));

    assert_eq!(
        post_update(&app, text_update(60, "/quiz photosynthesis")).await,
        StatusCode::OK
    );

    let sent = fake.wait_for_messages(1).await;
    assert_eq!(sent.len(), 1);
    assert_eq!(
        sent[0]["text"],
        "Sorry, something went wrong on my side. Please try again in a moment."
    );
    assert!(sent[0].get("reply_markup").is_none_or(Value::is_null));
}

#[tokio::test]
async fn update_rejected_by_the_store_is_processed_on_redelivery() {
    let (fake, upstream) = common::spawn_fake_upstream().await;
    let cfg = common::test_config(&upstream);
    let database_url = common::temp_database_url("tg-redeliver");
    let state = common::spawn_state_at(&database_url, &cfg).await;
    let app = openedu_router(state.clone());

    // A second connection takes the users table away to make the upsert fail.
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect(&database_url)
        .await
        .expect("side connection");
    sqlx::query("ALTER TABLE users RENAME TO users_offline")
        .execute(&pool)
        .await
        .expect("rename users");

    let status = post_update(&app, text_update(70, "/help")).await;
    assert!(status.is_server_error(), "unexpected status: {status}");
    // The id was not remembered, so Telegram's retry is not mistaken for a duplicate.
    assert!(state.first_sighting(70));
    state.forget_update(70);

    sqlx::query("ALTER TABLE users_offline RENAME TO users")
        .execute(&pool)
        .await
        .expect("restore users");

    assert_eq!(post_update(&app, text_update(70, "/help")).await, StatusCode::OK);
    let sent = fake.wait_for_messages(1).await;
    assert_eq!(sent.len(), 1);
    assert!(sent[0]["text"].as_str().expect("text").contains("/schedule"));

    // Accepted updates stay deduplicated.
    assert_eq!(post_update(&app, text_update(70, "/help")).await, StatusCode::OK);
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;
    assert_eq!(fake.sent().len(), 1);
}

mod common;

use chrono::{Duration, Utc};
use common::{ALICE, json_request, read_json};
use openedu::OpenEduError;
use openedu::db::{DbActorHandle, SchedulerCreate, SchedulerStatus};
use openedu::scheduler::DeliveryReport;
use openedu::server::router::{OpenEduState, openedu_router};
use axum::http::StatusCode;
use tower::ServiceExt as _;

const CHAT_ID: i64 = 9001;

async fn seed_series(db: &DbActorHandle, days: i64, next_run_at: chrono::DateTime<Utc>) -> i64 {
    let user = db
        .upsert_user_by_address(ALICE.to_lowercase(), 10)
        .await
        .expect("user");
    db.upsert_scheduler(SchedulerCreate {
        user_id: user.id,
        chat_id: CHAT_ID,
        total_days: days,
        content: "solidity".to_string(),
        breakdown: (1..=days).map(|d| format!("lesson {d}")).collect(),
        next_run_at,
    })
    .await
    .expect("series")
    .id
}

#[tokio::test]
async fn manual_delivery_walks_the_series_to_completion() {
    let (fake, upstream) = common::spawn_fake_upstream().await;
    let cfg = common::test_config(&upstream);
    let state = common::spawn_state("sched-walk", &cfg).await;
    let services = &state.services;

    let id = seed_series(&services.db, 2, Utc::now() + Duration::hours(1)).await;

    let report = services.scheduler.deliver_now(id).await.expect("day 1");
    match &report {
        DeliveryReport::Delivered {
            day,
            total_days,
            completed,
            next_run_at,
            quiz_url,
            ..
        } => {
            assert_eq!(*day, 1);
            assert_eq!(*total_days, 2);
            assert!(!completed);
            assert!(next_run_at.is_some());
            assert!(quiz_url.starts_with(common::WEB_BASE));
        }
        other => panic!("expected delivery, got {other:?}"),
    }
    assert_eq!(services.scheduler.armed().await.expect("armed"), vec![id]);

    let sent = fake.wait_for_messages(1).await;
    assert_eq!(sent[0]["chat_id"], CHAT_ID);
    assert!(sent[0]["text"].as_str().expect("text").starts_with("Day 1/2: lesson 1"));

    // The series context is passed to the quiz prompt for subtopics.
    let prompt = fake.llm_requests.lock().unwrap()[0]["messages"][1]["content"]
        .as_str()
        .expect("prompt")
        .to_string();
    assert!(prompt.contains("lesson 1"));
    assert!(prompt.contains("solidity"));

    let report = services.scheduler.deliver_now(id).await.expect("day 2");
    assert!(matches!(
        report,
        DeliveryReport::Delivered {
            day: 2,
            completed: true,
            next_run_at: None,
            ..
        }
    ));
    let row = services.db.get_scheduler(id).await.expect("row");
    assert_eq!(row.status(), SchedulerStatus::Completed);
    assert_eq!(row.day, 2);
    assert!(services.scheduler.armed().await.expect("armed").is_empty());

    let report = services.scheduler.deliver_now(id).await.expect("after completion");
    assert!(matches!(report, DeliveryReport::Skipped { .. }));
    assert_eq!(fake.sent().len(), 2);
}

#[tokio::test]
async fn failed_delivery_keeps_the_day_and_postpones() {
    let (fake, upstream) = common::spawn_fake_upstream().await;
    let cfg = common::test_config(&upstream);
    let state = common::spawn_state("sched-fail", &cfg).await;
    let services = &state.services;

    let id = seed_series(&services.db, 3, Utc::now() + Duration::hours(1)).await;

    fake.set_llm_output(Some("no quiz today"));
    let before = Utc::now();
    match services.scheduler.deliver_now(id).await {
        Err(OpenEduError::Llm(_)) => {}
        other => panic!("expected an LLM error, got {other:?}"),
    }

    let row = services.db.get_scheduler(id).await.expect("row");
    assert_eq!(row.day, 0);
    assert_eq!(row.status(), SchedulerStatus::Active);
    assert!(row.next_run_at >= before + Duration::seconds(3500));
    assert_eq!(services.scheduler.armed().await.expect("armed"), vec![id]);
    assert!(fake.sent().is_empty());

    fake.set_llm_output(None);
    let report = services.scheduler.deliver_now(id).await.expect("retry");
    assert!(matches!(report, DeliveryReport::Delivered { day: 1, .. }));
}

#[tokio::test]
async fn due_series_are_delivered_after_restart() {
    let (fake, upstream) = common::spawn_fake_upstream().await;
    let cfg = common::test_config(&upstream);

    let db = openedu::db::spawn(&common::temp_database_url("sched-restart"))
        .await
        .expect("spawn db actor");
    let overdue = seed_series(&db, 2, Utc::now() - Duration::minutes(5)).await;

    let services = openedu::Services::spawn(db.clone(), &cfg)
        .await
        .expect("spawn services");

    let sent = fake.wait_for_messages(1).await;
    assert_eq!(sent.len(), 1);
    assert!(sent[0]["text"].as_str().expect("text").starts_with("Day 1/2"));

    let mut day = 0;
    for _ in 0..100 {
        day = db.get_scheduler(overdue).await.expect("row").day;
        if day == 1 {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(25)).await;
    }
    assert_eq!(day, 1);
    assert_eq!(services.scheduler.armed().await.expect("armed"), vec![overdue]);
}

#[tokio::test]
async fn scheduler_routes_deliver_and_cancel() {
    let (_fake, upstream) = common::spawn_fake_upstream().await;
    let cfg = common::test_config(&upstream);
    let state: OpenEduState = common::spawn_state("sched-routes", &cfg).await;
    let id = seed_series(&state.services.db, 2, Utc::now() + Duration::hours(1)).await;
    let app = openedu_router(state);

    let resp = app
        .clone()
        .oneshot(json_request("POST", "/schedulers/4040/deliver", None))
        .await
        .expect("request failed");
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = app
        .clone()
        .oneshot(json_request("POST", &format!("/schedulers/{id}/deliver"), None))
        .await
        .expect("request failed");
    assert_eq!(resp.status(), StatusCode::OK);
    let report = read_json(resp).await;
    assert_eq!(report["status"], "delivered");
    assert_eq!(report["day"], 1);

    let resp = app
        .clone()
        .oneshot(json_request("GET", &format!("/users/{ALICE}/schedulers"), None))
        .await
        .expect("request failed");
    let rows = read_json(resp).await;
    assert_eq!(rows[0]["breakdown"][1], "lesson 2");
    assert_eq!(rows[0]["status"], "active");

    let resp = app
        .clone()
        .oneshot(json_request("POST", &format!("/schedulers/{id}/cancel"), None))
        .await
        .expect("request failed");
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(read_json(resp).await["status"], "cancelled");

    let resp = app
        .clone()
        .oneshot(json_request("POST", &format!("/schedulers/{id}/deliver"), None))
        .await
        .expect("request failed");
    let report = read_json(resp).await;
    assert_eq!(report["status"], "skipped");
}

#[tokio::test]
async fn series_replaced_mid_delivery_starts_over_cleanly() {
    let (fake, upstream) = common::spawn_fake_upstream().await;
    let cfg = common::test_config(&upstream);
    let state = common::spawn_state("sched-replace-race", &cfg).await;
    let services = &state.services;

    let id = seed_series(&services.db, 3, Utc::now() + Duration::hours(1)).await;
    let old = services.db.get_scheduler(id).await.expect("row");

    fake.set_send_delay(std::time::Duration::from_millis(800));
    let scheduler = services.scheduler.clone();
    let pending = tokio::spawn(async move { scheduler.deliver_now(id).await });
    fake.wait_for_send_attempts(1).await;

    // The user asks for a new series while day 1 of the old one is being sent.
    let replaced = seed_series(&services.db, 5, Utc::now()).await;
    assert_eq!(replaced, id);
    let new_row = services.db.get_scheduler(id).await.expect("row");
    assert!(new_row.revision > old.revision);
    services.scheduler.schedule(&new_row).expect("schedule");
    fake.set_send_delay(std::time::Duration::ZERO);

    let report = pending.await.expect("join").expect("old delivery");
    assert!(
        matches!(report, DeliveryReport::Skipped { .. }),
        "unexpected report: {report:?}"
    );

    // The deferred schedule delivers day 1 of the new series.
    let sent = fake.wait_for_messages(2).await;
    assert_eq!(sent.len(), 2);
    assert!(sent[0]["text"].as_str().expect("text").starts_with("Day 1/3"));
    assert!(sent[1]["text"].as_str().expect("text").starts_with("Day 1/5: lesson 1"));

    let mut row = services.db.get_scheduler(id).await.expect("row");
    for _ in 0..100 {
        if row.day == 1 {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(25)).await;
        row = services.db.get_scheduler(id).await.expect("row");
    }
    assert_eq!(row.day, 1);
    assert_eq!(row.total_days, 5);
    assert_eq!(row.status(), SchedulerStatus::Active);
}

#[tokio::test]
async fn series_stopped_mid_delivery_stays_stopped() {
    let (fake, upstream) = common::spawn_fake_upstream().await;
    let cfg = common::test_config(&upstream);
    let state = common::spawn_state("sched-stop-race", &cfg).await;
    let services = &state.services;

    let id = seed_series(&services.db, 3, Utc::now() + Duration::hours(1)).await;
    let user_id = services.db.get_scheduler(id).await.expect("row").user_id;

    fake.set_send_delay(std::time::Duration::from_millis(500));
    let scheduler = services.scheduler.clone();
    let pending = tokio::spawn(async move { scheduler.deliver_now(id).await });
    fake.wait_for_send_attempts(1).await;

    let cancelled = services
        .db
        .cancel_schedulers_for_user(user_id)
        .await
        .expect("cancel");
    assert_eq!(cancelled, vec![id]);
    services.scheduler.cancel(id).expect("cancel timer");

    let report = pending.await.expect("join").expect("delivery");
    assert!(matches!(report, DeliveryReport::Skipped { .. }));

    let row = services.db.get_scheduler(id).await.expect("row");
    assert_eq!(row.status(), SchedulerStatus::Cancelled);
    assert_eq!(row.day, 0);
    assert!(services.scheduler.armed().await.expect("armed").is_empty());
}

#[tokio::test]
async fn bot_api_failure_on_manual_delivery_is_bad_gateway() {
    let (fake, upstream) = common::spawn_fake_upstream().await;
    let cfg = common::test_config(&upstream);
    let state: OpenEduState = common::spawn_state("sched-tg-fail", &cfg).await;
    let id = seed_series(&state.services.db, 2, Utc::now() + Duration::hours(1)).await;
    let db = state.services.db.clone();
    let app = openedu_router(state);

    fake.set_telegram_failure(Some((
        StatusCode::BAD_REQUEST,
        r#"{"ok":false,"error_code":400,"description":"Bad Request: chat not found"}"#,
    )));
    let before = Utc::now();
    let resp = app
        .clone()
        .oneshot(json_request("POST", &format!("/schedulers/{id}/deliver"), None))
        .await
        .expect("request failed");
    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(read_json(resp).await["error"]["code"], "UPSTREAM_ERROR");

    let row = db.get_scheduler(id).await.expect("row");
    assert_eq!(row.day, 0);
    assert!(row.next_run_at >= before + Duration::seconds(3500));
}

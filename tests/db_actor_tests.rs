mod common;

use chrono::{Duration, Utc};
use openedu::OpenEduError;
use openedu::db::{self, SchedulerCreate, SchedulerPatch, SchedulerStatus};
use openedu_schema::{FlashcardDraft, QuizQuestion};

const ADDR_A: &str = "0x52908400098527886e0f7030069857d2e4169ee7";
const ADDR_B: &str = "0x8617e340b3d01fa5f11f306f4090fd50e238070d";

fn series(user_id: i64, chat_id: i64, content: &str, days: i64) -> SchedulerCreate {
    SchedulerCreate {
        user_id,
        chat_id,
        total_days: days,
        content: content.to_string(),
        breakdown: (1..=days).map(|d| format!("{content} part {d}")).collect(),
        next_run_at: Utc::now(),
    }
}

#[tokio::test]
async fn users_upsert_is_idempotent_and_credits_are_guarded() {
    let handle = db::spawn(&common::temp_database_url("db-users"))
        .await
        .expect("spawn db actor");

    let first = handle
        .upsert_user_by_address(ADDR_A.to_string(), 3)
        .await
        .expect("create user");
    assert_eq!(first.credits, 3);
    assert_eq!(first.xp, 0);

    // A second upsert returns the same row and does not grant credits again.
    let again = handle
        .upsert_user_by_address(ADDR_A.to_string(), 50)
        .await
        .expect("upsert existing user");
    assert_eq!(again.id, first.id);
    assert_eq!(again.credits, 3);

    let spent = handle.spend_credits(first.id, 2).await.expect("spend");
    assert_eq!(spent.credits, 1);

    match handle.spend_credits(first.id, 2).await {
        Err(OpenEduError::InsufficientCredits {
            required,
            available,
        }) => {
            assert_eq!(required, 2);
            assert_eq!(available, 1);
        }
        other => panic!("expected InsufficientCredits, got {other:?}"),
    }

    let refunded = handle.add_credits(first.id, 2).await.expect("refund");
    assert_eq!(refunded.credits, 3);

    let xp = handle.add_xp(first.id, 20).await.expect("add xp");
    assert_eq!(xp.xp, 20);

    let by_address = handle
        .get_user_by_address(ADDR_A.to_string())
        .await
        .expect("lookup by address");
    assert_eq!(by_address.id, first.id);

    assert!(matches!(
        handle.get_user(first.id + 1000).await,
        Err(OpenEduError::NotFound(_))
    ));
}

#[tokio::test]
async fn link_address_rejects_addresses_owned_by_someone_else() {
    let handle = db::spawn(&common::temp_database_url("db-link"))
        .await
        .expect("spawn db actor");

    let web_user = handle
        .upsert_user_by_address(ADDR_A.to_string(), 10)
        .await
        .expect("web user");
    let chat_user = handle
        .upsert_user_by_chat(4242, 10)
        .await
        .expect("chat user");
    assert_eq!(chat_user.telegram_chat_id, Some(4242));
    assert!(chat_user.address.is_none());

    let same = handle
        .upsert_user_by_chat(4242, 10)
        .await
        .expect("chat user again");
    assert_eq!(same.id, chat_user.id);

    assert!(matches!(
        handle.link_address(chat_user.id, ADDR_A.to_string()).await,
        Err(OpenEduError::Conflict(_))
    ));

    let linked = handle
        .link_address(chat_user.id, ADDR_B.to_string())
        .await
        .expect("link free address");
    assert_eq!(linked.address.as_deref(), Some(ADDR_B));

    // Linking the address a user already owns is a no-op.
    let relinked = handle
        .link_address(chat_user.id, ADDR_B.to_string())
        .await
        .expect("relink own address");
    assert_eq!(relinked.id, chat_user.id);
    assert_ne!(relinked.id, web_user.id);
}

#[tokio::test]
async fn notes_quizzes_and_flashcards_roundtrip() {
    let handle = db::spawn(&common::temp_database_url("db-notes"))
        .await
        .expect("spawn db actor");
    let user = handle
        .upsert_user_by_address(ADDR_A.to_string(), 10)
        .await
        .expect("user");

    let note = handle
        .create_note(user.id, "Photosynthesis turns light into sugar.".to_string())
        .await
        .expect("create note");
    let notes = handle.list_notes(user.id).await.expect("list notes");
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].id, note.id);

    let questions = vec![QuizQuestion {
        question: "What is produced?".to_string(),
        options: vec!["Sugar".to_string(), "Salt".to_string()],
        answer: 0,
        explanation: None,
    }];
    let quiz = handle
        .create_quiz(note.id, questions.clone())
        .await
        .expect("create quiz");
    assert_eq!(quiz.public_id.len(), 36);

    let fetched = handle
        .get_quiz_by_public_id(quiz.public_id.clone())
        .await
        .expect("fetch quiz");
    assert_eq!(fetched.questions().expect("decode questions"), questions);
    assert_eq!(handle.list_quizzes(note.id).await.expect("list").len(), 1);

    assert!(matches!(
        handle.get_quiz_by_public_id("missing".to_string()).await,
        Err(OpenEduError::NotFound(_))
    ));

    let cards = handle
        .create_flashcards(
            note.id,
            vec![
                FlashcardDraft {
                    front: "Chlorophyll".to_string(),
                    back: "Green pigment".to_string(),
                },
                FlashcardDraft {
                    front: "Stomata".to_string(),
                    back: "Leaf pores".to_string(),
                },
            ],
        )
        .await
        .expect("create flashcards");
    assert_eq!(cards.len(), 2);
    assert_eq!(cards[0].repetitions, 0);

    let due = Utc::now() + Duration::days(3);
    handle
        .patch_flashcard(
            cards[0].id,
            openedu::db::FlashcardPatch {
                repetitions: Some(1),
                interval_days: Some(3),
                due_at: Some(Some(due)),
                ..Default::default()
            },
        )
        .await
        .expect("patch flashcard");

    let card = handle.get_flashcard(cards[0].id).await.expect("get card");
    assert_eq!(card.repetitions, 1);
    assert_eq!(card.interval_days, 3);
    assert!(card.due_at.is_some());

    // Leaving `due_at` out keeps it; an explicit `None` clears it.
    handle
        .patch_flashcard(
            cards[0].id,
            openedu::db::FlashcardPatch {
                repetitions: Some(2),
                ..Default::default()
            },
        )
        .await
        .expect("patch repetitions");
    assert!(handle.get_flashcard(cards[0].id).await.expect("get card").due_at.is_some());

    handle
        .patch_flashcard(
            cards[0].id,
            openedu::db::FlashcardPatch {
                due_at: Some(None),
                ..Default::default()
            },
        )
        .await
        .expect("clear due_at");
    let card = handle.get_flashcard(cards[0].id).await.expect("get card");
    assert_eq!(card.repetitions, 2);
    assert!(card.due_at.is_none());
    assert_eq!(handle.list_flashcards(note.id).await.expect("list").len(), 2);
}

#[tokio::test]
async fn scheduler_upsert_replaces_the_active_series() {
    let handle = db::spawn(&common::temp_database_url("db-sched"))
        .await
        .expect("spawn db actor");
    let user = handle.upsert_user_by_chat(77, 10).await.expect("user");

    let first = handle
        .upsert_scheduler(series(user.id, 77, "rust", 3))
        .await
        .expect("create series");
    assert_eq!(first.day, 0);
    assert_eq!(first.status(), SchedulerStatus::Active);
    assert_eq!(first.breakdown().len(), 3);

    handle
        .patch_scheduler(
            first.id,
            SchedulerPatch {
                day: Some(2),
                ..Default::default()
            },
        )
        .await
        .expect("advance day");

    let replaced = handle
        .upsert_scheduler(series(user.id, 77, "solidity", 5))
        .await
        .expect("replace series");
    assert_eq!(replaced.id, first.id);
    assert_eq!(replaced.day, 0);
    assert_eq!(replaced.total_days, 5);
    assert_eq!(replaced.content, "solidity");
    assert!(replaced.revision > first.revision);

    // A write guarded by the old revision must not touch the replacement.
    let stale = handle
        .patch_scheduler(
            first.id,
            SchedulerPatch {
                day: Some(1),
                expected_revision: Some(first.revision),
                ..Default::default()
            },
        )
        .await;
    assert!(matches!(stale, Err(OpenEduError::Conflict(_))));
    assert_eq!(handle.get_scheduler(first.id).await.expect("get").day, 0);

    handle
        .patch_scheduler(
            first.id,
            SchedulerPatch {
                day: Some(1),
                expected_revision: Some(replaced.revision),
                ..Default::default()
            },
        )
        .await
        .expect("guarded patch at the current revision");
    assert_eq!(handle.get_scheduler(first.id).await.expect("get").day, 1);

    let active = handle.list_active_schedulers().await.expect("active");
    assert_eq!(active.len(), 1);

    let cancelled = handle
        .cancel_schedulers_for_user(user.id)
        .await
        .expect("cancel");
    assert_eq!(cancelled, vec![first.id]);

    let row = handle.get_scheduler(first.id).await.expect("get");
    assert_eq!(row.status(), SchedulerStatus::Cancelled);
    assert!(row.revision > replaced.revision);
    assert!(handle.list_active_schedulers().await.expect("active").is_empty());

    // Once nothing is active a new request starts a fresh row.
    let fresh = handle
        .upsert_scheduler(series(user.id, 77, "go", 2))
        .await
        .expect("new series");
    assert_ne!(fresh.id, first.id);
    assert_eq!(handle.list_schedulers(user.id).await.expect("all").len(), 2);
}

#[tokio::test]
async fn roundup_summary_accumulates_deposits() {
    let handle = db::spawn(&common::temp_database_url("db-roundup"))
        .await
        .expect("spawn db actor");
    let user = handle
        .upsert_user_by_address(ADDR_A.to_string(), 10)
        .await
        .expect("user");

    let empty = handle.roundup_summary(user.id).await.expect("summary");
    assert_eq!(empty.count, 0);
    assert_eq!(empty.total_deposit_cents, 0);

    handle.record_roundup(user.id, 1234, 66).await.expect("r1");
    handle.record_roundup(user.id, 500, 0).await.expect("r2");

    let summary = handle.roundup_summary(user.id).await.expect("summary");
    assert_eq!(summary.count, 2);
    assert_eq!(summary.total_deposit_cents, 66);
}

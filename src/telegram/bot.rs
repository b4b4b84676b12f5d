use super::command::{BotCommand, ParsedInput, parse_input};
use crate::db::{DbUser, SchedulerCreate};
use crate::error::OpenEduError;
use crate::learning::{normalize_address, quiz_link};
use crate::llm::DEFAULT_SCHEDULE_DAYS;
use crate::services::Services;
use chrono::Utc;
use openedu_schema::{Intent, IntentDecision};
use tracing::{info, warn};

pub const HELP_TEXT: &str = "Hi, I'm OpenEdu. Send me anything you want to learn.\n\n\
/quiz <topic> - a quiz right now\n\
/schedule <days> <topic> - one quiz per day\n\
/status - your active series\n\
/stop - stop your series\n\
/link <0x address> - connect your wallet\n\
/balance - credits and XP\n\n\
You can also just write \"quiz me on photosynthesis\" or \"teach me Solidity over 5 days\".";

const APOLOGY_TEXT: &str = "Sorry, something went wrong on my side. Please try again in a moment.";

/// Processes one text message from a chat. Errors are logged and answered with an apology.
pub async fn handle_message(services: Services, chat_id: i64, user: DbUser, text: String) {
    if let Err(e) = dispatch(&services, chat_id, &user, &text).await {
        warn!(chat_id, user_id = user.id, error = %e, "telegram message handling failed");
        if let Err(send_err) = services
            .telegram
            .send_message(chat_id, APOLOGY_TEXT, None)
            .await
        {
            warn!(chat_id, error = %send_err, "failed to send apology");
        }
    }
}

async fn dispatch(
    services: &Services,
    chat_id: i64,
    user: &DbUser,
    text: &str,
) -> Result<(), OpenEduError> {
    match parse_input(text) {
        ParsedInput::Command(command) => run_command(services, chat_id, user, command).await,
        ParsedInput::Text(text) => {
            let max_days = services.settings.scheduler.max_days;
            let decision = services.llm.classify_intent(&text, max_days).await?;
            info!(
                chat_id,
                intent = decision.intent.as_str(),
                days = ?decision.days,
                "message classified"
            );
            run_intent(services, chat_id, user, decision, &text).await
        }
    }
}

async fn run_command(
    services: &Services,
    chat_id: i64,
    user: &DbUser,
    command: BotCommand,
) -> Result<(), OpenEduError> {
    let telegram = &services.telegram;
    match command {
        BotCommand::Start | BotCommand::Help => telegram.send_message(chat_id, HELP_TEXT, None).await,

        BotCommand::Quiz(topic) if topic.is_empty() => {
            telegram
                .send_message(chat_id, "Usage: /quiz <topic>", None)
                .await
        }
        BotCommand::Quiz(topic) => quiz_now(services, chat_id, user, &topic).await,

        BotCommand::Schedule { topic, .. } if topic.is_empty() => {
            telegram
                .send_message(chat_id, "Usage: /schedule <days> <topic>", None)
                .await
        }
        BotCommand::Schedule { days, topic } => {
            let days = clamp_days(days, services.settings.scheduler.max_days);
            quiz_scheduling(services, chat_id, user, &topic, days).await
        }

        BotCommand::Status => {
            let active: Vec<_> = services
                .db
                .list_schedulers(user.id)
                .await?
                .into_iter()
                .filter(|s| s.is_active())
                .collect();

            let text = if active.is_empty() {
                "You have no active quiz series. Try /schedule 7 <topic>.".to_string()
            } else {
                let lines: Vec<String> = active
                    .iter()
                    .map(|s| {
                        format!(
                            "#{} {}: day {}/{}, next quiz {} UTC",
                            s.id,
                            s.content,
                            s.day,
                            s.total_days,
                            s.next_run_at.format("%Y-%m-%d %H:%M")
                        )
                    })
                    .collect();
                format!("Active series:\n{}", lines.join("\n"))
            };
            telegram.send_message(chat_id, &text, None).await
        }

        BotCommand::Stop => {
            let cancelled = services.db.cancel_schedulers_for_user(user.id).await?;
            for id in &cancelled {
                services.scheduler.cancel(*id)?;
            }
            info!(chat_id, user_id = user.id, cancelled = cancelled.len(), "series stopped");

            let text = match cancelled.len() {
                0 => "Nothing to stop.".to_string(),
                1 => "Stopped your quiz series.".to_string(),
                n => format!("Stopped {n} quiz series."),
            };
            telegram.send_message(chat_id, &text, None).await
        }

        BotCommand::Link(raw) => {
            let address = match normalize_address(&raw) {
                Ok(address) => address,
                Err(_) => {
                    return telegram
                        .send_message(chat_id, "Usage: /link 0x<40 hex digits>", None)
                        .await;
                }
            };
            let text = match services.db.link_address(user.id, address.clone()).await {
                Ok(_) => format!("Linked wallet {address}."),
                Err(OpenEduError::Conflict(_)) => {
                    "That wallet is already linked to another account.".to_string()
                }
                Err(e) => return Err(e),
            };
            telegram.send_message(chat_id, &text, None).await
        }

        BotCommand::Balance => {
            let user = services.db.get_user(user.id).await?;
            let text = format!("Credits: {}\nXP: {}", user.credits, user.xp);
            telegram.send_message(chat_id, &text, None).await
        }

        BotCommand::Unknown(name) => {
            let text = format!("I don't know /{name}. Send /help for what I can do.");
            telegram.send_message(chat_id, &text, None).await
        }
    }
}

async fn run_intent(
    services: &Services,
    chat_id: i64,
    user: &DbUser,
    decision: IntentDecision,
    text: &str,
) -> Result<(), OpenEduError> {
    let topic = decision.topic.unwrap_or_else(|| text.to_string());
    match decision.intent {
        Intent::QuizNow => quiz_now(services, chat_id, user, &topic).await,
        Intent::QuizScheduling => {
            let days = clamp_days(decision.days, services.settings.scheduler.max_days);
            quiz_scheduling(services, chat_id, user, &topic, days).await
        }
        Intent::General => {
            let reply = services.llm.chat(text).await?;
            services.telegram.send_message(chat_id, &reply, None).await
        }
    }
}

async fn quiz_now(
    services: &Services,
    chat_id: i64,
    user: &DbUser,
    topic: &str,
) -> Result<(), OpenEduError> {
    let questions = services
        .llm
        .generate_quiz(topic, services.settings.scheduler.questions_per_quiz)
        .await?;
    let count = questions.len();

    let note = services.db.create_note(user.id, topic.to_string()).await?;
    let quiz = services.db.create_quiz(note.id, questions).await?;
    let url = quiz_link(&services.settings.web_base_url, &quiz.public_id);

    info!(chat_id, user_id = user.id, quiz = %quiz.public_id, count, "quiz created from chat");

    let text = format!("Your quiz on {topic} is ready ({count} questions).");
    services
        .telegram
        .send_message(chat_id, &text, Some(("Open quiz", url.as_str())))
        .await
}

async fn quiz_scheduling(
    services: &Services,
    chat_id: i64,
    user: &DbUser,
    topic: &str,
    days: u32,
) -> Result<(), OpenEduError> {
    let breakdown = services.llm.breakdown(topic, days).await?;

    let row = services
        .db
        .upsert_scheduler(SchedulerCreate {
            user_id: user.id,
            chat_id,
            total_days: i64::from(days),
            content: topic.to_string(),
            breakdown,
            next_run_at: Utc::now(),
        })
        .await?;

    let text = format!(
        "Scheduled a {days}-day quiz series on {topic}. The first quiz is on its way, then one per day. Send /stop to end it."
    );
    services.telegram.send_message(chat_id, &text, None).await?;

    services.scheduler.schedule(&row)?;
    info!(chat_id, user_id = user.id, scheduler_id = row.id, days, "series scheduled");
    Ok(())
}

fn clamp_days(days: Option<u32>, max_days: u32) -> u32 {
    days.unwrap_or(DEFAULT_SCHEDULE_DAYS).clamp(1, max_days.max(1))
}

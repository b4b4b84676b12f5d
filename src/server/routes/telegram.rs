use crate::error::OpenEduError;
use crate::server::router::OpenEduState;
use crate::telegram::handle_message;
use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    routing::post,
};
use openedu_schema::TelegramUpdate;
use tracing::debug;

pub fn router() -> Router<OpenEduState> {
    Router::new().route("/telegram/webhook", post(telegram_webhook))
}

/// POST /telegram/webhook
///
/// Acknowledges as soon as the update is accepted; the reply is produced in a background task
/// so slow LLM calls never trigger a Telegram redelivery.
pub async fn telegram_webhook(
    State(state): State<OpenEduState>,
    payload: Result<Json<TelegramUpdate>, JsonRejection>,
) -> Result<StatusCode, OpenEduError> {
    let Json(update) = payload?;

    if !state.first_sighting(update.update_id) {
        debug!(update_id = update.update_id, "duplicate update ignored");
        return Ok(StatusCode::OK);
    }

    let Some((message, text)) = update.text_message() else {
        debug!(update_id = update.update_id, "non-text update ignored");
        return Ok(StatusCode::OK);
    };
    let chat_id = message.chat.id;
    let text = text.to_string();

    let services = state.services.clone();
    let user = match services
        .db
        .upsert_user_by_chat(chat_id, services.settings.rewards.starting_credits)
        .await
    {
        Ok(user) => user,
        Err(err) => {
            // Telegram redelivers on a non-2xx; let that retry through.
            state.forget_update(update.update_id);
            return Err(err);
        }
    };

    debug!(update_id = update.update_id, chat_id, user_id = user.id, "update accepted");
    tokio::spawn(handle_message(services, chat_id, user, text));
    Ok(StatusCode::OK)
}

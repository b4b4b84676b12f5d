use crate::db::DbUser;
use crate::error::OpenEduError;
use crate::learning::normalize_address;
use crate::server::router::OpenEduState;
use axum::{
    Router,
    body::Bytes,
    routing::{get, patch, post},
};
use serde::de::DeserializeOwned;
use tracing::{error, info};

pub mod flashcards;
pub mod health;
pub mod notes;
pub mod quizzes;
pub mod roundups;
pub mod schedulers;
pub mod telegram;
pub mod users;

/// Key-guarded REST routes.
pub fn api_router() -> Router<OpenEduState> {
    Router::new()
        .route("/users", post(users::create_user))
        .route("/users/{address}", get(users::get_user))
        .route(
            "/users/{address}/notes",
            post(notes::create_note).get(notes::list_notes),
        )
        .route(
            "/users/{address}/schedulers",
            get(schedulers::list_user_schedulers),
        )
        .route(
            "/users/{address}/roundups",
            post(roundups::create_roundup).get(roundups::roundup_summary),
        )
        .route("/notes/{id}", get(notes::get_note))
        .route("/notes/{id}/quiz", post(quizzes::generate_quiz))
        .route("/notes/{id}/quizzes", get(quizzes::list_note_quizzes))
        .route(
            "/notes/{id}/flashcards",
            post(flashcards::generate_flashcards).get(flashcards::list_flashcards),
        )
        .route("/flashcards/{id}", patch(flashcards::patch_flashcard))
        .route("/quizzes/{public_id}", get(quizzes::get_quiz))
        .route("/quizzes/{public_id}/submit", post(quizzes::submit_quiz))
        .route("/schedulers/{id}", get(schedulers::get_scheduler))
        .route("/schedulers/{id}/deliver", post(schedulers::deliver_scheduler))
        .route("/schedulers/{id}/cancel", post(schedulers::cancel_scheduler))
}

/// Looks up an existing user by a raw (unnormalized) wallet address.
pub(crate) async fn user_by_address(
    state: &OpenEduState,
    raw: &str,
) -> Result<DbUser, OpenEduError> {
    let address = normalize_address(raw)?;
    state.services.db.get_user_by_address(address).await
}

/// Runs a paid generation: credits are taken up front and refunded if `op` fails.
pub(crate) async fn charge_for<T, F, Fut>(
    state: &OpenEduState,
    user_id: i64,
    op: F,
) -> Result<T, OpenEduError>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, OpenEduError>>,
{
    let db = &state.services.db;
    let cost = state.services.settings.rewards.generation_cost.max(0);
    let user = db.spend_credits(user_id, cost).await?;
    info!(user_id, cost, remaining = user.credits, "credits spent");

    match op().await {
        Ok(value) => Ok(value),
        Err(e) => {
            if cost > 0
                && let Err(refund_err) = db.add_credits(user_id, cost).await
            {
                error!(user_id, cost, error = %refund_err, "credit refund failed");
            }
            Err(e)
        }
    }
}

/// Parses a JSON body that may be omitted entirely.
pub(crate) fn optional_json<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T, OpenEduError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| OpenEduError::InvalidJson(e.to_string()))
}

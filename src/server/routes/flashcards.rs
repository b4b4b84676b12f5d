use super::quizzes::GenerateRequest;
use super::{charge_for, optional_json};
use crate::db::{DbFlashcard, FlashcardPatch};
use crate::error::OpenEduError;
use crate::server::router::OpenEduState;
use axum::{
    Json,
    body::Bytes,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
};
use tracing::info;

/// POST /notes/{id}/flashcards
pub async fn generate_flashcards(
    State(state): State<OpenEduState>,
    Path(note_id): Path<i64>,
    body: Bytes,
) -> Result<(StatusCode, Json<Vec<DbFlashcard>>), OpenEduError> {
    let req: GenerateRequest = optional_json(&body)?;
    let count = req.count_or(state.services.settings.scheduler.questions_per_quiz);

    let note = state.services.db.get_note(note_id).await?;
    let cards = charge_for(&state, note.user_id, || async {
        let drafts = state
            .services
            .llm
            .generate_flashcards(&note.content, count)
            .await?;
        state.services.db.create_flashcards(note.id, drafts).await
    })
    .await?;

    info!(note_id, count = cards.len(), "flashcards generated");
    Ok((StatusCode::CREATED, Json(cards)))
}

/// GET /notes/{id}/flashcards
pub async fn list_flashcards(
    State(state): State<OpenEduState>,
    Path(note_id): Path<i64>,
) -> Result<Json<Vec<DbFlashcard>>, OpenEduError> {
    let note = state.services.db.get_note(note_id).await?;
    Ok(Json(state.services.db.list_flashcards(note.id).await?))
}

/// PATCH /flashcards/{id}
///
/// Stores review fields as given; nothing is recomputed server-side.
pub async fn patch_flashcard(
    State(state): State<OpenEduState>,
    Path(id): Path<i64>,
    payload: Result<Json<FlashcardPatch>, JsonRejection>,
) -> Result<Json<DbFlashcard>, OpenEduError> {
    let Json(patch) = payload?;
    state.services.db.patch_flashcard(id, patch).await?;
    Ok(Json(state.services.db.get_flashcard(id).await?))
}

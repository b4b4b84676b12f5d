use super::user_by_address;
use crate::db::DbNote;
use crate::error::OpenEduError;
use crate::server::router::OpenEduState;
use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct CreateNoteRequest {
    pub content: String,
}

/// POST /users/{address}/notes
pub async fn create_note(
    State(state): State<OpenEduState>,
    Path(address): Path<String>,
    payload: Result<Json<CreateNoteRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<DbNote>), OpenEduError> {
    let Json(req) = payload?;
    let content = req.content.trim();
    if content.is_empty() {
        return Err(OpenEduError::InvalidInput(
            "note content must not be empty".to_string(),
        ));
    }

    let user = user_by_address(&state, &address).await?;
    let note = state
        .services
        .db
        .create_note(user.id, content.to_string())
        .await?;
    Ok((StatusCode::CREATED, Json(note)))
}

/// GET /users/{address}/notes
pub async fn list_notes(
    State(state): State<OpenEduState>,
    Path(address): Path<String>,
) -> Result<Json<Vec<DbNote>>, OpenEduError> {
    let user = user_by_address(&state, &address).await?;
    Ok(Json(state.services.db.list_notes(user.id).await?))
}

/// GET /notes/{id}
pub async fn get_note(
    State(state): State<OpenEduState>,
    Path(id): Path<i64>,
) -> Result<Json<DbNote>, OpenEduError> {
    Ok(Json(state.services.db.get_note(id).await?))
}

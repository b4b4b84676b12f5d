use super::user_by_address;
use crate::db::RoundupSummary;
use crate::error::OpenEduError;
use crate::learning::round_up;
use crate::server::router::OpenEduState;
use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct RoundupRequest {
    pub total_cents: i64,
}

#[derive(Debug, Serialize)]
pub struct RoundupResponse {
    pub id: i64,
    pub total_cents: i64,
    pub rounded_cents: i64,
    pub deposit_cents: i64,
    pub created_at: DateTime<Utc>,
}

/// POST /users/{address}/roundups
///
/// The deposit is recorded in the local ledger only.
pub async fn create_roundup(
    State(state): State<OpenEduState>,
    Path(address): Path<String>,
    payload: Result<Json<RoundupRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<RoundupResponse>), OpenEduError> {
    let Json(req) = payload?;
    let rounded = round_up(req.total_cents)?;
    let user = user_by_address(&state, &address).await?;

    let row = state
        .services
        .db
        .record_roundup(user.id, rounded.total_cents, rounded.deposit_cents)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(RoundupResponse {
            id: row.id,
            total_cents: rounded.total_cents,
            rounded_cents: rounded.rounded_cents,
            deposit_cents: rounded.deposit_cents,
            created_at: row.created_at,
        }),
    ))
}

/// GET /users/{address}/roundups
pub async fn roundup_summary(
    State(state): State<OpenEduState>,
    Path(address): Path<String>,
) -> Result<Json<RoundupSummary>, OpenEduError> {
    let user = user_by_address(&state, &address).await?;
    Ok(Json(state.services.db.roundup_summary(user.id).await?))
}

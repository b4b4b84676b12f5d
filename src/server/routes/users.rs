use super::user_by_address;
use crate::db::DbUser;
use crate::error::OpenEduError;
use crate::learning::normalize_address;
use crate::server::router::OpenEduState;
use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
};
use serde::Deserialize;
use tracing::info;

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub address: String,
}

/// POST /users
///
/// Idempotent: an existing user is returned unchanged.
pub async fn create_user(
    State(state): State<OpenEduState>,
    payload: Result<Json<CreateUserRequest>, JsonRejection>,
) -> Result<Json<DbUser>, OpenEduError> {
    let Json(req) = payload?;
    let address = normalize_address(&req.address)?;

    let user = state
        .services
        .db
        .upsert_user_by_address(address, state.services.settings.rewards.starting_credits)
        .await?;
    info!(user_id = user.id, "user upserted");
    Ok(Json(user))
}

/// GET /users/{address}
pub async fn get_user(
    State(state): State<OpenEduState>,
    Path(address): Path<String>,
) -> Result<Json<DbUser>, OpenEduError> {
    Ok(Json(user_by_address(&state, &address).await?))
}

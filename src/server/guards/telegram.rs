use super::auth::AuthError;
use crate::server::router::OpenEduState;
use axum::{extract::FromRequestParts, http::request::Parts};
use subtle::ConstantTimeEq;

pub const TELEGRAM_SECRET_HEADER: &str = "x-telegram-bot-api-secret-token";

/// Checks `X-Telegram-Bot-Api-Secret-Token` when a webhook secret is configured.
#[derive(Debug, Clone, Copy)]
pub struct RequireTelegramSecret;

impl FromRequestParts<OpenEduState> for RequireTelegramSecret {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &OpenEduState,
    ) -> Result<Self, Self::Rejection> {
        let Some(expected) = state.webhook_secret.as_deref() else {
            return Ok(RequireTelegramSecret);
        };

        let provided = parts
            .headers
            .get(TELEGRAM_SECRET_HEADER)
            .map(|v| v.as_bytes())
            .unwrap_or_default();

        if provided.ct_eq(expected.as_bytes()).into() {
            Ok(RequireTelegramSecret)
        } else {
            Err(AuthError::InvalidWebhookSecret)
        }
    }
}

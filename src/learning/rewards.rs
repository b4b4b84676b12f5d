use crate::error::OpenEduError;
use serde::Serialize;

const CENTS_PER_UNIT: i64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RoundUp {
    pub total_cents: i64,
    pub rounded_cents: i64,
    pub deposit_cents: i64,
}

/// Rounds a purchase up to the next whole unit; the difference is the deposit.
pub fn round_up(total_cents: i64) -> Result<RoundUp, OpenEduError> {
    if total_cents < 0 {
        return Err(OpenEduError::InvalidInput(
            "total_cents must not be negative".to_string(),
        ));
    }

    let remainder = total_cents % CENTS_PER_UNIT;
    let deposit_cents = if remainder == 0 {
        0
    } else {
        CENTS_PER_UNIT - remainder
    };
    let rounded_cents = total_cents.checked_add(deposit_cents).ok_or_else(|| {
        OpenEduError::InvalidInput("total_cents is too large".to_string())
    })?;

    Ok(RoundUp {
        total_cents,
        rounded_cents,
        deposit_cents,
    })
}

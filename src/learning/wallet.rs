use crate::error::OpenEduError;

/// Validates an EVM address (`0x` + 40 hex digits) and returns it lowercased.
pub fn normalize_address(raw: &str) -> Result<String, OpenEduError> {
    let trimmed = raw.trim();
    let hex = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .ok_or_else(|| OpenEduError::InvalidInput(format!("address {trimmed:?} must start with 0x")))?;

    if hex.len() != 40 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(OpenEduError::InvalidInput(format!(
            "address {trimmed:?} must be 0x followed by 40 hex digits"
        )));
    }

    Ok(format!("0x{}", hex.to_ascii_lowercase()))
}

//! Pulling a JSON value out of free-form model output.

use serde::de::DeserializeOwned;

/// Parses `T` from model output.
///
/// Accepted, in order: the whole text, the first fenced code block, then the first
/// `{`/`[` position from which a complete `T` can be read.
pub fn extract_json<T: DeserializeOwned>(text: &str) -> Option<T> {
    let trimmed = text.trim();
    if let Ok(value) = serde_json::from_str::<T>(trimmed) {
        return Some(value);
    }

    if let Some(fenced) = fenced_block(trimmed)
        && let Ok(value) = serde_json::from_str::<T>(fenced)
    {
        return Some(value);
    }

    trimmed
        .char_indices()
        .filter(|(_, c)| *c == '{' || *c == '[')
        .find_map(|(idx, _)| {
            serde_json::Deserializer::from_str(&trimmed[idx..])
                .into_iter::<T>()
                .next()
                .and_then(Result::ok)
        })
}

fn fenced_block(text: &str) -> Option<&str> {
    let start = text.find("```")? + 3;
    let rest = &text[start..];
    // Skip an info string such as `json`.
    let body_start = rest.find('\n').map(|i| i + 1).unwrap_or(0);
    let body = &rest[body_start..];
    let end = body.find("```")?;
    Some(body[..end].trim())
}

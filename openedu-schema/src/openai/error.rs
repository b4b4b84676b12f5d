//! OpenAI-compatible error envelope returned by the LLM upstream.

use serde::{Deserialize, Serialize};

/// `{ "error": { "message": "...", "type": "...", "code": "..." } }`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenaiErrorBody {
    #[serde(rename = "error")]
    pub inner: OpenaiErrorObject,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenaiErrorObject {
    #[serde(default)]
    pub message: String,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

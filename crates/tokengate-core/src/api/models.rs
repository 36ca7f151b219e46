//! Wire types for the backend's JSON envelopes.
//!
//! Every response is wrapped in a `Message`: `title` and `description` are
//! human-readable, `result` carries the payload. Error responses put a list
//! of per-field validation failures in `result`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct Message<T> {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub result: T,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginResult {
    pub jwt: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ErrorEnvelope {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// Validation failures; absent or non-list payloads parse as empty
    #[serde(default, deserialize_with = "field_errors_or_empty")]
    pub result: Vec<FieldError>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FieldError {
    pub field: String,
    #[serde(default)]
    pub descriptions: Vec<String>,
}

impl ErrorEnvelope {
    /// Parse an error body. Only JSON objects carrying a title or
    /// description count as a structured payload.
    pub fn parse(body: &str) -> Option<Self> {
        let envelope: ErrorEnvelope = serde_json::from_str(body).ok()?;
        if envelope.title.is_none() && envelope.description.is_none() && envelope.result.is_empty() {
            return None;
        }
        Some(envelope)
    }
}

fn field_errors_or_empty<'de, D>(deserializer: D) -> Result<Vec<FieldError>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_default())
}

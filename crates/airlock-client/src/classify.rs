//! Normalization of launcher-reported error bodies.
//!
//! A decrypted (or plaintext) error body is either a bare string or a
//! structured object carrying `description` and `errorCode`. Structured
//! bodies override the HTTP status with their own code; bare strings keep
//! the status the response arrived with. The same normalization applies on
//! the handshake path and on authenticated calls.

use serde_json::Value;

pub(crate) struct LauncherFault {
    pub message: String,
    pub status: u16,
}

pub(crate) fn normalize(body: &Value, http_status: u16) -> LauncherFault {
    if let Value::Object(map) = body {
        if let Some(description) = map.get("description").and_then(Value::as_str) {
            let status = map
                .get("errorCode")
                .and_then(Value::as_i64)
                .and_then(|code| u16::try_from(code).ok())
                .unwrap_or(http_status);
            return LauncherFault {
                message: description.to_owned(),
                status,
            };
        }
    }
    let message = match body {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    };
    LauncherFault {
        message,
        status: http_status,
    }
}

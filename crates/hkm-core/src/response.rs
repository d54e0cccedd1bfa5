use serde::Serialize;
use serde_json::{json, Value};

/// Status code used when a failure never reached (or never got an answer
/// from) the server.
pub const STATUS_UNKNOWN: u16 = 500;

/// Tagged success/failure wrapper returned by every client operation.
///
/// Ordinary failures (network errors, non-2xx statuses, malformed bodies,
/// client-side validation) are represented here instead of as `Err`, so
/// conversational handlers can branch on [`ApiResponse::success`] and show
/// [`ApiResponse::message`] to the user.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ApiResponse {
    payload: Value,
    status_code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl ApiResponse {
    pub fn new(payload: Value, status_code: u16) -> Self {
        Self {
            payload,
            status_code,
            error: None,
        }
    }

    /// A failed result carrying `message` both as the error and in the payload.
    pub fn failure(status_code: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            payload: json!({ "message": message }),
            status_code,
            error: Some(message),
        }
    }

    /// Client-side validation failure. Never produced by a network round-trip.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::failure(400, message)
    }

    /// The server answered, but not with a body we could parse.
    pub fn invalid_format(status_code: u16) -> Self {
        Self::failure(status_code, "Invalid response format")
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }

    pub fn into_payload(self) -> Value {
        self.payload
    }

    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// 2xx status and no error string.
    pub fn success(&self) -> bool {
        (200..300).contains(&self.status_code)
            && self.error.as_deref().map_or(true, str::is_empty)
    }

    /// Human-readable message: the error if set, else `payload.message`, else "".
    pub fn message(&self) -> &str {
        if let Some(e) = self.error.as_deref().filter(|e| !e.is_empty()) {
            return e;
        }
        self.payload
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("")
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.payload.get(key)
    }

    /// The backend's own `status` field (`"success"` / `"error"`), if present.
    pub fn payload_status(&self) -> Option<&str> {
        self.payload.get("status").and_then(Value::as_str)
    }

    /// Transport success *and* the backend reported `"status": "success"`.
    pub fn is_confirmed(&self) -> bool {
        self.success() && self.payload_status() == Some("success")
    }
}

// Attendance lookup against the college portal. The portal call is the only
// adapter that never fails outward: every problem becomes a readable line of
// text for the user.

use async_trait::async_trait;
use secrecy::SecretString;
use serde_json::Value;
use thiserror::Error;

/// Prefix on every failure line this feature produces.
pub const ERROR_MARKER: &str = "❌";

#[derive(Debug, Error)]
pub enum AttendanceError {
    #[error("{0}")]
    Transport(String),

    #[error("portal returned HTTP {0}")]
    Status(u16),

    #[error("invalid attendance endpoint: {0}")]
    InvalidEndpoint(String),
}

#[async_trait]
pub trait AttendanceClient: Send + Sync {
    /// Raw response body for the given portal login.
    async fn fetch_raw(&self, student_id: &str, password: &SecretString) -> Result<String, AttendanceError>;
}

pub struct AttendanceService<C: AttendanceClient> {
    client: C,
}

impl<C: AttendanceClient> AttendanceService<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }

    pub async fn fetch(&self, student_id: &str, password: &SecretString) -> String {
        match self.client.fetch_raw(student_id, password).await {
            Ok(body) => format_attendance_body(&body),
            Err(err) => {
                tracing::warn!(error = %err, "Attendance lookup failed");
                format!("{} Error fetching attendance: {}", ERROR_MARKER, err)
            }
        }
    }
}

/// Render a portal response: objects become `key: value` lines, arrays one
/// line per element, anything that is not JSON is passed through untouched.
pub fn format_attendance_body(body: &str) -> String {
    match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(map)) => map
            .iter()
            .map(|(key, value)| format!("{}: {}", key, display_value(value)))
            .collect::<Vec<_>>()
            .join("\n"),
        Ok(Value::Array(items)) => items
            .iter()
            .map(display_value)
            .collect::<Vec<_>>()
            .join("\n"),
        Ok(other) => display_value(&other),
        Err(_) => body.to_string(),
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

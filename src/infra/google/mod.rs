pub mod calendar_client;
pub mod gmail_client;
pub mod oauth_client;

pub use calendar_client::GoogleCalendarClient;
pub use gmail_client::GmailApiClient;
pub use oauth_client::{ClientSecrets, GoogleOAuthClient};

use reqwest::StatusCode;
use serde::Deserialize;

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

/// Readable summary of a failed Google API response. Google wraps errors as
/// `{"error": {"code": 403, "message": "..."}}`; anything else falls back to
/// the status line.
pub(crate) fn describe_api_error(status: StatusCode, body: &str) -> String {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) if !envelope.error.message.is_empty() => {
            format!("HTTP {}: {}", status.as_u16(), envelope.error.message)
        }
        _ => format!("HTTP {}", status.as_u16()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describes_google_error_envelope() {
        let body = r#"{"error": {"code": 403, "message": "Rate Limit Exceeded", "status": "PERMISSION_DENIED"}}"#;
        assert_eq!(
            describe_api_error(StatusCode::FORBIDDEN, body),
            "HTTP 403: Rate Limit Exceeded"
        );
        assert_eq!(
            describe_api_error(StatusCode::BAD_GATEWAY, "<html>oops</html>"),
            "HTTP 502"
        );
    }
}

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use url::Url;

use crate::core::attendance::{AttendanceClient, AttendanceError};

pub const DEFAULT_ATTENDANCE_URL: &str =
    "https://a0qna69x15.execute-api.ap-southeast-2.amazonaws.com/dev/attendance";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Client for the portal's attendance endpoint.
///
/// The portal only accepts the login as query parameters, so the password
/// ends up in the request URL. To keep that URL from leaking anywhere else,
/// the endpoint must be HTTPS (plain HTTP is allowed for loopback only), the
/// URL is never logged, and transport errors are stripped of it.
pub struct HttpAttendanceClient {
    client: Client,
    endpoint: Url,
}

impl HttpAttendanceClient {
    pub fn new(endpoint: &str) -> Result<Self, AttendanceError> {
        let endpoint =
            Url::parse(endpoint).map_err(|e| AttendanceError::InvalidEndpoint(e.to_string()))?;

        let loopback = matches!(endpoint.host_str(), Some("127.0.0.1" | "localhost" | "[::1]"));
        if endpoint.scheme() != "https" && !(endpoint.scheme() == "http" && loopback) {
            return Err(AttendanceError::InvalidEndpoint(format!(
                "{} must use https",
                endpoint.scheme()
            )));
        }

        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| AttendanceError::Transport(e.to_string()))?;

        Ok(Self { client, endpoint })
    }
}

#[async_trait]
impl AttendanceClient for HttpAttendanceClient {
    async fn fetch_raw(&self, student_id: &str, password: &SecretString) -> Result<String, AttendanceError> {
        let response = self
            .client
            .get(self.endpoint.clone())
            .query(&[
                ("student_id", student_id),
                ("password", password.expose_secret()),
            ])
            .send()
            .await
            .map_err(|e| AttendanceError::Transport(e.without_url().to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AttendanceError::Status(status.as_u16()));
        }

        response
            .text()
            .await
            .map_err(|e| AttendanceError::Transport(e.without_url().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::attendance::AttendanceService;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn password() -> SecretString {
        SecretString::from("p@ss word".to_string())
    }

    async fn portal(status: u16, body: &str) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/dev/attendance"))
            .and(query_param("student_id", "S123"))
            .and(query_param("password", "p@ss word"))
            .respond_with(ResponseTemplate::new(status).set_body_string(body))
            .mount(&server)
            .await;
        server
    }

    #[tokio::test]
    async fn test_sends_login_as_query_parameters() {
        let server = portal(200, r#"{"present": 10, "absent": 2}"#).await;
        let client = HttpAttendanceClient::new(&format!("{}/dev/attendance", server.uri())).unwrap();

        let body = client.fetch_raw("S123", &password()).await.unwrap();
        assert_eq!(body, r#"{"present": 10, "absent": 2}"#);
    }

    #[tokio::test]
    async fn test_service_formats_portal_response() {
        let server = portal(200, r#"{"present": 10, "absent": 2}"#).await;
        let client = HttpAttendanceClient::new(&format!("{}/dev/attendance", server.uri())).unwrap();
        let service = AttendanceService::new(client);

        assert_eq!(service.fetch("S123", &password()).await, "present: 10\nabsent: 2");
    }

    #[tokio::test]
    async fn test_error_status_is_a_failure() {
        let server = portal(500, "Internal Server Error").await;
        let client = HttpAttendanceClient::new(&format!("{}/dev/attendance", server.uri())).unwrap();

        assert!(matches!(
            client.fetch_raw("S123", &password()).await,
            Err(AttendanceError::Status(500))
        ));
    }

    #[tokio::test]
    async fn test_transport_error_does_not_leak_password() {
        // Nothing listens on port 9 locally.
        let client = HttpAttendanceClient::new("http://127.0.0.1:9/dev/attendance").unwrap();
        let service = AttendanceService::new(client);

        let text = service.fetch("S123", &password()).await;
        assert!(text.starts_with("❌ Error fetching attendance:"));
        assert!(!text.contains("p@ss"));
        assert!(!text.contains("password="));
    }

    #[test]
    fn test_plain_http_is_rejected_for_remote_hosts() {
        assert!(matches!(
            HttpAttendanceClient::new("http://portal.example.edu/attendance"),
            Err(AttendanceError::InvalidEndpoint(_))
        ));
        assert!(HttpAttendanceClient::new(DEFAULT_ATTENDANCE_URL).is_ok());
        assert!(HttpAttendanceClient::new("not a url").is_err());
    }
}

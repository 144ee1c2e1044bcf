use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use super::describe_api_error;
use crate::core::calendar::{CalendarClient, CalendarError, CreatedEvent, EventRequest};

const CALENDAR_BASE_URL: &str = "https://www.googleapis.com/calendar/v3";

/// Wall-clock format Google expects alongside an explicit `timeZone`.
const LOCAL_DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EventBody<'a> {
    summary: &'a str,
    description: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    location: Option<&'a str>,
    start: EventTime,
    end: EventTime,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EventTime {
    date_time: String,
    time_zone: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InsertedEvent {
    id: String,
    #[serde(default)]
    html_link: Option<String>,
}

/// Inserts events into the user's primary calendar.
pub struct GoogleCalendarClient {
    client: Client,
    base_url: String,
}

impl GoogleCalendarClient {
    pub fn new() -> Self {
        Self::with_base_url(CALENDAR_BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

fn event_body(request: &EventRequest) -> EventBody<'_> {
    let zone = request.timezone.name().to_string();
    EventBody {
        summary: &request.summary,
        description: &request.description,
        location: request.location.as_deref(),
        start: EventTime {
            date_time: request.start.format(LOCAL_DATETIME_FORMAT).to_string(),
            time_zone: zone.clone(),
        },
        end: EventTime {
            date_time: request.end.format(LOCAL_DATETIME_FORMAT).to_string(),
            time_zone: zone,
        },
    }
}

#[async_trait]
impl CalendarClient for GoogleCalendarClient {
    async fn insert_event(&self, access_token: &str, request: &EventRequest) -> Result<CreatedEvent, CalendarError> {
        let response = self
            .client
            .post(format!("{}/calendars/primary/events", self.base_url))
            .bearer_auth(access_token)
            .json(&event_body(request))
            .send()
            .await
            .map_err(|e| CalendarError::Api(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(CalendarError::Unauthorized);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CalendarError::Api(describe_api_error(status, &body)));
        }

        let inserted: InsertedEvent = response
            .json()
            .await
            .map_err(|e| CalendarError::Api(format!("unexpected Calendar response: {}", e)))?;

        Ok(CreatedEvent {
            id: inserted.id,
            html_link: inserted.html_link,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request(location: Option<&str>) -> EventRequest {
        let day = NaiveDate::from_ymd_opt(2025, 7, 21).unwrap();
        EventRequest {
            summary: "Lecture 7".to_string(),
            description: "Bring notes".to_string(),
            start: day.and_hms_opt(10, 5, 0).unwrap(),
            end: day.and_hms_opt(11, 5, 0).unwrap(),
            timezone: chrono_tz::Asia::Kolkata,
            location: location.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_insert_posts_local_times_with_zone() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/calendars/primary/events"))
            .and(header("authorization", "Bearer tok"))
            .and(body_json(serde_json::json!({
                "summary": "Lecture 7",
                "description": "Bring notes",
                "start": {"dateTime": "2025-07-21T10:05:00", "timeZone": "Asia/Kolkata"},
                "end": {"dateTime": "2025-07-21T11:05:00", "timeZone": "Asia/Kolkata"}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "evt123",
                "htmlLink": "https://www.google.com/calendar/event?eid=evt123",
                "status": "confirmed"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = GoogleCalendarClient::with_base_url(server.uri());
        let created = client.insert_event("tok", &request(None)).await.unwrap();
        assert_eq!(created.id, "evt123");
        assert!(created.html_link.unwrap().ends_with("evt123"));
    }

    #[test]
    fn test_location_only_sent_when_present() {
        let with = serde_json::to_value(event_body(&request(Some("Hall B")))).unwrap();
        let without = serde_json::to_value(event_body(&request(None))).unwrap();
        assert_eq!(with["location"], "Hall B");
        assert!(without.get("location").is_none());
    }

    #[tokio::test]
    async fn test_rejected_insert_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/calendars/primary/events"))
            .respond_with(ResponseTemplate::new(403).set_body_json(serde_json::json!({
                "error": {"code": 403, "message": "Insufficient Permission"}
            })))
            .mount(&server)
            .await;

        let client = GoogleCalendarClient::with_base_url(server.uri());
        match client.insert_event("tok", &request(None)).await {
            Err(CalendarError::Api(detail)) => assert_eq!(detail, "HTTP 403: Insufficient Permission"),
            other => panic!("expected API error, got {:?}", other.map(|e| e.id)),
        }
    }
}

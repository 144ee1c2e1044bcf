// Calendar feature: turn an event description into a Google Calendar event
// and keep an append-only log of what was created.

use crate::core::credentials::Credential;
use crate::core::mail::EmailRecord;
use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use chrono_tz::Tz;
use thiserror::Error;

/// Zone used when an event does not name one.
pub const DEFAULT_TIMEZONE: Tz = chrono_tz::Asia::Kolkata;

/// Summary used when an email has no subject.
const FALLBACK_SUMMARY: &str = "Study Event";

#[derive(Debug, Error)]
pub enum CalendarError {
    #[error("Google Calendar rejected the stored authorization")]
    Unauthorized,

    #[error("Event must end after it starts")]
    InvalidWindow,

    #[error("Google Calendar API error: {0}")]
    Api(String),

    #[error("Calendar log storage error: {0}")]
    Storage(String),
}

/// What the caller wants created. Times are wall-clock times in `timezone`.
#[derive(Debug, Clone)]
pub struct EventSpec {
    pub summary: String,
    pub description: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub timezone: Option<Tz>,
    pub location: Option<String>,
}

impl EventSpec {
    /// The one-hour block starting five minutes from `now` that the
    /// "Create Calendar Event" button books for an email.
    pub fn from_email(email: &EmailRecord, now: NaiveDateTime) -> Self {
        let summary = if email.subject.trim().is_empty() {
            FALLBACK_SUMMARY.to_string()
        } else {
            email.subject.clone()
        };

        Self {
            summary,
            description: email.snippet.clone(),
            start: now + Duration::minutes(5),
            end: now + Duration::minutes(65),
            timezone: None,
            location: None,
        }
    }
}

/// Fully resolved request handed to the calendar client.
#[derive(Debug, Clone, PartialEq)]
pub struct EventRequest {
    pub summary: String,
    pub description: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub timezone: Tz,
    pub location: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CreatedEvent {
    pub id: String,
    pub html_link: Option<String>,
}

/// Row in the `calendar_events` log. Written once, never read back by the bot.
#[derive(Debug, Clone)]
pub struct EventRecord {
    pub user_id: u64,
    pub event_id: String,
    pub summary: String,
    pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait CalendarClient: Send + Sync {
    async fn insert_event(&self, access_token: &str, request: &EventRequest) -> Result<CreatedEvent, CalendarError>;
}

#[async_trait]
pub trait EventLogStore: Send + Sync {
    async fn append_event(&self, record: &EventRecord) -> Result<(), CalendarError>;
}

pub struct CalendarService<C: CalendarClient, S: EventLogStore> {
    client: C,
    store: S,
    default_timezone: Tz,
}

impl<C: CalendarClient, S: EventLogStore> CalendarService<C, S> {
    pub fn new(client: C, store: S, default_timezone: Tz) -> Self {
        Self {
            client,
            store,
            default_timezone,
        }
    }

    /// The current wall-clock time in the default zone.
    pub fn local_now(&self) -> NaiveDateTime {
        Utc::now().with_timezone(&self.default_timezone).naive_local()
    }

    pub fn resolve(&self, spec: EventSpec) -> Result<EventRequest, CalendarError> {
        if spec.end <= spec.start {
            return Err(CalendarError::InvalidWindow);
        }

        Ok(EventRequest {
            summary: spec.summary,
            description: spec.description,
            start: spec.start,
            end: spec.end,
            timezone: spec.timezone.unwrap_or(self.default_timezone),
            location: spec.location,
        })
    }

    /// Create the remote event, then log it. No idempotency key: calling this
    /// twice creates two events.
    pub async fn create_event(
        &self,
        user_id: u64,
        credential: &Credential,
        spec: EventSpec,
    ) -> Result<(EventRecord, CreatedEvent), CalendarError> {
        let request = self.resolve(spec)?;
        let created = self
            .client
            .insert_event(&credential.access_token, &request)
            .await?;

        let record = EventRecord {
            user_id,
            event_id: created.id.clone(),
            summary: request.summary.clone(),
            created_at: Utc::now(),
        };
        self.store.append_event(&record).await?;

        tracing::info!(user_id, event_id = %created.id, "Created calendar event");
        Ok((record, created))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingClient {
        requests: Mutex<Vec<EventRequest>>,
        fail: bool,
    }

    #[async_trait]
    impl CalendarClient for RecordingClient {
        async fn insert_event(&self, _: &str, request: &EventRequest) -> Result<CreatedEvent, CalendarError> {
            if self.fail {
                return Err(CalendarError::Api("quota exceeded".to_string()));
            }
            let mut requests = self.requests.lock().unwrap();
            requests.push(request.clone());
            Ok(CreatedEvent {
                id: format!("evt{}", requests.len()),
                html_link: None,
            })
        }
    }

    #[derive(Default)]
    struct MemoryLog {
        records: Mutex<Vec<EventRecord>>,
    }

    #[async_trait]
    impl EventLogStore for MemoryLog {
        async fn append_event(&self, record: &EventRecord) -> Result<(), CalendarError> {
            self.records.lock().unwrap().push(record.clone());
            Ok(())
        }
    }

    fn credential() -> Credential {
        Credential {
            user_id: 3,
            access_token: "token".to_string(),
            refresh_token: None,
            scopes: Vec::new(),
            expiry: None,
            token_uri: "https://oauth2.googleapis.com/token".to_string(),
        }
    }

    fn at(hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 7, 21)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    fn spec(timezone: Option<Tz>) -> EventSpec {
        EventSpec {
            summary: "Exam review".to_string(),
            description: "Chapters 1-4".to_string(),
            start: at(18, 0),
            end: at(19, 30),
            timezone,
            location: Some("Room 101".to_string()),
        }
    }

    #[tokio::test]
    async fn test_default_timezone_applied() {
        let service = CalendarService::new(
            RecordingClient::default(),
            MemoryLog::default(),
            DEFAULT_TIMEZONE,
        );
        service.create_event(3, &credential(), spec(None)).await.unwrap();

        let requests = service.client.requests.lock().unwrap();
        assert_eq!(requests[0].timezone, chrono_tz::Asia::Kolkata);
        assert_eq!(requests[0].location.as_deref(), Some("Room 101"));
    }

    #[tokio::test]
    async fn test_explicit_timezone_and_interval_preserved() {
        let service = CalendarService::new(
            RecordingClient::default(),
            MemoryLog::default(),
            DEFAULT_TIMEZONE,
        );
        service
            .create_event(3, &credential(), spec(Some(chrono_tz::Europe::London)))
            .await
            .unwrap();

        let requests = service.client.requests.lock().unwrap();
        assert_eq!(requests[0].timezone, chrono_tz::Europe::London);
        assert_eq!(requests[0].start, at(18, 0));
        assert_eq!(requests[0].end, at(19, 30));
    }

    #[tokio::test]
    async fn test_successful_creation_is_logged() {
        let service = CalendarService::new(
            RecordingClient::default(),
            MemoryLog::default(),
            DEFAULT_TIMEZONE,
        );
        let (record, created) = service.create_event(3, &credential(), spec(None)).await.unwrap();

        assert_eq!(record.event_id, created.id);
        let log = service.store.records.lock().unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].user_id, 3);
        assert_eq!(log[0].summary, "Exam review");
    }

    #[tokio::test]
    async fn test_failed_creation_is_not_logged() {
        let client = RecordingClient {
            fail: true,
            ..Default::default()
        };
        let service = CalendarService::new(client, MemoryLog::default(), DEFAULT_TIMEZONE);
        let err = service
            .create_event(3, &credential(), spec(None))
            .await
            .unwrap_err();

        assert!(matches!(err, CalendarError::Api(_)));
        assert!(service.store.records.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_calls_create_duplicate_events() {
        let service = CalendarService::new(
            RecordingClient::default(),
            MemoryLog::default(),
            DEFAULT_TIMEZONE,
        );
        service.create_event(3, &credential(), spec(None)).await.unwrap();
        service.create_event(3, &credential(), spec(None)).await.unwrap();
        assert_eq!(service.store.records.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_inverted_window_rejected() {
        let service = CalendarService::new(
            RecordingClient::default(),
            MemoryLog::default(),
            DEFAULT_TIMEZONE,
        );
        let mut backwards = spec(None);
        backwards.end = at(17, 0);
        assert!(matches!(
            service.resolve(backwards),
            Err(CalendarError::InvalidWindow)
        ));
    }

    #[test]
    fn test_email_event_window() {
        let email = EmailRecord {
            id: "m1".to_string(),
            subject: "".to_string(),
            sender: "ta@uni.edu".to_string(),
            snippet: "Lab moved".to_string(),
        };
        let spec = EventSpec::from_email(&email, at(10, 0));

        assert_eq!(spec.summary, "Study Event");
        assert_eq!(spec.description, "Lab moved");
        assert_eq!(spec.start, at(10, 5));
        assert_eq!(spec.end, at(11, 5));
        assert_eq!(spec.end - spec.start, Duration::minutes(60));
    }
}

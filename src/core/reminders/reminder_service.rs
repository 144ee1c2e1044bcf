// Reminder scheduling and the bookkeeping the notifier loop relies on.

use super::reminder_models::{DeliveryOutcome, NewReminder, Reminder};
use super::time_parser::parse_when;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use thiserror::Error;

/// Failed deliveries after which a reminder is closed anyway.
pub const MAX_DELIVERY_ATTEMPTS: u32 = 3;

/// Longest reminder text accepted. The delivered DM adds a short prefix and
/// must stay under Discord's 2000-character message limit.
pub const MAX_REMINDER_TEXT_CHARS: usize = 1900;

/// Separator between the reminder text and its time expression.
const TIME_SEPARATOR: &str = " at ";

#[derive(Debug, Error)]
pub enum ReminderError {
    #[error("Please specify the reminder in the format: <reminder text> at <date/time>")]
    MissingSeparator,

    #[error("The reminder text is empty")]
    EmptyText,

    #[error("The reminder text is too long ({0} characters). Please keep it to {max} characters or fewer.", max = MAX_REMINDER_TEXT_CHARS)]
    TextTooLong(usize),

    #[error("Couldn't parse the date/time `{0}`. Please try again with a clearer format.")]
    UnparseableTime(String),

    #[error("That time ({0}) is already in the past")]
    InPast(String),

    #[error("Reminder storage error: {0}")]
    Storage(String),
}

/// The `reminders` collection.
///
/// `mark_notified` must only ever flip `notified` from false to true, so two
/// cycles racing on the same row cannot resurrect it.
#[async_trait]
pub trait ReminderStore: Send + Sync {
    async fn insert_reminder(&self, reminder: &NewReminder) -> Result<Reminder, ReminderError>;

    /// Pending reminders whose time has come, oldest first.
    async fn due_reminders(&self, now: DateTime<Utc>) -> Result<Vec<Reminder>, ReminderError>;

    async fn mark_notified(&self, reminder_id: i64) -> Result<(), ReminderError>;

    /// Bump the failed-attempt counter and return its new value.
    async fn record_failed_attempt(&self, reminder_id: i64) -> Result<u32, ReminderError>;
}

/// Split `<text> at <time>` on the last " at ".
pub fn parse_reminder_request(request: &str) -> Result<(String, String), ReminderError> {
    let (text, when) = request
        .rsplit_once(TIME_SEPARATOR)
        .ok_or(ReminderError::MissingSeparator)?;

    let text = text.trim();
    if text.is_empty() {
        return Err(ReminderError::EmptyText);
    }
    let length = text.chars().count();
    if length > MAX_REMINDER_TEXT_CHARS {
        return Err(ReminderError::TextTooLong(length));
    }

    Ok((text.to_string(), when.trim().to_string()))
}

pub struct ReminderService<S: ReminderStore> {
    store: S,
    timezone: Tz,
}

impl<S: ReminderStore> ReminderService<S> {
    pub fn new(store: S, timezone: Tz) -> Self {
        Self { store, timezone }
    }

    /// Parse and persist a `/remind` request. Nothing is stored on failure.
    pub async fn schedule(&self, user_id: u64, request: &str) -> Result<Reminder, ReminderError> {
        self.schedule_at(user_id, request, Utc::now()).await
    }

    pub async fn schedule_at(
        &self,
        user_id: u64,
        request: &str,
        now: DateTime<Utc>,
    ) -> Result<Reminder, ReminderError> {
        let (text, when) = parse_reminder_request(request)?;
        let local_now = now.with_timezone(&self.timezone);
        let remind_at = parse_when(&when, local_now)
            .ok_or_else(|| ReminderError::UnparseableTime(when.clone()))?
            .with_timezone(&Utc);

        // "now" is allowed; anything strictly earlier is a typo.
        if remind_at < now {
            return Err(ReminderError::InPast(
                remind_at
                    .with_timezone(&self.timezone)
                    .format("%Y-%m-%d %H:%M")
                    .to_string(),
            ));
        }

        let reminder = self
            .store
            .insert_reminder(&NewReminder {
                user_id,
                text,
                remind_at,
            })
            .await?;

        tracing::info!(
            user_id,
            reminder_id = reminder.id,
            remind_at = %reminder.remind_at,
            "Scheduled reminder"
        );
        Ok(reminder)
    }

    pub async fn due(&self, now: DateTime<Utc>) -> Result<Vec<Reminder>, ReminderError> {
        self.store.due_reminders(now).await
    }

    /// Record the result of one delivery attempt.
    pub async fn record_delivery(
        &self,
        reminder: &Reminder,
        delivered: bool,
    ) -> Result<DeliveryOutcome, ReminderError> {
        if delivered {
            self.store.mark_notified(reminder.id).await?;
            return Ok(DeliveryOutcome::Delivered);
        }

        let attempts = self.store.record_failed_attempt(reminder.id).await?;
        if attempts >= MAX_DELIVERY_ATTEMPTS {
            self.store.mark_notified(reminder.id).await?;
            return Ok(DeliveryOutcome::GaveUp { attempts });
        }
        Ok(DeliveryOutcome::Retry { attempts })
    }

    /// Render a reminder time in the bot's zone, the way confirmations show it.
    pub fn display_time(&self, at: DateTime<Utc>) -> String {
        at.with_timezone(&self.timezone)
            .format("%Y-%m-%d %H:%M")
            .to_string()
    }
}

use chrono::{DateTime, Utc};

/// A stored reminder. `notified` flips from false to true exactly once.
#[derive(Debug, Clone, PartialEq)]
pub struct Reminder {
    pub id: i64,
    pub user_id: u64,
    pub text: String,
    pub remind_at: DateTime<Utc>,
    pub notified: bool,
    /// Failed delivery attempts so far.
    pub attempts: u32,
}

/// A reminder that has been parsed but not yet persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct NewReminder {
    pub user_id: u64,
    pub text: String,
    pub remind_at: DateTime<Utc>,
}

/// What the notifier should do with a reminder after one delivery attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered,
    /// Delivery failed; the reminder stays pending for the next cycle.
    Retry { attempts: u32 },
    /// Delivery failed too often; the reminder is closed without being delivered.
    GaveUp { attempts: u32 },
}

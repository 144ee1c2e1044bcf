pub mod notifier;
pub mod reminder_models;
pub mod reminder_service;
pub mod time_parser;

pub use notifier::{run_notifier, ReminderSink};
pub use reminder_models::{DeliveryOutcome, NewReminder, Reminder};
pub use reminder_service::{ReminderError, ReminderService, ReminderStore, MAX_REMINDER_TEXT_CHARS};

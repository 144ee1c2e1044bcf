// Discord layer - commands and event handlers.
//
// Everything here translates between Discord and the core services: pull
// primitive ids and text out of serenity types, call a service, render the
// result. No business rules live in this layer.

use std::sync::Arc;
use std::time::Duration;

use crate::core::attendance::AttendanceService;
use crate::core::calendar::CalendarService;
use crate::core::credentials::CredentialService;
use crate::core::mail::MailService;
use crate::core::reminders::ReminderService;
use crate::core::session::AttendanceSessions;
use crate::core::workers::IntegrationPool;
use crate::infra::attendance::HttpAttendanceClient;
use crate::infra::credentials::FileCredentialStore;
use crate::infra::documents::SqliteDocumentStore;
use crate::infra::google::{GmailApiClient, GoogleCalendarClient, GoogleOAuthClient};

#[path = "commands/command_catalog.rs"]
pub mod commands;

#[path = "interactions/email_buttons.rs"]
pub mod email_buttons;

#[path = "conversation/attendance_messages.rs"]
pub mod attendance_messages;

#[path = "reminders/reminder_delivery.rs"]
pub mod reminder_delivery;

#[path = "formatting.rs"]
pub mod formatting;

pub type Error = Box<dyn std::error::Error + Send + Sync>;
pub type Context<'a> = poise::Context<'a, Data, Error>;

pub type Credentials = CredentialService<FileCredentialStore, GoogleOAuthClient>;
pub type Mail = MailService<GmailApiClient, SqliteDocumentStore>;
pub type Calendar = CalendarService<GoogleCalendarClient, SqliteDocumentStore>;
pub type Attendance = AttendanceService<HttpAttendanceClient>;
pub type Reminders = ReminderService<SqliteDocumentStore>;

/// Shared state handed to every command and event handler.
///
/// Services sit behind `Arc` so a handler can move a clone into a task on
/// the integration pool.
pub struct Data {
    pub credentials: Arc<Credentials>,
    pub oauth: GoogleOAuthClient,
    pub mail: Arc<Mail>,
    pub calendar: Arc<Calendar>,
    pub attendance: Arc<Attendance>,
    pub reminders: Arc<Reminders>,
    pub attendance_sessions: Arc<AttendanceSessions>,
    pub pool: IntegrationPool,
    pub email_fetch_limit: usize,
    pub oauth_timeout: Duration,
}

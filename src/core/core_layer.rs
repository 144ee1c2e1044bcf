// The core module contains all business logic.
// Each feature gets its own submodule; none of them know about Discord.

#[path = "credentials/mod.rs"]
pub mod credentials;

#[path = "mail/mail_service.rs"]
pub mod mail;

#[path = "calendar/calendar_service.rs"]
pub mod calendar;

#[path = "attendance/attendance_service.rs"]
pub mod attendance;

#[path = "reminders/mod.rs"]
pub mod reminders;

#[path = "session/mod.rs"]
pub mod session;

#[path = "workers/integration_pool.rs"]
pub mod workers;

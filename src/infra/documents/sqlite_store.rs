// SQLite-backed document store holding the `emails`, `calendar_events` and
// `reminders` collections. One pool is shared by all three; clones are cheap.

use crate::core::calendar::{CalendarError, EventLogStore, EventRecord};
use crate::core::mail::{EmailRecord, EmailStore, MailError};
use crate::core::reminders::{NewReminder, Reminder, ReminderError, ReminderStore};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use sqlx::sqlite::{SqlitePoolOptions, SqliteRow};
use sqlx::{Pool, Row, Sqlite};
use std::path::Path;

#[derive(Clone)]
pub struct SqliteDocumentStore {
    pool: Pool<Sqlite>,
}

impl SqliteDocumentStore {
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        // sqlx creates the file with mode=rwc but not its directory.
        if !database_url.contains(":memory:") {
            let file = database_url
                .trim_start_matches("sqlite://")
                .trim_start_matches("sqlite:")
                .split('?')
                .next()
                .unwrap_or_default();
            if let Some(parent) = Path::new(file).parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
        }

        let pool = SqlitePoolOptions::new().connect(database_url).await?;
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Private in-memory database. A single connection, since every
    /// `:memory:` connection would otherwise see its own empty database.
    #[cfg(test)]
    pub async fn in_memory() -> anyhow::Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS emails (
                user_id INTEGER NOT NULL,
                message_id TEXT NOT NULL,
                subject TEXT NOT NULL,
                sender TEXT NOT NULL,
                snippet TEXT NOT NULL,
                stored_at TEXT NOT NULL,
                PRIMARY KEY (user_id, message_id)
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS calendar_events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                event_id TEXT NOT NULL,
                summary TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS reminders (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                reminder_text TEXT NOT NULL,
                remind_at INTEGER NOT NULL,
                notified BOOLEAN NOT NULL DEFAULT 0,
                attempts INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_reminders_pending ON reminders (notified, remind_at);",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn reminder_from_row(row: &SqliteRow) -> Result<Reminder, ReminderError> {
    let remind_at: i64 = row.get("remind_at");
    let remind_at = Utc
        .timestamp_opt(remind_at, 0)
        .single()
        .ok_or_else(|| ReminderError::Storage(format!("invalid remind_at {}", remind_at)))?;

    Ok(Reminder {
        id: row.get("id"),
        user_id: row.get::<i64, _>("user_id") as u64,
        text: row.get("reminder_text"),
        remind_at,
        notified: row.get("notified"),
        attempts: row.get::<i64, _>("attempts") as u32,
    })
}

#[async_trait]
impl EmailStore for SqliteDocumentStore {
    async fn save_email(&self, user_id: u64, email: &EmailRecord) -> Result<(), MailError> {
        // Stored emails are immutable; a second save of the same id is a no-op.
        sqlx::query(
            r#"
            INSERT INTO emails (user_id, message_id, subject, sender, snippet, stored_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(user_id, message_id) DO NOTHING
            "#,
        )
        .bind(user_id as i64)
        .bind(&email.id)
        .bind(&email.subject)
        .bind(&email.sender)
        .bind(&email.snippet)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| MailError::Storage(e.to_string()))?;
        Ok(())
    }

    async fn get_email(&self, user_id: u64, message_id: &str) -> Result<Option<EmailRecord>, MailError> {
        let row = sqlx::query(
            "SELECT message_id, subject, sender, snippet FROM emails WHERE user_id = ? AND message_id = ?",
        )
        .bind(user_id as i64)
        .bind(message_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| MailError::Storage(e.to_string()))?;

        Ok(row.map(|row| EmailRecord {
            id: row.get("message_id"),
            subject: row.get("subject"),
            sender: row.get("sender"),
            snippet: row.get("snippet"),
        }))
    }
}

#[async_trait]
impl EventLogStore for SqliteDocumentStore {
    async fn append_event(&self, record: &EventRecord) -> Result<(), CalendarError> {
        sqlx::query(
            "INSERT INTO calendar_events (user_id, event_id, summary, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(record.user_id as i64)
        .bind(&record.event_id)
        .bind(&record.summary)
        .bind(record.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| CalendarError::Storage(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl ReminderStore for SqliteDocumentStore {
    async fn insert_reminder(&self, reminder: &NewReminder) -> Result<Reminder, ReminderError> {
        let result = sqlx::query(
            r#"
            INSERT INTO reminders (user_id, reminder_text, remind_at, notified, attempts, created_at)
            VALUES (?, ?, ?, 0, 0, ?)
            "#,
        )
        .bind(reminder.user_id as i64)
        .bind(&reminder.text)
        .bind(reminder.remind_at.timestamp())
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| ReminderError::Storage(e.to_string()))?;

        Ok(Reminder {
            id: result.last_insert_rowid(),
            user_id: reminder.user_id,
            text: reminder.text.clone(),
            // Stored with second precision; hand back what a later read would see.
            remind_at: Utc
                .timestamp_opt(reminder.remind_at.timestamp(), 0)
                .single()
                .unwrap_or(reminder.remind_at),
            notified: false,
            attempts: 0,
        })
    }

    async fn due_reminders(&self, now: DateTime<Utc>) -> Result<Vec<Reminder>, ReminderError> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, reminder_text, remind_at, notified, attempts
            FROM reminders
            WHERE notified = 0 AND remind_at <= ?
            ORDER BY remind_at, id
            "#,
        )
        .bind(now.timestamp())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| ReminderError::Storage(e.to_string()))?;

        rows.iter().map(reminder_from_row).collect()
    }

    async fn mark_notified(&self, reminder_id: i64) -> Result<(), ReminderError> {
        sqlx::query("UPDATE reminders SET notified = 1 WHERE id = ? AND notified = 0")
            .bind(reminder_id)
            .execute(&self.pool)
            .await
            .map_err(|e| ReminderError::Storage(e.to_string()))?;
        Ok(())
    }

    async fn record_failed_attempt(&self, reminder_id: i64) -> Result<u32, ReminderError> {
        let row = sqlx::query(
            "UPDATE reminders SET attempts = attempts + 1 WHERE id = ? RETURNING attempts",
        )
        .bind(reminder_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| ReminderError::Storage(e.to_string()))?
        .ok_or_else(|| ReminderError::Storage(format!("reminder {} not found", reminder_id)))?;

        Ok(row.get::<i64, _>("attempts") as u32)
    }
}

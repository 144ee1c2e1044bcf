// Sends due reminders to their owners as direct messages.

use std::sync::Arc;

use async_trait::async_trait;
use poise::serenity_prelude as serenity;

use crate::core::reminders::{Reminder, ReminderSink};

pub struct DiscordReminderSink {
    http: Arc<serenity::Http>,
}

impl DiscordReminderSink {
    pub fn new(http: Arc<serenity::Http>) -> Self {
        Self { http }
    }
}

pub fn reminder_message(reminder: &Reminder) -> String {
    format!("⏰ Reminder: {}", reminder.text)
}

#[async_trait]
impl ReminderSink for DiscordReminderSink {
    async fn deliver(&self, reminder: &Reminder) -> Result<(), String> {
        let user = serenity::UserId::new(reminder.user_id);
        let channel = user
            .create_dm_channel(self.http.as_ref())
            .await
            .map_err(|e| format!("could not open DM channel: {}", e))?;

        channel
            .id
            .send_message(
                self.http.as_ref(),
                serenity::CreateMessage::new()
                    .content(reminder_message(reminder))
                    .allowed_mentions(serenity::CreateAllowedMentions::new().users(vec![user])),
            )
            .await
            .map_err(|e| format!("could not send DM: {}", e))?;

        tracing::debug!(reminder_id = reminder.id, user_id = reminder.user_id, "Reminder delivered");
        Ok(())
    }
}

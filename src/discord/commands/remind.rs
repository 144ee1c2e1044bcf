// Discord command for setting reminders.
//
// The reminder is persisted right away; the background notifier DMs the user
// once it's due, so reminders survive restarts.

use crate::core::reminders::ReminderError;
use crate::discord::{Context, Error};

const USAGE: &str = "Please specify the reminder in the format: `<reminder text> at <date/time>`\n\
    **Examples:**\n\
    - `Submit lab report at tomorrow 5pm`\n\
    - `Revise chapter 4 at in 2 hours`\n\
    - `Project demo at 2025-08-01 10:30`";

/// Set a reminder. The bot will DM you when it's due.
///
/// **Examples:**
/// - `/remind request:"Submit lab report at tomorrow 5pm"`
/// - `/remind request:"Call the library at Friday 11am"`
#[poise::command(slash_command)]
pub async fn remind(
    ctx: Context<'_>,
    #[description = "<reminder text> at <date/time>"] request: String,
) -> Result<(), Error> {
    let user_id = ctx.author().id.get();
    let reminders = &ctx.data().reminders;

    let reply = match reminders.schedule(user_id, &request).await {
        Ok(reminder) => format!(
            "⏰ Reminder set for {}! I'll DM you when it's due.",
            reminders.display_time(reminder.remind_at)
        ),
        Err(e) => reminder_problem(&e),
    };

    ctx.say(reply).await?;
    Ok(())
}

fn reminder_problem(err: &ReminderError) -> String {
    match err {
        ReminderError::MissingSeparator | ReminderError::EmptyText => USAGE.to_string(),
        ReminderError::Storage(detail) => {
            tracing::error!("Failed to store reminder: {}", detail);
            "❌ Error setting reminder. Please try again later.".to_string()
        }
        other => format!("❌ {}", other),
    }
}

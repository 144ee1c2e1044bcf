// `/attendance` starts the student-id/password conversation; `/cancel` ends it.
// The answers arrive as ordinary messages, see `discord::attendance_messages`.

use crate::discord::{Context, Error};

/// Check your attendance on the student portal.
#[poise::command(slash_command)]
pub async fn attendance(ctx: Context<'_>) -> Result<(), Error> {
    let user_id = ctx.author().id.get();
    let channel_id = ctx.channel_id().get();

    let sessions = &ctx.data().attendance_sessions;
    let restarted = sessions.is_active(user_id, channel_id);
    sessions.begin(user_id, channel_id);
    tracing::debug!(user_id, channel_id, restarted, "Attendance session started");

    let mut prompt = String::new();
    if restarted {
        prompt.push_str("Starting over.\n");
    }
    prompt.push_str("Please enter your Student ID:");
    if ctx.guild_id().is_some() {
        prompt.push_str(
            "\n⚠️ You'll be asked for your portal password next. I delete that message as soon as I read it, but a DM with me is safer.",
        );
    }

    ctx.say(prompt).await?;
    Ok(())
}

/// Stop an attendance check in progress.
#[poise::command(slash_command)]
pub async fn cancel(ctx: Context<'_>) -> Result<(), Error> {
    let cancelled = ctx
        .data()
        .attendance_sessions
        .cancel(ctx.author().id.get(), ctx.channel_id().get());

    let reply = if cancelled {
        "Attendance check cancelled."
    } else {
        "There's no attendance check to cancel."
    };
    ctx.say(reply).await?;
    Ok(())
}

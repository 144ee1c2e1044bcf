// Plain-message side of the attendance conversation.
//
// `/attendance` opens a session; the student id and password then arrive as
// ordinary messages in the same channel and are fed through here. In a
// server channel the result itself is sent by DM.

use std::sync::Arc;

use poise::serenity_prelude as serenity;

use crate::core::session::{AttendanceStep, FlowReply};
use crate::discord::formatting::{chunk_message, pool_problem, DISCORD_MESSAGE_LIMIT};
use crate::discord::{Data, Error};

pub async fn handle_message(
    ctx: &serenity::Context,
    data: &Data,
    message: &serenity::Message,
) -> Result<(), Error> {
    // Ignore bot messages (including our own)
    if message.author.bot {
        return Ok(());
    }

    let user_id = message.author.id.get();
    let channel_id = message.channel_id;
    let Some(reply) = data
        .attendance_sessions
        .advance(user_id, channel_id.get(), &message.content)
    else {
        return Ok(());
    };

    match reply {
        FlowReply::AskPassword => {
            channel_id.say(&ctx.http, "Now enter your password:").await?;
        }
        FlowReply::Reprompt(step) => {
            let prompt = match step {
                AttendanceStep::AwaitingId => "Please enter your Student ID:",
                AttendanceStep::AwaitingPassword { .. } => "Now enter your password:",
            };
            channel_id.say(&ctx.http, prompt).await?;
        }
        FlowReply::Dispatch {
            student_id,
            password,
        } => {
            // The password shouldn't sit in channel history. Bots can't
            // delete other users' messages in DMs, so this is best-effort.
            if message.guild_id.is_some() {
                if let Err(e) = message.delete(&ctx.http).await {
                    tracing::warn!(user_id, "Could not delete password message: {}", e);
                }
            }

            channel_id
                .say(&ctx.http, "⏳ Fetching your attendance, please wait...")
                .await?;

            let attendance = Arc::clone(&data.attendance);
            let text = match data
                .pool
                .run(async move { attendance.fetch(&student_id, &password).await })
                .await
            {
                Ok(text) => text,
                Err(e) => pool_problem(&e),
            };

            match ResultTarget::for_session(message.guild_id) {
                ResultTarget::Channel => {
                    for chunk in chunk_message(&text, DISCORD_MESSAGE_LIMIT) {
                        channel_id.say(&ctx.http, chunk).await?;
                    }
                }
                ResultTarget::DirectMessage => {
                    let notice = match send_dm(ctx, &message.author, &text).await {
                        Ok(()) => "📬 I've sent your attendance to your DMs.",
                        Err(e) => {
                            tracing::warn!(user_id, "Could not DM attendance result: {}", e);
                            "❌ I couldn't DM you the result. Please allow DMs from server members and try /attendance again."
                        }
                    };
                    channel_id.say(&ctx.http, notice).await?;
                }
            }
        }
    }

    Ok(())
}

/// Where an attendance result may be posted. Results started in a server
/// channel go to the user's DMs so other members never see them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ResultTarget {
    Channel,
    DirectMessage,
}

impl ResultTarget {
    fn for_session(guild_id: Option<serenity::GuildId>) -> Self {
        match guild_id {
            Some(_) => ResultTarget::DirectMessage,
            None => ResultTarget::Channel,
        }
    }
}

async fn send_dm(ctx: &serenity::Context, user: &serenity::User, text: &str) -> Result<(), Error> {
    let channel = user.create_dm_channel(&ctx.http).await?;
    for chunk in chunk_message(text, DISCORD_MESSAGE_LIMIT) {
        channel.id.say(&ctx.http, chunk).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guild_results_go_to_direct_messages() {
        assert_eq!(
            ResultTarget::for_session(Some(serenity::GuildId::new(1432001978447167611))),
            ResultTarget::DirectMessage
        );
        assert_eq!(ResultTarget::for_session(None), ResultTarget::Channel);
    }
}

// Discord commands module.
// Each feature gets its own command file.

use crate::discord::{Context, Data, Error};

pub mod account;

pub mod attendance;

pub mod emails;

pub mod remind;

/// Every slash command the bot registers.
pub fn all() -> Vec<poise::Command<Data, Error>> {
    vec![
        account::start(),
        account::login(),
        account::done(),
        emails::fetch_emails(),
        remind::remind(),
        attendance::attendance(),
        attendance::cancel(),
    ]
}

/// Reply so only the invoking user sees it. Follow-ups after
/// `defer_ephemeral` are public unless flagged again.
pub async fn say_ephemeral(ctx: Context<'_>, content: impl Into<String>) -> Result<(), Error> {
    ctx.send(ephemeral_reply(content)).await?;
    Ok(())
}

fn ephemeral_reply(content: impl Into<String>) -> poise::CreateReply {
    poise::CreateReply::default()
        .content(content)
        .ephemeral(true)
}

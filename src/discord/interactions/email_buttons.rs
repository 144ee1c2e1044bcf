// Button handling for the email cards posted by `/fetch_emails`.

use std::sync::Arc;

use poise::serenity_prelude as serenity;

use crate::core::calendar::EventSpec;
use crate::core::credentials::Credential;
use crate::core::mail::EmailRecord;
use crate::core::session::{EmailAction, EmailButton};
use crate::discord::formatting::{
    calendar_problem, credential_problem, escape_markdown, mail_problem, pool_problem,
    truncate_chars,
};
use crate::discord::{Data, Error};

const NOT_YOUR_CARD: &str = "These buttons belong to someone else's email list. Use /fetch_emails to see your own.";

/// The three buttons shown under each email card fetched by `owner_id`.
pub fn email_card_components(owner_id: u64, email_id: &str) -> Vec<serenity::CreateActionRow> {
    let button = |action: EmailAction, label: &str, style: serenity::ButtonStyle| {
        serenity::CreateButton::new(EmailButton::new(owner_id, action).custom_id())
            .label(label)
            .style(style)
    };

    vec![serenity::CreateActionRow::Buttons(vec![
        button(
            EmailAction::Expand(email_id.to_string()),
            "Expand Details",
            serenity::ButtonStyle::Primary,
        ),
        button(
            EmailAction::CreateEvent(email_id.to_string()),
            "Create Calendar Event",
            serenity::ButtonStyle::Success,
        ),
        button(
            EmailAction::Ignore(email_id.to_string()),
            "Ignore",
            serenity::ButtonStyle::Secondary,
        ),
    ])]
}

/// Route a component click. Components that aren't email buttons are left
/// for whoever created them.
pub async fn handle_component(
    ctx: &serenity::Context,
    data: &Data,
    interaction: &serenity::ComponentInteraction,
) -> Result<(), Error> {
    let custom_id = interaction.data.custom_id.as_str();
    if !EmailAction::is_email_component(custom_id) {
        return Ok(());
    }

    let Some(button) = EmailButton::parse(custom_id) else {
        tracing::warn!(custom_id, "Unrecognized email button");
        respond_ephemeral(ctx, interaction, "Unknown action.").await?;
        return Ok(());
    };

    let user_id = interaction.user.id.get();
    if !button.is_owned_by(user_id) {
        tracing::debug!(user_id, owner_id = button.owner_id, "Email button clicked by another user");
        respond_ephemeral(ctx, interaction, NOT_YOUR_CARD).await?;
        return Ok(());
    }

    let action = button.action;
    tracing::debug!(user_id, action = action.tag(), email_id = action.email_id(), "Email button clicked");

    match action {
        EmailAction::Ignore(_) => {
            interaction
                .create_response(
                    &ctx.http,
                    serenity::CreateInteractionResponse::UpdateMessage(
                        serenity::CreateInteractionResponseMessage::new().components(vec![]),
                    ),
                )
                .await?;
            followup(ctx, interaction, "✅ This email has been ignored.").await
        }
        EmailAction::Expand(email_id) => {
            interaction.defer(&ctx.http).await?;
            let reply = match load_email(data, user_id, &email_id).await {
                Ok((_, email)) => email_details(&email),
                Err(message) => message,
            };
            followup(ctx, interaction, &reply).await
        }
        EmailAction::CreateEvent(email_id) => {
            interaction.defer(&ctx.http).await?;
            let reply = match load_email(data, user_id, &email_id).await {
                Ok((credential, email)) => create_event(data, user_id, credential, &email).await,
                Err(message) => message,
            };
            followup(ctx, interaction, &reply).await
        }
    }
}

/// Resolve the user's credential and the email behind a button. Failures
/// come back as the message to show the user.
async fn load_email(
    data: &Data,
    user_id: u64,
    email_id: &str,
) -> Result<(Credential, EmailRecord), String> {
    let credential = data
        .credentials
        .authorized(user_id)
        .await
        .map_err(|e| credential_problem(&e))?;

    let mail = Arc::clone(&data.mail);
    let task_credential = credential.clone();
    let task_email_id = email_id.to_string();
    let email = data
        .pool
        .run(async move { mail.get(user_id, &task_credential, &task_email_id).await })
        .await
        .map_err(|e| pool_problem(&e))?
        .map_err(|e| {
            tracing::warn!(user_id, email_id, "Loading email failed: {}", e);
            mail_problem("loading email", &e)
        })?;

    Ok((credential, email))
}

async fn create_event(data: &Data, user_id: u64, credential: Credential, email: &EmailRecord) -> String {
    let calendar = Arc::clone(&data.calendar);
    let spec = EventSpec::from_email(email, calendar.local_now());

    match data
        .pool
        .run(async move { calendar.create_event(user_id, &credential, spec).await })
        .await
    {
        Ok(Ok((_, created))) => match created.html_link {
            Some(link) => format!("✅ Calendar event created!\n<{}>", link),
            None => "✅ Calendar event created!".to_string(),
        },
        Ok(Err(e)) => {
            tracing::warn!(user_id, "Creating calendar event failed: {}", e);
            calendar_problem(&e)
        }
        Err(e) => pool_problem(&e),
    }
}

fn email_details(email: &EmailRecord) -> String {
    format!(
        "**Subject:** {}\n**From:** {}\n**Snippet:** {}",
        escape_markdown(&truncate_chars(&email.subject, 300)),
        escape_markdown(&truncate_chars(&email.sender, 200)),
        escape_markdown(&truncate_chars(&email.snippet, 400))
    )
}

async fn followup(
    ctx: &serenity::Context,
    interaction: &serenity::ComponentInteraction,
    content: &str,
) -> Result<(), Error> {
    interaction
        .create_followup(
            &ctx.http,
            serenity::CreateInteractionResponseFollowup::new()
                .content(content)
                .ephemeral(true),
        )
        .await?;
    Ok(())
}

async fn respond_ephemeral(
    ctx: &serenity::Context,
    interaction: &serenity::ComponentInteraction,
    content: &str,
) -> Result<(), Error> {
    interaction
        .create_response(
            &ctx.http,
            serenity::CreateInteractionResponse::Message(
                serenity::CreateInteractionResponseMessage::new()
                    .content(content)
                    .ephemeral(true),
            ),
        )
        .await?;
    Ok(())
}

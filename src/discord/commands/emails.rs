// `/fetch_emails`: list study-related mail as task cards with action buttons.
//
// Everything is sent ephemerally: subjects and senders are private mail.
// The buttons are plain components with `email:<action>:<owner>:<id>` custom
// ids. Clicks are handled by `discord::email_buttons` from the gateway event,
// so cards keep working after a restart.

use std::sync::Arc;

use crate::core::mail::EmailRecord;
use crate::discord::commands::say_ephemeral;
use crate::discord::email_buttons::email_card_components;
use crate::discord::formatting::{
    credential_problem, escape_markdown, mail_problem, pool_problem, truncate_chars,
};
use crate::discord::{Context, Error};

const SNIPPET_PREVIEW_CHARS: usize = 200;
const SUBJECT_PREVIEW_CHARS: usize = 300;
const SENDER_PREVIEW_CHARS: usize = 200;

/// Show study-related emails from your recent Gmail messages.
#[poise::command(slash_command)]
pub async fn fetch_emails(ctx: Context<'_>) -> Result<(), Error> {
    ctx.defer_ephemeral().await?;

    let data = ctx.data();
    let user_id = ctx.author().id.get();

    let credential = match data.credentials.authorized(user_id).await {
        Ok(credential) => credential,
        Err(e) => {
            say_ephemeral(ctx, credential_problem(&e)).await?;
            return Ok(());
        }
    };

    let mail = Arc::clone(&data.mail);
    let limit = data.email_fetch_limit;
    let emails = match data
        .pool
        .run(async move { mail.list_recent(user_id, &credential, limit).await })
        .await
    {
        Ok(Ok(emails)) => emails,
        Ok(Err(e)) => {
            tracing::warn!(user_id, "Fetching emails failed: {}", e);
            say_ephemeral(ctx, mail_problem("fetching emails", &e)).await?;
            return Ok(());
        }
        Err(e) => {
            say_ephemeral(ctx, pool_problem(&e)).await?;
            return Ok(());
        }
    };

    if emails.is_empty() {
        say_ephemeral(ctx, "No study-related emails found in your recent Gmail.").await?;
        return Ok(());
    }

    say_ephemeral(
        ctx,
        format!(
            "Found {} study-related email{}. Displaying as tasks:",
            emails.len(),
            if emails.len() == 1 { "" } else { "s" }
        ),
    )
    .await?;

    // One bad card must not hide the rest.
    for (index, email) in emails.iter().enumerate() {
        let sent = ctx
            .send(
                poise::CreateReply::default()
                    .content(email_card(index + 1, email))
                    .components(email_card_components(user_id, &email.id))
                    .ephemeral(true),
            )
            .await;
        if let Err(e) = sent {
            tracing::warn!(user_id, message_id = %email.id, "Could not send email card: {}", e);
        }
    }

    Ok(())
}

fn email_card(position: usize, email: &EmailRecord) -> String {
    format!(
        "📝 **Task {}:** {}\n**From:** {}\n**Snippet:** {}",
        position,
        escape_markdown(&truncate_chars(&email.subject, SUBJECT_PREVIEW_CHARS)),
        escape_markdown(&truncate_chars(&email.sender, SENDER_PREVIEW_CHARS)),
        escape_markdown(&truncate_chars(&email.snippet, SNIPPET_PREVIEW_CHARS))
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discord::formatting::DISCORD_MESSAGE_LIMIT;

    #[test]
    fn test_email_card_escapes_and_truncates() {
        let email = EmailRecord {
            id: "m1".to_string(),
            subject: "*Exam* schedule".to_string(),
            sender: "Registrar <reg@uni.edu>".to_string(),
            snippet: "a".repeat(500),
        };

        let card = email_card(2, &email);
        assert!(card.starts_with("📝 **Task 2:** \\*Exam\\* schedule\n"));
        assert!(card.contains("**From:** Registrar <reg@\u{200B}uni.edu\\>"));
        let snippet = card.rsplit("**Snippet:** ").next().unwrap();
        assert_eq!(snippet.chars().count(), SNIPPET_PREVIEW_CHARS);
    }

    #[test]
    fn test_card_fits_in_one_message_for_any_header_length() {
        // Every character here gets escaped, doubling its length.
        let email = EmailRecord {
            id: "m2".to_string(),
            subject: "*".repeat(5000),
            sender: "_".repeat(5000),
            snippet: "`".repeat(5000),
        };

        let card = email_card(10, &email);
        assert!(card.chars().count() <= DISCORD_MESSAGE_LIMIT);
    }
}

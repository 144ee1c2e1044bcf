// Account commands: the welcome text and the Google sign-in flow.

use crate::core::credentials::GOOGLE_SCOPES;
use crate::discord::commands::say_ephemeral;
use crate::discord::{Context, Error};
use crate::infra::google::GoogleOAuthClient;

const WELCOME: &str = "👋 Hi! I'm your study assistant.\n\n\
    **Commands:**\n\
    • `/login` - connect your Google account (Gmail + Calendar)\n\
    • `/fetch_emails` - show study-related emails from your inbox\n\
    • `/remind` - set a reminder, e.g. `Submit lab report at tomorrow 5pm`\n\
    • `/attendance` - check your attendance on the student portal\n\
    • `/cancel` - stop an attendance check in progress";

/// Show what the bot can do.
#[poise::command(slash_command)]
pub async fn start(ctx: Context<'_>) -> Result<(), Error> {
    ctx.say(WELCOME).await?;
    Ok(())
}

/// Connect your Google account so the bot can read mail and add events.
///
/// The sign-in link is only shown to you. The command finishes once Google
/// redirects back, or after the login timeout.
#[poise::command(slash_command)]
pub async fn login(ctx: Context<'_>) -> Result<(), Error> {
    ctx.defer_ephemeral().await?;

    let data = ctx.data();
    let user_id = ctx.author().id.get();

    let pending = match data.oauth.begin_authorization().await {
        Ok(pending) => pending,
        Err(e) => {
            tracing::error!(user_id, "Could not start Google login: {}", e);
            say_ephemeral(ctx, format!("❌ Error during Google login: {}", e)).await?;
            return Ok(());
        }
    };

    ctx.send(
        poise::CreateReply::default()
            .content(format!(
                "🔐 Starting Google login...\n\n\
                 [Sign in with Google](<{}>)\n\n\
                 Finish within {} minutes. I'll confirm here once it's done.",
                pending.url,
                data.oauth_timeout.as_secs() / 60
            ))
            .ephemeral(true),
    )
    .await?;
    GoogleOAuthClient::open_in_browser(&pending);

    // Waiting on the user's browser is not integration work, so it stays off
    // the integration pool.
    let credential = match data
        .oauth
        .complete(pending, user_id, data.oauth_timeout)
        .await
    {
        Ok(credential) => credential,
        Err(e) => {
            tracing::warn!(user_id, "Google login failed: {}", e);
            say_ephemeral(ctx, format!("❌ Error during Google login: {}", e)).await?;
            return Ok(());
        }
    };

    if let Err(e) = data.credentials.save(user_id, &credential).await {
        tracing::error!(user_id, "Could not store Google credential: {}", e);
        say_ephemeral(ctx, format!("❌ Error during Google login: {}", e)).await?;
        return Ok(());
    }

    let mut reply = String::from("✅ Google account connected successfully!");
    let missing: Vec<&str> = GOOGLE_SCOPES
        .iter()
        .copied()
        .filter(|scope| scope.contains("gmail") || scope.contains("calendar"))
        .filter(|scope| !credential.scopes.is_empty() && !credential.has_scope(scope))
        .collect();
    if !missing.is_empty() {
        reply.push_str(&format!(
            "\n⚠️ Some permissions were not granted ({}). Related features won't work until you /login again and allow them.",
            missing.join(", ")
        ));
    }

    say_ephemeral(ctx, reply).await?;
    Ok(())
}

/// Older clients sent this after signing in. Login now completes by itself.
#[poise::command(slash_command)]
pub async fn done(ctx: Context<'_>) -> Result<(), Error> {
    let connected = ctx
        .data()
        .credentials
        .is_connected(ctx.author().id.get())
        .await?;

    let message = if connected {
        "✅ Your Google account is connected. Nothing else to do!"
    } else {
        "Login finishes automatically once you approve access in the browser. Use /login to start."
    };
    say_ephemeral(ctx, message).await?;
    Ok(())
}

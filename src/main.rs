// This is the entry point of the study assistant bot.
//
// **Architecture Overview:**
// - `core/` = Business logic (platform-agnostic)
// - `infra/` = Implementations of core traits (Google APIs, portal, storage)
// - `discord/` = Discord-specific adapters (commands, events)
//
// This file's job is to:
// 1. Load configuration
// 2. Initialize services (dependency injection)
// 3. Set up the Discord framework
// 4. Run the reminder notifier alongside the gateway and stop both cleanly

// These attrs point each module declaration at a more descriptive root file
// so we don't end up with half a dozen mod.rs files that all look the same.
#[path = "core/core_layer.rs"]
mod core;
#[path = "discord/discord_layer.rs"]
mod discord;
#[path = "infra/infra_layer.rs"]
mod infra;

mod config;

use std::sync::Arc;

use anyhow::Context as _;
use poise::serenity_prelude as serenity;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use crate::config::BotConfig;
use crate::core::attendance::AttendanceService;
use crate::core::calendar::CalendarService;
use crate::core::credentials::CredentialService;
use crate::core::mail::MailService;
use crate::core::reminders::{run_notifier, ReminderService};
use crate::core::session::AttendanceSessions;
use crate::core::workers::IntegrationPool;
use crate::discord::reminder_delivery::DiscordReminderSink;
use crate::discord::{attendance_messages, email_buttons, Data, Error};
use crate::infra::attendance::HttpAttendanceClient;
use crate::infra::credentials::FileCredentialStore;
use crate::infra::documents::SqliteDocumentStore;
use crate::infra::google::{ClientSecrets, GmailApiClient, GoogleCalendarClient, GoogleOAuthClient};

/// Event handler for non-command Discord events: attendance answers arrive
/// as messages, email card clicks as component interactions.
async fn event_handler(
    ctx: &serenity::Context,
    event: &serenity::FullEvent,
    _framework: poise::FrameworkContext<'_, Data, Error>,
    data: &Data,
) -> Result<(), Error> {
    match event {
        serenity::FullEvent::Message { new_message } => {
            if let Err(e) = attendance_messages::handle_message(ctx, data, new_message).await {
                tracing::error!("Error handling attendance message: {}", e);
            }
        }
        serenity::FullEvent::InteractionCreate {
            interaction: serenity::Interaction::Component(component),
        } => {
            if let Err(e) = email_buttons::handle_component(ctx, data, component).await {
                tracing::error!(custom_id = %component.data.custom_id, "Error handling button: {}", e);
            }
        }
        _ => {}
    }

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file (if it exists)
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = BotConfig::from_env()?;

    // ========================================================================
    // DEPENDENCY INJECTION
    // ========================================================================
    // This is the "composition root" where we wire everything together.

    let documents = SqliteDocumentStore::connect(&config.database_url)
        .await
        .context("Failed to initialize SQLite store")?;

    let secrets = ClientSecrets::from_file(&config.client_secret_file).await?;
    let oauth = GoogleOAuthClient::new(secrets);

    let credentials = Arc::new(CredentialService::new(
        FileCredentialStore::new(&config.token_storage_dir),
        oauth.clone(),
    ));
    let mail = Arc::new(MailService::new(GmailApiClient::new(), documents.clone()));
    let calendar = Arc::new(CalendarService::new(
        GoogleCalendarClient::new(),
        documents.clone(),
        config.timezone,
    ));
    let attendance = Arc::new(AttendanceService::new(
        HttpAttendanceClient::new(&config.attendance_api_url)
            .context("Invalid ATTENDANCE_API_URL")?,
    ));
    let reminders = Arc::new(ReminderService::new(documents, config.timezone));

    let pool = IntegrationPool::new(config.integration_workers);
    tracing::info!(
        workers = pool.size(),
        timezone = config.timezone.name(),
        "Services initialized"
    );

    let data = Data {
        credentials,
        oauth,
        mail,
        calendar,
        attendance,
        reminders: Arc::clone(&reminders),
        attendance_sessions: Arc::new(AttendanceSessions::new()),
        pool: pool.clone(),
        email_fetch_limit: config.email_fetch_limit,
        oauth_timeout: config.oauth_timeout,
    };

    // ========================================================================
    // DISCORD FRAMEWORK SETUP
    // ========================================================================

    let intents = serenity::GatewayIntents::GUILD_MESSAGES
        | serenity::GatewayIntents::DIRECT_MESSAGES
        | serenity::GatewayIntents::MESSAGE_CONTENT // Required to read attendance answers
        | serenity::GatewayIntents::GUILDS;

    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: discord::commands::all(),
            event_handler: |ctx, event, framework, data| {
                Box::pin(event_handler(ctx, event, framework, data))
            },
            ..Default::default()
        })
        .setup(|ctx, ready, framework| {
            Box::pin(async move {
                // Global registration can take a while to propagate.
                poise::builtins::register_globally(ctx, &framework.options().commands).await?;
                tracing::info!(user = %ready.user.name, "Commands registered, bot is ready");
                Ok(data)
            })
        })
        .build();

    let mut client = serenity::ClientBuilder::new(&config.discord_token, intents)
        .framework(framework)
        .await
        .context("Error creating client")?;

    // Background reminder delivery, stopped through `shutdown`.
    let shutdown = CancellationToken::new();
    let notifier = tokio::spawn(run_notifier(
        reminders,
        Arc::new(DiscordReminderSink::new(client.http.clone())),
        config.reminder_poll_interval,
        shutdown.clone(),
    ));

    let shard_manager = client.shard_manager.clone();
    let ctrl_c_shutdown = shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Could not listen for ctrl-c: {}", e);
            return;
        }
        tracing::info!("Shutting down");
        ctrl_c_shutdown.cancel();
        shard_manager.shutdown_all().await;
    });

    let result = client.start().await;

    shutdown.cancel();
    if let Err(e) = notifier.await {
        tracing::error!("Reminder notifier task failed: {}", e);
    }
    pool.close();

    result.context("Error running bot")
}

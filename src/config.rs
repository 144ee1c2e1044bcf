// Process configuration, read once at startup from the environment (after
// `.env` has been loaded).

use anyhow::{anyhow, Context};
use chrono_tz::Tz;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::infra::attendance::DEFAULT_ATTENDANCE_URL;

pub struct BotConfig {
    pub discord_token: String,
    pub client_secret_file: PathBuf,
    pub token_storage_dir: PathBuf,
    pub database_url: String,
    pub attendance_api_url: String,
    pub timezone: Tz,
    pub reminder_poll_interval: Duration,
    pub email_fetch_limit: usize,
    pub integration_workers: usize,
    pub oauth_timeout: Duration,
}

impl BotConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let discord_token = var("DISCORD_TOKEN").ok_or_else(|| {
            anyhow!("Missing DISCORD_TOKEN environment variable! Create a .env file with your bot token.")
        })?;

        let timezone = match var("BOT_TIMEZONE") {
            Some(name) => Tz::from_str(name.trim())
                .map_err(|e| anyhow!("BOT_TIMEZONE `{}` is not a known timezone: {}", name, e))?,
            None => crate::core::calendar::DEFAULT_TIMEZONE,
        };

        Ok(Self {
            discord_token,
            client_secret_file: var("CLIENT_SECRET_FILE")
                .unwrap_or_else(|| "client_secret.json".to_string())
                .into(),
            token_storage_dir: var("TOKEN_STORAGE_DIR")
                .unwrap_or_else(|| "user_tokens".to_string())
                .into(),
            database_url: var("DATABASE_URL")
                .unwrap_or_else(|| "sqlite://data/assistant.db?mode=rwc".to_string()),
            attendance_api_url: var("ATTENDANCE_API_URL")
                .unwrap_or_else(|| DEFAULT_ATTENDANCE_URL.to_string()),
            timezone,
            reminder_poll_interval: Duration::from_secs(positive(&var, "REMINDER_POLL_SECONDS", 60)?),
            email_fetch_limit: positive(&var, "EMAIL_FETCH_LIMIT", 10)? as usize,
            integration_workers: positive(&var, "INTEGRATION_WORKERS", 8)? as usize,
            oauth_timeout: Duration::from_secs(positive(&var, "OAUTH_TIMEOUT_SECONDS", 300)?),
        })
    }
}

/// A positive integer variable, or `default` when unset.
fn positive(var: &impl Fn(&str) -> Option<String>, key: &str, default: u64) -> anyhow::Result<u64> {
    let Some(raw) = var(key) else {
        return Ok(default);
    };
    let value: u64 = raw
        .trim()
        .parse()
        .with_context(|| format!("{} must be a positive integer, got `{}`", key, raw))?;
    if value == 0 {
        return Err(anyhow!("{} must be greater than zero", key));
    }
    Ok(value)
}

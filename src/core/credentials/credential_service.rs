// Credential lifecycle: map a chat user to stored OAuth tokens and gate every
// downstream Google call on their presence. Like the rest of `core/`, nothing
// here knows about Discord or HTTP.

use super::credential_models::Credential;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("No Google account is connected for this user")]
    NotAuthorized,

    #[error("The stored Google authorization has expired")]
    Expired,

    #[error("Token refresh failed: {0}")]
    RefreshFailed(String),

    #[error("Credential storage error: {0}")]
    Storage(String),
}

/// Durable per-user credential persistence.
///
/// The store performs no expiry checks and no network refresh; that is the
/// service's job.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Persist the credential, replacing any previous one. Returns where it was written.
    async fn save(&self, user_id: u64, credential: &Credential) -> Result<String, CredentialError>;

    /// Load the stored credential, or `None` if this user never authorized.
    async fn load(&self, user_id: u64) -> Result<Option<Credential>, CredentialError>;
}

/// Exchanges a refresh token for a fresh access token.
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    async fn refresh(&self, credential: &Credential) -> Result<Credential, CredentialError>;
}

pub struct CredentialService<S: CredentialStore, R: TokenRefresher> {
    store: S,
    refresher: R,
    refresh_margin: Duration,
}

impl<S: CredentialStore, R: TokenRefresher> CredentialService<S, R> {
    pub fn new(store: S, refresher: R) -> Self {
        Self {
            store,
            refresher,
            refresh_margin: Duration::seconds(60),
        }
    }

    pub async fn save(&self, user_id: u64, credential: &Credential) -> Result<String, CredentialError> {
        self.store.save(user_id, credential).await
    }

    pub async fn is_connected(&self, user_id: u64) -> Result<bool, CredentialError> {
        Ok(self.store.load(user_id).await?.is_some())
    }

    /// Return a credential that is usable right now, refreshing it first if needed.
    pub async fn authorized(&self, user_id: u64) -> Result<Credential, CredentialError> {
        self.authorized_at(user_id, Utc::now()).await
    }

    pub async fn authorized_at(
        &self,
        user_id: u64,
        now: DateTime<Utc>,
    ) -> Result<Credential, CredentialError> {
        let credential = self
            .store
            .load(user_id)
            .await?
            .ok_or(CredentialError::NotAuthorized)?;

        if !credential.expires_within(now, self.refresh_margin) {
            return Ok(credential);
        }

        if !credential.can_refresh() {
            tracing::info!(user_id, "Stored credential expired and cannot be refreshed");
            return Err(CredentialError::Expired);
        }

        let mut refreshed = self.refresher.refresh(&credential).await?;
        refreshed.user_id = user_id;
        // Google omits the refresh token on refresh responses; keep the old one.
        if refreshed.refresh_token.is_none() {
            refreshed.refresh_token = credential.refresh_token.clone();
        }

        self.store.save(user_id, &refreshed).await?;
        tracing::debug!(user_id, "Refreshed Google access token");
        Ok(refreshed)
    }
}

// Mailbox feature: pull the newest messages, keep the study-related ones, and
// remember them so the button callbacks can find them again later.

use crate::core::credentials::Credential;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Subject keywords that mark an email as study-related (matched case-insensitively).
pub const STUDY_KEYWORDS: &[&str] = &[
    "assignment",
    "exam",
    "project",
    "class",
    "lecture",
    "homework",
    "study",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailRecord {
    pub id: String,
    pub subject: String,
    pub sender: String,
    pub snippet: String,
}

#[derive(Debug, Error)]
pub enum MailError {
    #[error("Gmail rejected the stored authorization")]
    Unauthorized,

    #[error("Email {0} was not found")]
    NotFound(String),

    #[error("Gmail API error: {0}")]
    Api(String),

    #[error("Email storage error: {0}")]
    Storage(String),
}

/// The subset of the Gmail API this feature needs.
#[async_trait]
pub trait MailboxClient: Send + Sync {
    /// Ids of the newest messages, most recent first.
    async fn list_message_ids(&self, access_token: &str, limit: usize) -> Result<Vec<String>, MailError>;

    async fn get_message(&self, access_token: &str, message_id: &str) -> Result<EmailRecord, MailError>;
}

/// The `emails` collection, keyed by (user, message id).
#[async_trait]
pub trait EmailStore: Send + Sync {
    async fn save_email(&self, user_id: u64, email: &EmailRecord) -> Result<(), MailError>;

    async fn get_email(&self, user_id: u64, message_id: &str) -> Result<Option<EmailRecord>, MailError>;
}

pub fn is_study_related(subject: &str) -> bool {
    let subject = subject.to_lowercase();
    STUDY_KEYWORDS.iter().any(|keyword| subject.contains(keyword))
}

pub struct MailService<C: MailboxClient, S: EmailStore> {
    client: C,
    store: S,
}

impl<C: MailboxClient, S: EmailStore> MailService<C, S> {
    pub fn new(client: C, store: S) -> Self {
        Self { client, store }
    }

    /// Fetch up to `limit` recent messages and return the study-related ones,
    /// in the mailbox's recency order. Every returned record is persisted.
    pub async fn list_recent(
        &self,
        user_id: u64,
        credential: &Credential,
        limit: usize,
    ) -> Result<Vec<EmailRecord>, MailError> {
        let ids = self
            .client
            .list_message_ids(&credential.access_token, limit)
            .await?;

        let mut retained = Vec::new();
        for message_id in ids.iter().take(limit) {
            let email = self
                .client
                .get_message(&credential.access_token, message_id)
                .await?;

            if !is_study_related(&email.subject) {
                continue;
            }

            self.store.save_email(user_id, &email).await?;
            retained.push(email);
        }

        tracing::info!(
            user_id,
            scanned = ids.len().min(limit),
            retained = retained.len(),
            "Fetched study-related emails"
        );
        Ok(retained)
    }

    /// Look an email up in the store first; only go to Gmail on a miss.
    /// A record fetched on a miss is stored too, so both paths cache the same way.
    pub async fn get(
        &self,
        user_id: u64,
        credential: &Credential,
        message_id: &str,
    ) -> Result<EmailRecord, MailError> {
        if let Some(email) = self.store.get_email(user_id, message_id).await? {
            return Ok(email);
        }

        tracing::debug!(user_id, message_id, "Email cache miss, fetching from Gmail");
        let email = self
            .client
            .get_message(&credential.access_token, message_id)
            .await?;
        self.store.save_email(user_id, &email).await?;
        Ok(email)
    }
}

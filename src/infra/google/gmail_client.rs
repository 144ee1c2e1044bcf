use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use super::describe_api_error;
use crate::core::mail::{EmailRecord, MailError, MailboxClient};

const GMAIL_BASE_URL: &str = "https://gmail.googleapis.com/gmail/v1";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessageList {
    #[serde(default)]
    messages: Vec<MessageStub>,
}

#[derive(Debug, Deserialize)]
struct MessageStub {
    id: String,
}

#[derive(Debug, Deserialize)]
struct MessageDetail {
    id: String,
    #[serde(default)]
    snippet: String,
    #[serde(default)]
    payload: Option<MessagePayload>,
}

#[derive(Debug, Deserialize)]
struct MessagePayload {
    #[serde(default)]
    headers: Vec<Header>,
}

#[derive(Debug, Deserialize)]
struct Header {
    #[serde(default)]
    name: String,
    #[serde(default)]
    value: String,
}

impl MessageDetail {
    fn header(&self, name: &str) -> String {
        self.payload
            .as_ref()
            .and_then(|p| p.headers.iter().find(|h| h.name.eq_ignore_ascii_case(name)))
            .map(|h| h.value.clone())
            .unwrap_or_default()
    }

    fn into_record(self) -> EmailRecord {
        EmailRecord {
            subject: self.header("Subject"),
            sender: self.header("From"),
            id: self.id,
            snippet: self.snippet,
        }
    }
}

/// Gmail REST client. Only metadata is requested: subject, sender and the
/// snippet are all the bot shows.
pub struct GmailApiClient {
    client: Client,
    base_url: String,
}

impl GmailApiClient {
    pub fn new() -> Self {
        Self::with_base_url(GMAIL_BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        access_token: &str,
        path: &str,
        query: &[(&str, &str)],
        not_found_id: Option<&str>,
    ) -> Result<T, MailError> {
        let response = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .bearer_auth(access_token)
            .query(query)
            .send()
            .await
            .map_err(|e| MailError::Api(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(MailError::Unauthorized);
        }
        if status == StatusCode::NOT_FOUND {
            if let Some(id) = not_found_id {
                return Err(MailError::NotFound(id.to_string()));
            }
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MailError::Api(describe_api_error(status, &body)));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| MailError::Api(format!("unexpected Gmail response: {}", e)))
    }
}

#[async_trait]
impl MailboxClient for GmailApiClient {
    async fn list_message_ids(&self, access_token: &str, limit: usize) -> Result<Vec<String>, MailError> {
        let max_results = limit.to_string();
        let list: MessageList = self
            .get_json(
                access_token,
                "/users/me/messages",
                &[("maxResults", max_results.as_str())],
                None,
            )
            .await?;

        Ok(list.messages.into_iter().map(|m| m.id).collect())
    }

    async fn get_message(&self, access_token: &str, message_id: &str) -> Result<EmailRecord, MailError> {
        let path = format!("/users/me/messages/{}", message_id);
        let detail: MessageDetail = self
            .get_json(
                access_token,
                &path,
                &[
                    ("format", "metadata"),
                    ("metadataHeaders", "Subject"),
                    ("metadataHeaders", "From"),
                ],
                Some(message_id),
            )
            .await?;

        Ok(detail.into_record())
    }
}

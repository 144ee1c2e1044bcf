//! Google OAuth2 for a desktop ("installed") client.
//!
//! The consent flow binds a loopback listener on a random port, sends the
//! user to Google's consent screen, and waits for the single redirect that
//! carries the authorization code. The code is exchanged with PKCE (S256), so
//! a leaked code alone is useless.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use crate::core::credentials::{Credential, CredentialError, TokenRefresher, GOOGLE_SCOPES};

const DEFAULT_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

#[derive(Debug, Error)]
pub enum OAuthError {
    #[error("Could not read the Google client secret: {0}")]
    ClientSecrets(String),

    #[error("Could not start the local login listener: {0}")]
    Listener(String),

    #[error("Google sign-in was not completed: {0}")]
    Denied(String),

    #[error("The login response did not belong to this login attempt")]
    StateMismatch,

    #[error("Google did not return an authorization code")]
    MissingCode,

    #[error("Timed out waiting for Google sign-in")]
    TimedOut,

    #[error("Token exchange failed: {0}")]
    Exchange(String),
}

/// The OAuth client registration from `client_secret.json`.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientSecrets {
    pub client_id: String,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_auth_uri() -> String {
    DEFAULT_AUTH_URI.to_string()
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

/// Google wraps the registration in an `installed` or `web` object
/// depending on the client type.
#[derive(Deserialize)]
struct ClientSecretsFile {
    installed: Option<ClientSecrets>,
    web: Option<ClientSecrets>,
}

impl ClientSecrets {
    pub fn from_json(text: &str) -> Result<Self, OAuthError> {
        let file: ClientSecretsFile =
            serde_json::from_str(text).map_err(|e| OAuthError::ClientSecrets(e.to_string()))?;
        file.installed.or(file.web).ok_or_else(|| {
            OAuthError::ClientSecrets("expected an `installed` or `web` client".to_string())
        })
    }

    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, OAuthError> {
        let path = path.as_ref();
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| OAuthError::ClientSecrets(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&text)
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    scope: Option<String>,
}

#[derive(Deserialize)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// A consent flow that has been started but not yet completed.
pub struct PendingAuthorization {
    /// Where to send the user. Contains no secrets, but is single-use.
    pub url: String,
    listener: TcpListener,
    state: String,
    verifier: String,
    redirect_uri: String,
}

/// What the loopback listener pulled out of the browser redirect.
#[derive(Debug, Default, PartialEq)]
struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

#[derive(Clone)]
pub struct GoogleOAuthClient {
    http: reqwest::Client,
    secrets: Arc<ClientSecrets>,
    scopes: Vec<String>,
}

impl GoogleOAuthClient {
    pub fn new(secrets: ClientSecrets) -> Self {
        Self {
            http: reqwest::Client::new(),
            secrets: Arc::new(secrets),
            scopes: GOOGLE_SCOPES.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Bind the loopback listener and build the consent URL.
    pub async fn begin_authorization(&self) -> Result<PendingAuthorization, OAuthError> {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| OAuthError::Listener(e.to_string()))?;
        let port = listener
            .local_addr()
            .map_err(|e| OAuthError::Listener(e.to_string()))?
            .port();
        let redirect_uri = format!("http://127.0.0.1:{}/", port);

        let state = random_token(32);
        let verifier = random_token(64);
        let scope = self.scopes.join(" ");
        let challenge = pkce_challenge(&verifier);

        let url = url::Url::parse_with_params(
            &self.secrets.auth_uri,
            &[
                ("client_id", self.secrets.client_id.as_str()),
                ("redirect_uri", redirect_uri.as_str()),
                ("response_type", "code"),
                ("scope", scope.as_str()),
                ("state", state.as_str()),
                ("code_challenge", challenge.as_str()),
                ("code_challenge_method", "S256"),
                ("access_type", "offline"),
                ("prompt", "consent"),
            ],
        )
        .map_err(|e| OAuthError::ClientSecrets(format!("invalid auth_uri: {}", e)))?;

        Ok(PendingAuthorization {
            url: url.to_string(),
            listener,
            state,
            verifier,
            redirect_uri,
        })
    }

    /// Try to open the consent page on the machine running the bot. Only
    /// useful when the bot runs on the user's own desktop.
    pub fn open_in_browser(pending: &PendingAuthorization) {
        if let Err(e) = open::that(&pending.url) {
            tracing::debug!("Could not open a local browser for Google sign-in: {}", e);
        }
    }

    /// Wait for the redirect, check it, and exchange the code for tokens.
    pub async fn complete(
        &self,
        pending: PendingAuthorization,
        user_id: u64,
        timeout: Duration,
    ) -> Result<Credential, OAuthError> {
        let params = tokio::time::timeout(timeout, wait_for_callback(&pending.listener))
            .await
            .map_err(|_| OAuthError::TimedOut)??;

        if let Some(error) = params.error {
            return Err(OAuthError::Denied(error));
        }
        if params.state.as_deref() != Some(pending.state.as_str()) {
            return Err(OAuthError::StateMismatch);
        }
        let code = params.code.ok_or(OAuthError::MissingCode)?;

        let form = [
            ("code", code.as_str()),
            ("client_id", self.secrets.client_id.as_str()),
            ("client_secret", self.secrets.client_secret.as_deref().unwrap_or("")),
            ("redirect_uri", pending.redirect_uri.as_str()),
            ("grant_type", "authorization_code"),
            ("code_verifier", pending.verifier.as_str()),
        ];
        let tokens = self
            .post_token_form(&self.secrets.token_uri, &form)
            .await
            .map_err(OAuthError::Exchange)?;

        tracing::info!(user_id, "Google authorization completed");
        Ok(self.to_credential(user_id, tokens, None))
    }

    async fn post_token_form(&self, token_uri: &str, form: &[(&str, &str)]) -> Result<TokenResponse, String> {
        let response = self
            .http
            .post(token_uri)
            .form(form)
            .send()
            .await
            .map_err(|e| e.without_url().to_string())?;

        let status = response.status();
        let body = response.text().await.map_err(|e| e.to_string())?;
        if !status.is_success() {
            let reason = serde_json::from_str::<TokenErrorResponse>(&body)
                .map(|err| match err.error_description {
                    Some(description) => format!("{} ({})", err.error, description),
                    None => err.error,
                })
                .unwrap_or_else(|_| format!("HTTP {}", status.as_u16()));
            return Err(reason);
        }

        serde_json::from_str(&body).map_err(|e| format!("malformed token response: {}", e))
    }

    fn to_credential(&self, user_id: u64, tokens: TokenResponse, previous: Option<&Credential>) -> Credential {
        let scopes = match tokens.scope {
            Some(scope) => scope.split_whitespace().map(str::to_string).collect(),
            None => previous
                .map(|c| c.scopes.clone())
                .unwrap_or_else(|| self.scopes.clone()),
        };

        Credential {
            user_id,
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            scopes,
            expiry: tokens
                .expires_in
                .map(|secs| Utc::now() + chrono::Duration::seconds(secs)),
            token_uri: previous
                .map(|c| c.token_uri.clone())
                .unwrap_or_else(|| self.secrets.token_uri.clone()),
        }
    }
}

#[async_trait]
impl TokenRefresher for GoogleOAuthClient {
    async fn refresh(&self, credential: &Credential) -> Result<Credential, CredentialError> {
        let refresh_token = credential
            .refresh_token
            .as_deref()
            .ok_or(CredentialError::Expired)?;

        let form = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", self.secrets.client_id.as_str()),
            ("client_secret", self.secrets.client_secret.as_deref().unwrap_or("")),
        ];
        let tokens = self
            .post_token_form(&credential.token_uri, &form)
            .await
            .map_err(CredentialError::RefreshFailed)?;

        Ok(self.to_credential(credential.user_id, tokens, Some(credential)))
    }
}

/// Accept connections until one carries OAuth parameters. Browsers like to
/// ask for `/favicon.ico` too; those get a 404 and are otherwise ignored.
async fn wait_for_callback(listener: &TcpListener) -> Result<CallbackParams, OAuthError> {
    loop {
        let (mut stream, _) = listener
            .accept()
            .await
            .map_err(|e| OAuthError::Listener(e.to_string()))?;

        let Some(target) = read_request_target(&mut stream).await else {
            respond(&mut stream, "404 Not Found", "Not found.").await;
            continue;
        };

        let params = parse_callback(&target);
        if params == CallbackParams::default() {
            respond(&mut stream, "404 Not Found", "Not found.").await;
            continue;
        }

        let message = if params.code.is_some() {
            "Google account connected. You can close this tab and return to Discord."
        } else {
            "Sign-in was not completed. You can close this tab and run /login again."
        };
        respond(&mut stream, "200 OK", message).await;
        return Ok(params);
    }
}

/// The request target from `GET <target> HTTP/1.1`.
async fn read_request_target(stream: &mut TcpStream) -> Option<String> {
    let mut buffer = [0u8; 8192];
    let read = stream.read(&mut buffer).await.ok()?;
    let request = String::from_utf8_lossy(&buffer[..read]);
    let mut parts = request.lines().next()?.split_whitespace();
    match (parts.next(), parts.next()) {
        (Some("GET"), Some(target)) => Some(target.to_string()),
        _ => None,
    }
}

fn parse_callback(target: &str) -> CallbackParams {
    let Ok(url) = url::Url::parse(&format!("http://127.0.0.1{}", target)) else {
        return CallbackParams::default();
    };

    let mut params = CallbackParams::default();
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => params.code = Some(value.into_owned()),
            "state" => params.state = Some(value.into_owned()),
            "error" => params.error = Some(value.into_owned()),
            _ => {}
        }
    }
    params
}

async fn respond(stream: &mut TcpStream, status: &str, message: &str) {
    let body = format!(
        "<html><body style=\"font-family: system-ui; text-align: center; padding: 40px;\">\
         <h2>{}</h2></body></html>",
        message
    );
    let response = format!(
        "HTTP/1.1 {}\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        body.len(),
        body
    );
    let _ = stream.write_all(response.as_bytes()).await;
    let _ = stream.flush().await;
}

fn random_token(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// RFC 7636 S256 code challenge.
pub fn pkce_challenge(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn secrets(token_uri: &str) -> ClientSecrets {
        ClientSecrets {
            client_id: "client-123.apps.googleusercontent.com".to_string(),
            client_secret: Some("shh".to_string()),
            auth_uri: DEFAULT_AUTH_URI.to_string(),
            token_uri: token_uri.to_string(),
        }
    }

    fn stored(token_uri: &str) -> Credential {
        Credential {
            user_id: 5,
            access_token: "expired".to_string(),
            refresh_token: Some("1//refresh".to_string()),
            scopes: vec!["openid".to_string()],
            expiry: Some(Utc::now()),
            token_uri: token_uri.to_string(),
        }
    }

    #[test]
    fn test_pkce_challenge_matches_rfc_vector() {
        assert_eq!(
            pkce_challenge("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk"),
            "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"
        );
    }

    #[test]
    fn test_client_secrets_accepts_installed_and_web() {
        let installed = r#"{"installed": {"client_id": "a", "client_secret": "b",
            "auth_uri": "https://accounts.google.com/o/oauth2/auth",
            "token_uri": "https://oauth2.googleapis.com/token"}}"#;
        let web = r#"{"web": {"client_id": "c"}}"#;

        assert_eq!(ClientSecrets::from_json(installed).unwrap().client_id, "a");
        let parsed = ClientSecrets::from_json(web).unwrap();
        assert_eq!(parsed.client_id, "c");
        assert_eq!(parsed.token_uri, DEFAULT_TOKEN_URI);
        assert!(ClientSecrets::from_json(r#"{"other": {}}"#).is_err());
    }

    #[test]
    fn test_callback_parsing() {
        let params = parse_callback("/?state=abc&code=4%2F0Ad&scope=openid");
        assert_eq!(params.code.as_deref(), Some("4/0Ad"));
        assert_eq!(params.state.as_deref(), Some("abc"));

        let denied = parse_callback("/?error=access_denied&state=abc");
        assert_eq!(denied.error.as_deref(), Some("access_denied"));
        assert_eq!(parse_callback("/favicon.ico"), CallbackParams::default());
    }

    #[tokio::test]
    async fn test_consent_url_carries_pkce_and_scopes() {
        let client = GoogleOAuthClient::new(secrets(DEFAULT_TOKEN_URI));
        let pending = client.begin_authorization().await.unwrap();

        let url = url::Url::parse(&pending.url).unwrap();
        let query: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();
        assert_eq!(query["client_id"], "client-123.apps.googleusercontent.com");
        assert_eq!(query["code_challenge_method"], "S256");
        assert_eq!(query["code_challenge"], pkce_challenge(&pending.verifier));
        assert_eq!(query["state"], pending.state);
        assert_eq!(query["redirect_uri"], pending.redirect_uri);
        assert!(query["scope"].contains("https://www.googleapis.com/auth/gmail.readonly"));
        assert!(pending.redirect_uri.starts_with("http://127.0.0.1:"));
    }

    async fn browser_redirect(redirect_uri: &str, query: &str) -> String {
        let address = redirect_uri
            .trim_start_matches("http://")
            .trim_end_matches('/')
            .to_string();
        let mut stream = TcpStream::connect(address).await.unwrap();
        let request = format!("GET /?{} HTTP/1.1\r\nHost: 127.0.0.1\r\n\r\n", query);
        stream.write_all(request.as_bytes()).await.unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        response
    }

    #[tokio::test]
    async fn test_full_loopback_flow_exchanges_code() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=authorization_code"))
            .and(body_string_contains("code=the-code"))
            .and(body_string_contains("code_verifier="))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "ya29.new",
                "refresh_token": "1//new",
                "expires_in": 3599,
                "scope": "openid https://www.googleapis.com/auth/calendar",
                "token_type": "Bearer"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = GoogleOAuthClient::new(secrets(&format!("{}/token", server.uri())));
        let pending = client.begin_authorization().await.unwrap();
        let redirect_uri = pending.redirect_uri.clone();
        let query = format!("state={}&code=the-code", pending.state);

        let flow = tokio::spawn({
            let client = client.clone();
            async move { client.complete(pending, 5, Duration::from_secs(5)).await }
        });
        let page = browser_redirect(&redirect_uri, &query).await;
        let credential = flow.await.unwrap().unwrap();

        assert!(page.starts_with("HTTP/1.1 200 OK"));
        assert_eq!(credential.user_id, 5);
        assert_eq!(credential.access_token, "ya29.new");
        assert_eq!(credential.refresh_token.as_deref(), Some("1//new"));
        assert!(credential.has_scope("https://www.googleapis.com/auth/calendar"));
        assert!(credential.expiry.unwrap() > Utc::now());
    }

    #[tokio::test]
    async fn test_state_mismatch_is_rejected() {
        let client = GoogleOAuthClient::new(secrets(DEFAULT_TOKEN_URI));
        let pending = client.begin_authorization().await.unwrap();
        let redirect_uri = pending.redirect_uri.clone();

        let flow = tokio::spawn({
            let client = client.clone();
            async move { client.complete(pending, 5, Duration::from_secs(5)).await }
        });
        browser_redirect(&redirect_uri, "state=forged&code=abc").await;

        assert!(matches!(flow.await.unwrap(), Err(OAuthError::StateMismatch)));
    }

    #[tokio::test]
    async fn test_denied_consent_is_reported() {
        let client = GoogleOAuthClient::new(secrets(DEFAULT_TOKEN_URI));
        let pending = client.begin_authorization().await.unwrap();
        let redirect_uri = pending.redirect_uri.clone();
        let query = format!("state={}&error=access_denied", pending.state);

        let flow = tokio::spawn({
            let client = client.clone();
            async move { client.complete(pending, 5, Duration::from_secs(5)).await }
        });
        browser_redirect(&redirect_uri, &query).await;

        match flow.await.unwrap() {
            Err(OAuthError::Denied(reason)) => assert_eq!(reason, "access_denied"),
            other => panic!("expected denial, got {:?}", other.map(|c| c.user_id)),
        }
    }

    #[tokio::test]
    async fn test_flow_times_out() {
        let client = GoogleOAuthClient::new(secrets(DEFAULT_TOKEN_URI));
        let pending = client.begin_authorization().await.unwrap();
        let result = client.complete(pending, 5, Duration::from_millis(20)).await;
        assert!(matches!(result, Err(OAuthError::TimedOut)));
    }

    #[tokio::test]
    async fn test_refresh_keeps_scopes_and_token_uri() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .and(body_string_contains("refresh_token=1%2F%2Frefresh"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "ya29.refreshed",
                "expires_in": 3600
            })))
            .mount(&server)
            .await;

        let token_uri = format!("{}/token", server.uri());
        let client = GoogleOAuthClient::new(secrets(&token_uri));
        let refreshed = client.refresh(&stored(&token_uri)).await.unwrap();

        assert_eq!(refreshed.access_token, "ya29.refreshed");
        assert_eq!(refreshed.refresh_token, None);
        assert_eq!(refreshed.scopes, vec!["openid".to_string()]);
        assert_eq!(refreshed.token_uri, token_uri);
    }

    #[tokio::test]
    async fn test_revoked_refresh_token_fails() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": "invalid_grant",
                "error_description": "Token has been expired or revoked."
            })))
            .mount(&server)
            .await;

        let token_uri = format!("{}/token", server.uri());
        let client = GoogleOAuthClient::new(secrets(&token_uri));
        match client.refresh(&stored(&token_uri)).await {
            Err(CredentialError::RefreshFailed(reason)) => assert!(reason.starts_with("invalid_grant")),
            other => panic!("expected refresh failure, got {:?}", other),
        }
    }
}

pub mod credential_models;
pub mod credential_service;

pub use credential_models::{Credential, GOOGLE_SCOPES};
pub use credential_service::{CredentialError, CredentialService, CredentialStore, TokenRefresher};

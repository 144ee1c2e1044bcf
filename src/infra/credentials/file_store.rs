use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;

use crate::core::credentials::{Credential, CredentialError, CredentialStore};

/// One JSON file per user: `<dir>/<user_id>_token.json`.
pub struct FileCredentialStore {
    dir: PathBuf,
}

impl FileCredentialStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    fn path_for(&self, user_id: u64) -> PathBuf {
        self.dir.join(format!("{}_token.json", user_id))
    }
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    async fn save(&self, user_id: u64, credential: &Credential) -> Result<String, CredentialError> {
        fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| CredentialError::Storage(e.to_string()))?;

        let path = self.path_for(user_id);
        let text = serde_json::to_string_pretty(credential)
            .map_err(|e| CredentialError::Storage(e.to_string()))?;

        // Write next to the target and rename so a crash never leaves half a token file.
        let staging = path.with_extension("json.tmp");
        fs::write(&staging, text)
            .await
            .map_err(|e| CredentialError::Storage(e.to_string()))?;
        restrict_permissions(&staging).await?;
        fs::rename(&staging, &path)
            .await
            .map_err(|e| CredentialError::Storage(e.to_string()))?;

        Ok(path.display().to_string())
    }

    async fn load(&self, user_id: u64) -> Result<Option<Credential>, CredentialError> {
        let path = self.path_for(user_id);
        let text = match fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(CredentialError::Storage(e.to_string())),
        };

        let mut credential: Credential =
            serde_json::from_str(&text).map_err(|e| CredentialError::Storage(e.to_string()))?;
        // The file name is authoritative.
        credential.user_id = user_id;
        Ok(Some(credential))
    }
}

#[cfg(unix)]
async fn restrict_permissions(path: &Path) -> Result<(), CredentialError> {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .await
        .map_err(|e| CredentialError::Storage(e.to_string()))
}

#[cfg(not(unix))]
async fn restrict_permissions(_path: &Path) -> Result<(), CredentialError> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn credential(token: &str) -> Credential {
        Credential {
            user_id: 77,
            access_token: token.to_string(),
            refresh_token: Some("1//refresh".to_string()),
            scopes: vec!["openid".to_string()],
            expiry: Some(Utc.with_ymd_and_hms(2025, 7, 21, 12, 0, 0).unwrap()),
            token_uri: "https://oauth2.googleapis.com/token".to_string(),
        }
    }

    #[tokio::test]
    async fn test_missing_user_loads_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::new(dir.path());
        assert!(store.load(77).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_then_load_and_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::new(dir.path().join("user_tokens"));

        let location = store.save(77, &credential("first")).await.unwrap();
        assert!(location.ends_with("77_token.json"));

        store.save(77, &credential("second")).await.unwrap();
        let loaded = store.load(77).await.unwrap().unwrap();
        assert_eq!(loaded.access_token, "second");
        assert_eq!(loaded.refresh_token.as_deref(), Some("1//refresh"));
        assert_eq!(loaded.expiry, credential("x").expiry);
        assert!(store.load(78).await.unwrap().is_none());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_token_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::new(dir.path());
        let location = store.save(77, &credential("tok")).await.unwrap();

        let mode = std::fs::metadata(location).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[tokio::test]
    async fn test_corrupt_file_is_a_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("77_token.json"), "{not json").unwrap();
        let store = FileCredentialStore::new(dir.path());

        assert!(matches!(
            store.load(77).await,
            Err(CredentialError::Storage(_))
        ));
    }
}

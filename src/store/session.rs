use crate::core::auth::{AuthSession, SessionStore};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::fs;
use std::path::PathBuf;
use tracing::debug;

/// Keeps the signed-in session as a JSON file so later runs stay signed in.
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn load(&self) -> Result<Option<AuthSession>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read session file: {}", self.path.display()))?;
        let session = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse session file: {}", self.path.display()))?;
        Ok(Some(session))
    }

    async fn save(&self, session: &AuthSession) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create session directory: {}", parent.display())
            })?;
        }
        let raw = serde_json::to_string_pretty(session)?;
        fs::write(&self.path, raw)
            .with_context(|| format!("Failed to write session file: {}", self.path.display()))?;
        debug!(path = %self.path.display(), "Session saved");
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path).with_context(|| {
                format!("Failed to remove session file: {}", self.path.display())
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_save_load_clear() {
        let dir = tempdir().unwrap();
        let store = FileSessionStore::new(dir.path().join("nested").join("session.json"));
        assert!(store.load().await.unwrap().is_none());

        let session = AuthSession {
            uid: "uid-1".to_string(),
            email: Some("ann@example.com".to_string()),
            display_name: Some("Ann".to_string()),
            id_token: "id".to_string(),
            refresh_token: "refresh".to_string(),
        };
        store.save(&session).await.unwrap();
        assert_eq!(store.load().await.unwrap(), Some(session));

        store.clear().await.unwrap();
        assert!(store.load().await.unwrap().is_none());
        store.clear().await.unwrap();
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("session.json");
        fs::write(&path, "not json").unwrap();
        let err = FileSessionStore::new(path).load().await.unwrap_err();
        assert!(err.to_string().contains("Failed to parse session file"));
    }
}

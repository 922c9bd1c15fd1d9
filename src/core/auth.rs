//! Authentication abstractions.

use crate::core::error::AuthError;
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;

/// A signed-in identity together with the tokens the backend issued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSession {
    pub uid: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub id_token: String,
    pub refresh_token: String,
}

#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, AuthError>;

    async fn sign_up(&self, email: &str, password: &str) -> Result<AuthSession, AuthError>;

    /// Sets the display name and returns the session with the new name.
    async fn update_profile(
        &self,
        session: &AuthSession,
        display_name: &str,
    ) -> Result<AuthSession, AuthError>;

    /// Exchanges the refresh token for a fresh id token.
    async fn refresh(&self, session: &AuthSession) -> Result<AuthSession, AuthError>;
}

/// Where the current session survives between runs.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self) -> Result<Option<AuthSession>>;
    async fn save(&self, session: &AuthSession) -> Result<()>;
    async fn clear(&self) -> Result<()>;
}

/// Bearer token shared between the account service, which obtains it, and
/// the remote document store, which sends it.
#[derive(Debug, Clone, Default)]
pub struct SharedToken(Arc<RwLock<Option<String>>>);

impl SharedToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self) -> Option<String> {
        self.0.read().await.clone()
    }

    pub async fn set(&self, token: impl Into<String>) {
        *self.0.write().await = Some(token.into());
    }

    pub async fn clear(&self) {
        *self.0.write().await = None;
    }
}

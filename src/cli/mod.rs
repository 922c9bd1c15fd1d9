//! Command implementations and the wiring they share.

pub mod account;
pub mod analytics;
pub mod setup;
pub mod summary;
pub mod transactions;
pub mod ui;

use crate::core::account::{self as accounts, AccountService, User};
use crate::core::audit::DocumentAuditSink;
use crate::core::auth::SharedToken;
use crate::core::config::{AppConfig, BackendConfig};
use crate::core::document::DocumentStore;
use crate::core::error::AuthAction;
use crate::core::ledger::{Ledger, Snapshot};
use crate::core::notify::NotificationSink;
use crate::providers::{FirebaseAuthProvider, FirestoreDocumentStore};
use crate::store::{DiskDocumentStore, FileSessionStore, MemoryDocumentStore};
use anyhow::{Result, anyhow, bail};
use std::sync::Arc;
use tracing::debug;

/// Everything a command needs, built from the configured backend.
pub struct App {
    pub config: AppConfig,
    pub documents: Arc<dyn DocumentStore>,
    pub ledger: Ledger,
    /// Present only on backends with real accounts.
    pub accounts: Option<AccountService>,
}

impl App {
    pub fn new(config: AppConfig, notifier: Arc<dyn NotificationSink>) -> Result<Self> {
        let token = SharedToken::new();
        let documents: Arc<dyn DocumentStore> = match &config.backend {
            BackendConfig::Memory => Arc::new(MemoryDocumentStore::new()),
            BackendConfig::Local => {
                Arc::new(DiskDocumentStore::open(&config.default_data_path()?.join("db"))?)
            }
            BackendConfig::Firebase(firebase) => Arc::new(FirestoreDocumentStore::new(
                &firebase.firestore_url,
                &firebase.project_id,
                token.clone(),
            )?),
        };
        let audit = Arc::new(DocumentAuditSink::new(documents.clone()));

        let accounts = match &config.backend {
            BackendConfig::Firebase(firebase) => {
                let provider = FirebaseAuthProvider::new(
                    &firebase.api_key,
                    &firebase.auth_url,
                    &firebase.token_url,
                )?;
                let sessions =
                    FileSessionStore::new(config.default_data_path()?.join("session.json"));
                Some(AccountService::new(
                    Arc::new(provider),
                    documents.clone(),
                    Arc::new(sessions),
                    token,
                    notifier.clone(),
                    audit.clone(),
                ))
            }
            _ => None,
        };

        debug!(backend = ?config.backend, "Application wired");
        Ok(Self {
            ledger: Ledger::new(documents.clone(), notifier, audit),
            config,
            documents,
            accounts,
        })
    }

    /// The account service, or an error explaining that the backend has none.
    pub fn account_service(&self) -> Result<&AccountService> {
        self.accounts.as_ref().ok_or_else(|| {
            anyhow!("Accounts are only available with the firebase backend; the configured backend uses the fixed user from the config file")
        })
    }

    /// The user whose transactions commands operate on.
    pub async fn current_user(&self) -> Result<User> {
        match &self.accounts {
            Some(service) => match service.restore().await {
                Ok(Some(user)) => Ok(user),
                Ok(None) => bail!("You are not signed in. Run `fintrack login` first"),
                Err(e) => Err(anyhow!(e.user_message(AuthAction::Restore))),
            },
            None => accounts::load_user(self.documents.as_ref(), &self.config.user, None, None)
                .await
                .map_err(|e| anyhow!("Failed to load user data: {e}")),
        }
    }

    /// Signs in and fetches the user's transactions.
    pub async fn load(&self) -> Result<(User, Snapshot)> {
        let user = self.current_user().await?;
        let snapshot = self.ledger.fetch_all(&user.uid).await?;
        Ok((user, snapshot))
    }
}

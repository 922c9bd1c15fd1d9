//! Users, their stored profile and the sign-in lifecycle.

use crate::core::audit::{AuditRecord, AuditSink, record_best_effort};
use crate::core::auth::{AuthProvider, AuthSession, SessionStore, SharedToken};
use crate::core::currency::{self, Currency, DEFAULT_CURRENCY};
use crate::core::document::{DocumentError, DocumentStore, Fields, USERS};
use crate::core::error::{AuthAction, AuthError};
use crate::core::notify::{NotificationKind, NotificationSink};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub uid: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub currency: String,
    pub currency_symbol: String,
}

impl User {
    fn with_currency(
        uid: &str,
        email: Option<String>,
        display_name: Option<String>,
        code: &str,
    ) -> Self {
        Self {
            uid: uid.to_string(),
            email,
            display_name,
            currency: code.to_string(),
            currency_symbol: currency::symbol_for(code).to_string(),
        }
    }
}

/// Builds the user for `uid` from its profile document in `users`.
///
/// A missing document or a missing `currency` field yields the default
/// currency. A `displayName` stored in the profile is used when the caller
/// has none.
pub async fn load_user(
    documents: &dyn DocumentStore,
    uid: &str,
    email: Option<String>,
    display_name: Option<String>,
) -> Result<User, DocumentError> {
    let profile = documents.get(USERS, uid).await?;
    let Some(profile) = profile else {
        debug!(uid, "No stored profile");
        return Ok(User::with_currency(
            uid,
            email,
            display_name,
            DEFAULT_CURRENCY.code,
        ));
    };

    let code = profile
        .fields
        .get("currency")
        .and_then(Value::as_str)
        .filter(|c| !c.is_empty())
        .unwrap_or(DEFAULT_CURRENCY.code);
    let display_name = display_name.or_else(|| {
        profile
            .fields
            .get("displayName")
            .and_then(Value::as_str)
            .map(str::to_string)
    });
    Ok(User::with_currency(uid, email, display_name, code))
}

/// Writes the display name and currency into the profile, creating the
/// profile document when it does not exist yet.
pub async fn save_profile(
    documents: &dyn DocumentStore,
    uid: &str,
    display_name: &str,
    currency: Currency,
) -> Result<(), DocumentError> {
    let mut fields = Fields::new();
    fields.insert("displayName".to_string(), Value::from(display_name));
    fields.insert("currency".to_string(), Value::from(currency.code));

    match documents.update(USERS, uid, fields.clone()).await {
        Err(DocumentError::NotFound { .. }) => documents.set(USERS, uid, fields).await,
        other => other,
    }
}

pub struct AccountService {
    provider: Arc<dyn AuthProvider>,
    documents: Arc<dyn DocumentStore>,
    sessions: Arc<dyn SessionStore>,
    token: SharedToken,
    notifier: Arc<dyn NotificationSink>,
    audit: Arc<dyn AuditSink>,
    session: RwLock<Option<AuthSession>>,
}

impl AccountService {
    pub fn new(
        provider: Arc<dyn AuthProvider>,
        documents: Arc<dyn DocumentStore>,
        sessions: Arc<dyn SessionStore>,
        token: SharedToken,
        notifier: Arc<dyn NotificationSink>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            provider,
            documents,
            sessions,
            token,
            notifier,
            audit,
            session: RwLock::new(None),
        }
    }

    pub async fn session(&self) -> Option<AuthSession> {
        self.session.read().await.clone()
    }

    /// Picks up the session persisted by an earlier run, refreshes its token
    /// and loads the user's profile. `Ok(None)` means nobody is signed in.
    pub async fn restore(&self) -> Result<Option<User>, AuthError> {
        let stored = match self.sessions.load().await {
            Ok(stored) => stored,
            Err(e) => {
                warn!(error = %e, "Could not read the stored session");
                None
            }
        };
        let Some(stored) = stored else {
            debug!("No stored session");
            return Ok(None);
        };

        let session = match self.provider.refresh(&stored).await {
            Ok(session) => session,
            Err(e) => {
                let context = action_context(AuthAction::Restore, None);
                return Err(self.fail(AuthAction::Restore, e, Some(stored.uid.as_str()), context).await);
            }
        };
        self.activate(&session).await;

        match self.user_for(&session).await {
            Ok(user) => Ok(Some(user)),
            Err(e) => {
                let context = action_context(AuthAction::Restore, None);
                Err(self.fail(AuthAction::Restore, e, Some(session.uid.as_str()), context).await)
            }
        }
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<User, AuthError> {
        self.notifier.notify(NotificationKind::Info, "Signing in...");
        let context = action_context(AuthAction::Login, Some(email));

        let session = match self.provider.sign_in(email, password).await {
            Ok(session) => session,
            Err(e) => return Err(self.fail(AuthAction::Login, e, None, context).await),
        };
        self.activate(&session).await;
        let user = self.user_or_default(&session).await;

        self.succeed("User logged in", "Login successful", &user.uid, context)
            .await;
        Ok(user)
    }

    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<User, AuthError> {
        self.notifier.notify(NotificationKind::Info, "Registering...");
        let context = action_context(AuthAction::Register, Some(email));

        let created = match self.provider.sign_up(email, password).await {
            Ok(session) => session,
            Err(e) => return Err(self.fail(AuthAction::Register, e, None, context).await),
        };
        let session = match self.provider.update_profile(&created, name).await {
            Ok(session) => session,
            Err(e) => return Err(self.fail(AuthAction::Register, e, None, context).await),
        };
        self.activate(&session).await;
        let user = User::with_currency(
            &session.uid,
            session.email.clone(),
            session.display_name.clone(),
            DEFAULT_CURRENCY.code,
        );

        self.succeed(
            "User registered",
            "Registration successful",
            &user.uid,
            context,
        )
        .await;
        Ok(user)
    }

    pub async fn logout(&self) -> Result<(), AuthError> {
        self.notifier.notify(NotificationKind::Info, "Signing out...");
        let context = action_context(AuthAction::Logout, None);
        let uid = match self.session().await {
            Some(session) => Some(session.uid),
            None => self.sessions.load().await.ok().flatten().map(|s| s.uid),
        };

        if let Err(e) = self.sessions.clear().await {
            let error = AuthError::Transport(format!("{e:#}"));
            return Err(self.fail(AuthAction::Logout, error, uid.as_deref(), context).await);
        }
        self.token.clear().await;
        *self.session.write().await = None;

        let mut record = AuditRecord::info("User logged out");
        if let Some(uid) = &uid {
            record = record.user(uid);
        }
        record.context = context;
        record_best_effort(self.audit.as_ref(), record).await;
        self.notifier
            .notify(NotificationKind::Success, "Logout successful");
        info!("User logged out");
        Ok(())
    }

    /// Changes the display name and currency of the signed-in user.
    pub async fn update_profile(&self, name: &str, currency: Currency) -> Result<User, AuthError> {
        let context = action_context(AuthAction::UpdateProfile, None);
        let Some(session) = self.session().await else {
            return Err(self
                .fail(AuthAction::UpdateProfile, AuthError::NotSignedIn, None, context)
                .await);
        };

        if let Err(e) = save_profile(self.documents.as_ref(), &session.uid, name, currency).await {
            let error = AuthError::Profile(e.to_string());
            return Err(self
                .fail(AuthAction::UpdateProfile, error, Some(session.uid.as_str()), context)
                .await);
        }
        let session = match self.provider.update_profile(&session, name).await {
            Ok(session) => session,
            Err(e) => {
                return Err(self
                    .fail(AuthAction::UpdateProfile, e, Some(session.uid.as_str()), context)
                    .await);
            }
        };
        self.activate(&session).await;

        let user = User::with_currency(
            &session.uid,
            session.email.clone(),
            session.display_name.clone(),
            currency.code,
        );
        self.succeed("Profile updated", "Profile updated", &user.uid, context)
            .await;
        Ok(user)
    }

    async fn activate(&self, session: &AuthSession) {
        self.token.set(session.id_token.clone()).await;
        if let Err(e) = self.sessions.save(session).await {
            warn!(error = %e, "Could not persist the session");
        }
        *self.session.write().await = Some(session.clone());
    }

    async fn user_for(&self, session: &AuthSession) -> Result<User, AuthError> {
        load_user(
            self.documents.as_ref(),
            &session.uid,
            session.email.clone(),
            session.display_name.clone(),
        )
        .await
        .map_err(|e| AuthError::Profile(e.to_string()))
    }

    async fn user_or_default(&self, session: &AuthSession) -> User {
        match self.user_for(session).await {
            Ok(user) => user,
            Err(e) => {
                warn!(error = %e, uid = %session.uid, "Using the default currency");
                User::with_currency(
                    &session.uid,
                    session.email.clone(),
                    session.display_name.clone(),
                    DEFAULT_CURRENCY.code,
                )
            }
        }
    }

    async fn succeed(&self, audit_message: &str, notice: &str, uid: &str, context: Fields) {
        let mut record = AuditRecord::info(audit_message).user(uid);
        record.context = context;
        record_best_effort(self.audit.as_ref(), record).await;
        self.notifier.notify(NotificationKind::Success, notice);
        info!(uid, "{}", audit_message);
    }

    async fn fail(
        &self,
        action: AuthAction,
        error: AuthError,
        uid: Option<&str>,
        context: Fields,
    ) -> AuthError {
        let message = error.user_message(action);
        warn!(%action, error = %error, "{}", message);

        let mut record = AuditRecord::error(message.clone())
            .detail("error", error.to_string())
            .detail("code", error.code());
        if let Some(uid) = uid {
            record = record.user(uid);
        }
        record.context = context;
        record_best_effort(self.audit.as_ref(), record).await;

        self.notifier.notify(NotificationKind::Error, &message);
        error
    }
}

fn action_context(action: AuthAction, email: Option<&str>) -> Fields {
    let mut context = Fields::new();
    context.insert("action".to_string(), Value::from(action.to_string()));
    if let Some(email) = email {
        context.insert("email".to_string(), Value::from(email));
    }
    context
}

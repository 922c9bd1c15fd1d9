//! Errors surfaced by the ledger and the account service.
//!
//! Messages are the generic, user-facing strings. The underlying backend
//! detail goes to the audit log only.

use std::fmt::Display;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteAction {
    Create,
    Update,
    Delete,
}

impl Display for WriteAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                WriteAction::Create => "add",
                WriteAction::Update => "update",
                WriteAction::Delete => "delete",
            }
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FinanceError {
    #[error("Failed to load transactions")]
    Fetch,
    #[error("Failed to {0} transaction")]
    Write(WriteAction),
}

impl FinanceError {
    /// Message written to the audit log alongside the backend detail.
    pub fn audit_message(&self) -> String {
        match self {
            FinanceError::Fetch => "Error while loading transactions".to_string(),
            FinanceError::Write(WriteAction::Create) => "Error while adding transaction".to_string(),
            FinanceError::Write(WriteAction::Update) => {
                "Error while updating transaction".to_string()
            }
            FinanceError::Write(WriteAction::Delete) => {
                "Error while deleting transaction".to_string()
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthAction {
    Restore,
    Login,
    Register,
    Logout,
    UpdateProfile,
}

impl Display for AuthAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                AuthAction::Restore => "restore",
                AuthAction::Login => "login",
                AuthAction::Register => "register",
                AuthAction::Logout => "logout",
                AuthAction::UpdateProfile => "update_profile",
            }
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("wrong password")]
    WrongPassword,
    #[error("user not found")]
    UserNotFound,
    #[error("email already registered")]
    EmailAlreadyInUse,
    #[error("not signed in")]
    NotSignedIn,
    #[error("authentication backend error: {code}")]
    Backend { code: String },
    #[error("authentication request failed: {0}")]
    Transport(String),
    #[error("profile unavailable: {0}")]
    Profile(String),
}

impl AuthError {
    /// Translates a backend error code such as `EMAIL_NOT_FOUND` or
    /// `WEAK_PASSWORD : Password should be at least 6 characters`.
    pub fn from_code(raw: &str) -> Self {
        let code = raw.split(" : ").next().unwrap_or(raw).trim();
        match code {
            "INVALID_PASSWORD" => AuthError::WrongPassword,
            "EMAIL_NOT_FOUND" => AuthError::UserNotFound,
            "EMAIL_EXISTS" => AuthError::EmailAlreadyInUse,
            _ => AuthError::Backend {
                code: code.to_string(),
            },
        }
    }

    /// Stable code recorded in the audit log.
    pub fn code(&self) -> &str {
        match self {
            AuthError::WrongPassword => "INVALID_PASSWORD",
            AuthError::UserNotFound => "EMAIL_NOT_FOUND",
            AuthError::EmailAlreadyInUse => "EMAIL_EXISTS",
            AuthError::NotSignedIn => "NOT_SIGNED_IN",
            AuthError::Backend { code } => code,
            AuthError::Transport(_) | AuthError::Profile(_) => "unknown",
        }
    }

    /// The string shown to the user for a failed `action`. Codes without a
    /// dedicated message fall back to the action's generic failure.
    pub fn user_message(&self, action: AuthAction) -> String {
        match (action, self) {
            (AuthAction::Login, AuthError::WrongPassword) => "Wrong password".to_string(),
            (AuthAction::Login, AuthError::UserNotFound) => "User not found".to_string(),
            (AuthAction::Register, AuthError::EmailAlreadyInUse) => {
                "This email is already registered".to_string()
            }
            (_, AuthError::NotSignedIn) => "You are not signed in".to_string(),
            (AuthAction::Restore, _) => "Failed to load user data".to_string(),
            (AuthAction::Login, _) => "Login failed".to_string(),
            (AuthAction::Register, _) => "Registration failed".to_string(),
            (AuthAction::Logout, _) => "Logout failed".to_string(),
            (AuthAction::UpdateProfile, _) => "Failed to update profile".to_string(),
        }
    }
}

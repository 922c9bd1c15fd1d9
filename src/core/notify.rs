//! User-facing status messages.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

/// How long a notification stays on screen. Expiry is driven by the
/// consumer through [`NotificationCenter::prune_expired`].
pub const DISPLAY_WINDOW: TimeDelta = TimeDelta::seconds(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Info,
    Success,
    Error,
}

/// Fire-and-forget channel for status messages.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, kind: NotificationKind, message: &str);
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub id: u64,
    pub message: String,
    pub kind: NotificationKind,
    pub created_at: DateTime<Utc>,
}

/// In-memory list of live notifications.
#[derive(Debug, Default)]
pub struct NotificationCenter {
    next_id: AtomicU64,
    list: Mutex<Vec<Notification>>,
}

impl NotificationCenter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, kind: NotificationKind, message: &str) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let mut list = self.list.lock().unwrap_or_else(PoisonError::into_inner);
        list.push(Notification {
            id,
            message: message.to_string(),
            kind,
            created_at: Utc::now(),
        });
        id
    }

    pub fn remove(&self, id: u64) {
        let mut list = self.list.lock().unwrap_or_else(PoisonError::into_inner);
        list.retain(|n| n.id != id);
    }

    pub fn list(&self) -> Vec<Notification> {
        self.list
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Drops every notification older than [`DISPLAY_WINDOW`] at `now` and
    /// returns how many were removed.
    pub fn prune_expired(&self, now: DateTime<Utc>) -> usize {
        let mut list = self.list.lock().unwrap_or_else(PoisonError::into_inner);
        let before = list.len();
        list.retain(|n| now - n.created_at < DISPLAY_WINDOW);
        before - list.len()
    }
}

impl NotificationSink for NotificationCenter {
    fn notify(&self, kind: NotificationKind, message: &str) {
        self.push(kind, message);
    }
}

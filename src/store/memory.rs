use crate::core::auth::{AuthSession, SessionStore};
use crate::core::document::{Document, DocumentError, DocumentStore, Fields};
use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;
use tracing::debug;

/// Document store held entirely in memory. Collections keep insertion order.
#[derive(Default)]
pub struct MemoryDocumentStore {
    next_id: AtomicU64,
    inner: Arc<Mutex<HashMap<String, Vec<Document>>>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn generate_id(&self) -> String {
        format!("mem-{:08}", self.next_id.fetch_add(1, Ordering::Relaxed) + 1)
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, DocumentError> {
        let collections = self.inner.lock().await;
        Ok(collections
            .get(collection)
            .and_then(|docs| docs.iter().find(|d| d.id == id))
            .cloned())
    }

    async fn query_eq(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> Result<Vec<Document>, DocumentError> {
        let collections = self.inner.lock().await;
        let matches: Vec<Document> = collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .filter(|d| d.fields.get(field) == Some(value))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        debug!(collection, field, count = matches.len(), "Memory query");
        Ok(matches)
    }

    async fn add(&self, collection: &str, fields: Fields) -> Result<String, DocumentError> {
        let id = self.generate_id();
        let mut collections = self.inner.lock().await;
        collections
            .entry(collection.to_string())
            .or_default()
            .push(Document {
                id: id.clone(),
                fields,
            });
        debug!(collection, %id, "Memory ADD");
        Ok(id)
    }

    async fn set(&self, collection: &str, id: &str, fields: Fields) -> Result<(), DocumentError> {
        let mut collections = self.inner.lock().await;
        let docs = collections.entry(collection.to_string()).or_default();
        match docs.iter_mut().find(|d| d.id == id) {
            Some(existing) => existing.fields = fields,
            None => docs.push(Document {
                id: id.to_string(),
                fields,
            }),
        }
        Ok(())
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        fields: Fields,
    ) -> Result<(), DocumentError> {
        let mut collections = self.inner.lock().await;
        let existing = collections
            .get_mut(collection)
            .and_then(|docs| docs.iter_mut().find(|d| d.id == id))
            .ok_or_else(|| DocumentError::not_found(collection, id))?;
        existing.fields.extend(fields);
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), DocumentError> {
        let mut collections = self.inner.lock().await;
        let docs = collections
            .get_mut(collection)
            .ok_or_else(|| DocumentError::not_found(collection, id))?;
        let before = docs.len();
        docs.retain(|d| d.id != id);
        if docs.len() == before {
            return Err(DocumentError::not_found(collection, id));
        }
        Ok(())
    }
}

/// Keeps the signed-in session for the lifetime of the process only.
#[derive(Default)]
pub struct MemorySessionStore {
    session: Mutex<Option<AuthSession>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self) -> Result<Option<AuthSession>> {
        Ok(self.session.lock().await.clone())
    }

    async fn save(&self, session: &AuthSession) -> Result<()> {
        *self.session.lock().await = Some(session.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        *self.session.lock().await = None;
        Ok(())
    }
}

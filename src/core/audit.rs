//! Best-effort audit trail of account and ledger activity.

use crate::core::document::{DocumentStore, Fields, LOGS};
use crate::core::transaction::now_timestamp;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditKind {
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(rename = "type")]
    pub kind: AuditKind,
    pub message: String,
    #[serde(skip_serializing_if = "Fields::is_empty")]
    pub details: Fields,
    #[serde(skip_serializing_if = "Fields::is_empty")]
    pub context: Fields,
    pub timestamp: String,
}

impl AuditRecord {
    pub fn new(kind: AuditKind, message: impl Into<String>) -> Self {
        Self {
            user_id: None,
            kind,
            message: message.into(),
            details: Fields::new(),
            context: Fields::new(),
            timestamp: now_timestamp(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(AuditKind::Info, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(AuditKind::Error, message)
    }

    pub fn user(mut self, user_id: &str) -> Self {
        self.user_id = Some(user_id.to_string());
        self
    }

    pub fn detail(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.details.insert(key.to_string(), value.into());
        self
    }

    pub fn context(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.context.insert(key.to_string(), value.into());
        self
    }
}

#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, record: &AuditRecord) -> Result<()>;
}

/// Appends audit records to the `logs` collection of a document store.
pub struct DocumentAuditSink {
    documents: Arc<dyn DocumentStore>,
}

impl DocumentAuditSink {
    pub fn new(documents: Arc<dyn DocumentStore>) -> Self {
        Self { documents }
    }
}

#[async_trait]
impl AuditSink for DocumentAuditSink {
    async fn record(&self, record: &AuditRecord) -> Result<()> {
        let fields = match serde_json::to_value(record).context("Failed to encode audit record")? {
            Value::Object(fields) => fields,
            _ => anyhow::bail!("Audit record did not encode to an object"),
        };
        self.documents
            .add(LOGS, fields)
            .await
            .context("Failed to write audit record")?;
        Ok(())
    }
}

/// Writes `record`, logging and discarding any failure.
pub async fn record_best_effort(sink: &dyn AuditSink, record: AuditRecord) {
    debug!(message = %record.message, kind = ?record.kind, "Audit");
    if let Err(e) = sink.record(&record).await {
        warn!(error = %e, message = %record.message, "Failed to write audit record");
    }
}

//! Document store abstraction shared by the local and remote backends.

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

pub const TRANSACTIONS: &str = "transactions";
pub const USERS: &str = "users";
pub const LOGS: &str = "logs";

/// The untyped field map of a stored document.
pub type Fields = Map<String, Value>;

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub fields: Fields,
}

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("document {collection}/{id} not found")]
    NotFound { collection: String, id: String },
    #[error("malformed document {id}: {reason}")]
    Malformed { id: String, reason: String },
    #[error("document store request failed: {0:#}")]
    Backend(anyhow::Error),
}

impl DocumentError {
    pub fn not_found(collection: &str, id: &str) -> Self {
        DocumentError::NotFound {
            collection: collection.to_string(),
            id: id.to_string(),
        }
    }
}

impl From<anyhow::Error> for DocumentError {
    fn from(err: anyhow::Error) -> Self {
        DocumentError::Backend(err)
    }
}

/// Collections of JSON-object documents addressed by id.
///
/// `update` and `delete` fail with [`DocumentError::NotFound`] when the
/// document does not exist; `set` creates or replaces.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, DocumentError>;

    /// All documents of `collection` whose `field` equals `value`.
    async fn query_eq(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> Result<Vec<Document>, DocumentError>;

    /// Stores a new document and returns the id the store assigned to it.
    async fn add(&self, collection: &str, fields: Fields) -> Result<String, DocumentError>;

    async fn set(&self, collection: &str, id: &str, fields: Fields) -> Result<(), DocumentError>;

    /// Merges `fields` into an existing document.
    async fn update(&self, collection: &str, id: &str, fields: Fields) -> Result<(), DocumentError>;

    async fn delete(&self, collection: &str, id: &str) -> Result<(), DocumentError>;
}

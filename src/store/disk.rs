use crate::core::document::{Document, DocumentError, DocumentStore, Fields};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use fjall::{Keyspace, PartitionCreateOptions, PartitionHandle, PersistMode};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{PoisonError, RwLock};
use tokio::sync::Mutex;
use tracing::debug;

/// Document store on an embedded fjall keyspace: one partition per
/// collection, one JSON-encoded field map per key.
///
/// Generated ids are hex timestamps, so a partition iterates in insertion
/// order.
pub struct DiskDocumentStore {
    keyspace: Keyspace,
    partitions: RwLock<HashMap<String, PartitionHandle>>,
    counter: AtomicU32,
    writes: Mutex<()>,
}

impl DiskDocumentStore {
    pub fn open(path: &Path) -> Result<Self> {
        std::fs::create_dir_all(path)
            .with_context(|| format!("Failed to create data directory: {}", path.display()))?;
        let keyspace = fjall::Config::new(path)
            .open()
            .with_context(|| format!("Failed to open database at {}", path.display()))?;
        debug!(path = %path.display(), "Opened local document store");

        Ok(Self {
            keyspace,
            partitions: RwLock::new(HashMap::new()),
            counter: AtomicU32::new(0),
            writes: Mutex::new(()),
        })
    }

    fn partition(&self, collection: &str) -> Result<PartitionHandle> {
        if let Some(partition) = self
            .partitions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(collection)
        {
            return Ok(partition.clone());
        }

        let partition = self
            .keyspace
            .open_partition(collection, PartitionCreateOptions::default())
            .with_context(|| format!("Failed to open collection '{collection}'"))?;
        self.partitions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(collection.to_string(), partition.clone());
        Ok(partition)
    }

    fn generate_id(&self) -> String {
        let micros = Utc::now().timestamp_micros();
        let counter = self.counter.fetch_add(1, Ordering::Relaxed);
        format!("{micros:016x}{counter:08x}")
    }

    fn read(&self, partition: &PartitionHandle, id: &str) -> Result<Option<Fields>, DocumentError> {
        let Some(bytes) = partition.get(id).context("Failed to read document")? else {
            return Ok(None);
        };
        decode(id, &bytes).map(Some)
    }

    fn write(&self, partition: &PartitionHandle, id: &str, fields: &Fields) -> Result<()> {
        let bytes = serde_json::to_vec(fields).context("Failed to encode document")?;
        partition
            .insert(id, bytes)
            .context("Failed to write document")?;
        self.keyspace
            .persist(PersistMode::SyncAll)
            .context("Failed to persist document")?;
        Ok(())
    }
}

fn decode(id: &str, bytes: &[u8]) -> Result<Fields, DocumentError> {
    serde_json::from_slice(bytes).map_err(|e| DocumentError::Malformed {
        id: id.to_string(),
        reason: e.to_string(),
    })
}

#[async_trait]
impl DocumentStore for DiskDocumentStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, DocumentError> {
        let partition = self.partition(collection)?;
        Ok(self.read(&partition, id)?.map(|fields| Document {
            id: id.to_string(),
            fields,
        }))
    }

    async fn query_eq(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> Result<Vec<Document>, DocumentError> {
        let partition = self.partition(collection)?;
        let mut matches = Vec::new();
        for entry in partition.iter() {
            let (key, bytes) = entry.context("Failed to scan collection")?;
            let id = String::from_utf8_lossy(&key).into_owned();
            let fields = decode(&id, &bytes)?;
            if fields.get(field) == Some(value) {
                matches.push(Document { id, fields });
            }
        }
        debug!(collection, field, count = matches.len(), "Disk query");
        Ok(matches)
    }

    async fn add(&self, collection: &str, fields: Fields) -> Result<String, DocumentError> {
        let partition = self.partition(collection)?;
        let id = self.generate_id();
        let _guard = self.writes.lock().await;
        self.write(&partition, &id, &fields)?;
        debug!(collection, %id, "Disk ADD");
        Ok(id)
    }

    async fn set(&self, collection: &str, id: &str, fields: Fields) -> Result<(), DocumentError> {
        let partition = self.partition(collection)?;
        let _guard = self.writes.lock().await;
        self.write(&partition, id, &fields)?;
        Ok(())
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        fields: Fields,
    ) -> Result<(), DocumentError> {
        let partition = self.partition(collection)?;
        let _guard = self.writes.lock().await;
        let mut existing = self
            .read(&partition, id)?
            .ok_or_else(|| DocumentError::not_found(collection, id))?;
        existing.extend(fields);
        self.write(&partition, id, &existing)?;
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), DocumentError> {
        let partition = self.partition(collection)?;
        let _guard = self.writes.lock().await;
        if !partition
            .contains_key(id)
            .context("Failed to read document")?
        {
            return Err(DocumentError::not_found(collection, id));
        }
        partition.remove(id).context("Failed to delete document")?;
        self.keyspace
            .persist(PersistMode::SyncAll)
            .context("Failed to persist deletion")?;
        debug!(collection, id, "Disk DELETE");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn fields(value: Value) -> Fields {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_documents_survive_reopen() {
        let dir = tempdir().unwrap();
        let first_id;
        {
            let store = DiskDocumentStore::open(dir.path()).unwrap();
            first_id = store
                .add("transactions", fields(json!({"userId": "u1", "amount": 10})))
                .await
                .unwrap();
            store
                .add("transactions", fields(json!({"userId": "u1", "amount": 20})))
                .await
                .unwrap();
            store
                .add("transactions", fields(json!({"userId": "u2", "amount": 30})))
                .await
                .unwrap();
        }

        let store = DiskDocumentStore::open(dir.path()).unwrap();
        let found = store
            .query_eq("transactions", "userId", &json!("u1"))
            .await
            .unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].id, first_id);
        assert_eq!(found[0].fields["amount"], json!(10));
        assert_eq!(found[1].fields["amount"], json!(20));
    }

    #[tokio::test]
    async fn test_update_and_delete_missing() {
        let dir = tempdir().unwrap();
        let store = DiskDocumentStore::open(dir.path()).unwrap();
        let id = store
            .add("transactions", fields(json!({"userId": "u1", "amount": 10})))
            .await
            .unwrap();

        store
            .update("transactions", &id, fields(json!({"category": "Food"})))
            .await
            .unwrap();
        let doc = store.get("transactions", &id).await.unwrap().unwrap();
        assert_eq!(doc.fields["category"], json!("Food"));
        assert_eq!(doc.fields["amount"], json!(10));

        assert!(matches!(
            store
                .update("transactions", "missing", Fields::new())
                .await
                .unwrap_err(),
            DocumentError::NotFound { .. }
        ));

        store.delete("transactions", &id).await.unwrap();
        assert!(store.get("transactions", &id).await.unwrap().is_none());
        assert!(matches!(
            store.delete("transactions", &id).await.unwrap_err(),
            DocumentError::NotFound { .. }
        ));
    }

    #[tokio::test]
    async fn test_set_overwrites() {
        let dir = tempdir().unwrap();
        let store = DiskDocumentStore::open(dir.path()).unwrap();
        store
            .set("users", "local", fields(json!({"currency": "USD"})))
            .await
            .unwrap();
        store
            .set("users", "local", fields(json!({"currency": "EUR"})))
            .await
            .unwrap();
        let doc = store.get("users", "local").await.unwrap().unwrap();
        assert_eq!(doc.fields, fields(json!({"currency": "EUR"})));
    }
}

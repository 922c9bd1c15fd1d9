//! The transaction store: an in-memory snapshot kept in step with a
//! [`DocumentStore`].
//!
//! Every operation is a single round trip with no retry. Failures are
//! audited with their backend detail, announced once through the
//! notification sink and returned as a [`FinanceError`] carrying only the
//! generic message. Status is tracked per operation, never in shared flags.

use crate::core::audit::{AuditRecord, AuditSink, record_best_effort};
use crate::core::document::{DocumentError, DocumentStore, Fields, TRANSACTIONS};
use crate::core::error::{FinanceError, WriteAction};
use crate::core::notify::{NotificationKind, NotificationSink};
use crate::core::transaction::{Transaction, TransactionDraft, now_timestamp};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

/// The transactions currently held, with a revision that changes on every
/// mutation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    revision: u64,
    transactions: Vec<Transaction>,
}

impl Snapshot {
    pub fn from_transactions(transactions: Vec<Transaction>) -> Self {
        Self {
            revision: 0,
            transactions,
        }
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn find(&self, id: &str) -> Option<&Transaction> {
        self.transactions.iter().find(|t| t.id == id)
    }

    pub(crate) fn replace(&mut self, transactions: Vec<Transaction>) {
        self.transactions = transactions;
        self.revision += 1;
    }

    pub(crate) fn push(&mut self, transaction: Transaction) {
        self.transactions.push(transaction);
        self.revision += 1;
    }

    /// Swaps in `transaction` for the entry with the same id. Returns false,
    /// leaving the snapshot as it was, when there is none.
    pub(crate) fn replace_entry(&mut self, transaction: Transaction) -> bool {
        match self.transactions.iter_mut().find(|t| t.id == transaction.id) {
            Some(entry) => {
                *entry = transaction;
                self.revision += 1;
                true
            }
            None => false,
        }
    }

    pub(crate) fn remove(&mut self, id: &str) -> bool {
        let before = self.transactions.len();
        self.transactions.retain(|t| t.id != id);
        if self.transactions.len() == before {
            return false;
        }
        self.revision += 1;
        true
    }
}

/// Result of an update or delete that reached the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationOutcome {
    Applied,
    /// No transaction with that id exists; nothing changed.
    NotFound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OperationId(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Fetch,
    Create,
    Update,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationStatus {
    Pending,
    Succeeded,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationRecord {
    pub kind: OperationKind,
    pub status: OperationStatus,
}

/// Settled operations kept for inspection; older ones are forgotten first.
pub const SETTLED_LIMIT: usize = 64;

/// Status of each ledger operation, keyed by its own id so overlapping
/// operations cannot overwrite one another's outcome.
#[derive(Debug, Default)]
pub struct OperationTracker {
    next_id: AtomicU64,
    records: Mutex<HashMap<OperationId, OperationRecord>>,
}

impl OperationTracker {
    async fn begin(&self, kind: OperationKind) -> OperationId {
        let id = OperationId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        self.records.lock().await.insert(
            id,
            OperationRecord {
                kind,
                status: OperationStatus::Pending,
            },
        );
        id
    }

    async fn finish(&self, id: OperationId, status: OperationStatus) {
        let mut records = self.records.lock().await;
        if let Some(record) = records.get_mut(&id) {
            record.status = status;
        }

        let mut settled: Vec<OperationId> = records
            .iter()
            .filter(|(_, record)| record.status != OperationStatus::Pending)
            .map(|(id, _)| *id)
            .collect();
        if settled.len() > SETTLED_LIMIT {
            settled.sort();
            for old in &settled[..settled.len() - SETTLED_LIMIT] {
                records.remove(old);
            }
        }
    }

    pub async fn status(&self, id: OperationId) -> Option<OperationStatus> {
        self.records
            .lock()
            .await
            .get(&id)
            .map(|record| record.status.clone())
    }

    /// True while any operation is still in flight.
    pub async fn is_loading(&self) -> bool {
        self.records
            .lock()
            .await
            .values()
            .any(|record| record.status == OperationStatus::Pending)
    }

    /// Failed operations, oldest first.
    pub async fn failures(&self) -> Vec<(OperationId, OperationRecord)> {
        let records = self.records.lock().await;
        let mut failed: Vec<_> = records
            .iter()
            .filter(|(_, record)| matches!(record.status, OperationStatus::Failed(_)))
            .map(|(id, record)| (*id, record.clone()))
            .collect();
        failed.sort_by_key(|(id, _)| *id);
        failed
    }

    /// Forgets every operation that is no longer pending.
    pub async fn clear_settled(&self) {
        self.records
            .lock()
            .await
            .retain(|_, record| record.status == OperationStatus::Pending);
    }
}

pub struct Ledger {
    documents: Arc<dyn DocumentStore>,
    notifier: Arc<dyn NotificationSink>,
    audit: Arc<dyn AuditSink>,
    snapshot: RwLock<Snapshot>,
    operations: OperationTracker,
}

impl Ledger {
    pub fn new(
        documents: Arc<dyn DocumentStore>,
        notifier: Arc<dyn NotificationSink>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            documents,
            notifier,
            audit,
            snapshot: RwLock::new(Snapshot::default()),
            operations: OperationTracker::default(),
        }
    }

    pub async fn snapshot(&self) -> Snapshot {
        self.snapshot.read().await.clone()
    }

    pub fn operations(&self) -> &OperationTracker {
        &self.operations
    }

    /// Replaces the snapshot with every transaction owned by `owner_id`.
    ///
    /// The replacement is wholesale: a create that committed after the
    /// remote query ran is dropped from the snapshot until the next fetch.
    pub async fn fetch_all(&self, owner_id: &str) -> Result<Snapshot, FinanceError> {
        let op = self.operations.begin(OperationKind::Fetch).await;
        debug!(owner_id, "Fetching transactions");

        let documents = match self
            .documents
            .query_eq(TRANSACTIONS, "userId", &Value::from(owner_id))
            .await
        {
            Ok(documents) => documents,
            Err(e) => {
                let context = context_of([("userId", Value::from(owner_id))]);
                return Err(self.fail(op, FinanceError::Fetch, e, context).await);
            }
        };

        let fallback_date = now_timestamp();
        let transactions: Vec<Transaction> = documents
            .into_iter()
            .filter_map(|document| {
                Transaction::from_document(document, &fallback_date)
                    .map_err(|e| warn!(error = %e, "Skipping unreadable transaction document"))
                    .ok()
            })
            .collect();
        info!(owner_id, count = transactions.len(), "Fetched transactions");

        let snapshot = {
            let mut snapshot = self.snapshot.write().await;
            snapshot.replace(transactions);
            snapshot.clone()
        };
        self.operations
            .finish(op, OperationStatus::Succeeded)
            .await;
        Ok(snapshot)
    }

    /// Stores a new transaction for `owner_id` and appends it to the
    /// snapshot with the id the backend assigned.
    pub async fn create(
        &self,
        owner_id: &str,
        draft: TransactionDraft,
    ) -> Result<Transaction, FinanceError> {
        let op = self.operations.begin(OperationKind::Create).await;
        self.notifier
            .notify(NotificationKind::Info, "Adding transaction...");

        let fields = Transaction::from_draft(String::new(), owner_id, draft.clone()).to_fields();

        let started = Instant::now();
        let id = match self.documents.add(TRANSACTIONS, fields.clone()).await {
            Ok(id) => id,
            Err(e) => {
                let context = context_of([
                    ("userId", Value::from(owner_id)),
                    ("data", Value::Object(fields)),
                ]);
                let error = FinanceError::Write(WriteAction::Create);
                return Err(self.fail(op, error, e, context).await);
            }
        };
        debug!(
            duration_ms = started.elapsed().as_millis() as u64,
            "transaction_save_time"
        );

        let transaction = Transaction::from_draft(id, owner_id, draft);
        self.snapshot.write().await.push(transaction.clone());
        self.operations
            .finish(op, OperationStatus::Succeeded)
            .await;
        self.notifier
            .notify(NotificationKind::Success, "Transaction added");
        info!(id = %transaction.id, "Transaction added");
        Ok(transaction)
    }

    /// Writes the editable fields of `transaction` and swaps it into the
    /// snapshot.
    pub async fn update(&self, transaction: Transaction) -> Result<MutationOutcome, FinanceError> {
        let op = self.operations.begin(OperationKind::Update).await;
        self.notifier
            .notify(NotificationKind::Info, "Saving changes...");

        match self
            .documents
            .update(TRANSACTIONS, &transaction.id, transaction.editable_fields())
            .await
        {
            Ok(()) => {}
            Err(DocumentError::NotFound { .. }) => {
                return Ok(self.not_found(op, &transaction.id).await);
            }
            Err(e) => {
                let context = context_of([("transaction", transaction_value(&transaction))]);
                let error = FinanceError::Write(WriteAction::Update);
                return Err(self.fail(op, error, e, context).await);
            }
        }

        let id = transaction.id.clone();
        if !self.snapshot.write().await.replace_entry(transaction) {
            return Ok(self.not_found(op, &id).await);
        }
        self.operations
            .finish(op, OperationStatus::Succeeded)
            .await;
        self.notifier
            .notify(NotificationKind::Success, "Transaction updated");
        info!(%id, "Transaction updated");
        Ok(MutationOutcome::Applied)
    }

    pub async fn delete(&self, id: &str) -> Result<MutationOutcome, FinanceError> {
        let op = self.operations.begin(OperationKind::Delete).await;
        self.notifier
            .notify(NotificationKind::Info, "Deleting transaction...");

        match self.documents.delete(TRANSACTIONS, id).await {
            Ok(()) => {}
            Err(DocumentError::NotFound { .. }) => return Ok(self.not_found(op, id).await),
            Err(e) => {
                let context = context_of([("id", Value::from(id))]);
                let error = FinanceError::Write(WriteAction::Delete);
                return Err(self.fail(op, error, e, context).await);
            }
        }

        if !self.snapshot.write().await.remove(id) {
            return Ok(self.not_found(op, id).await);
        }
        self.operations
            .finish(op, OperationStatus::Succeeded)
            .await;
        self.notifier
            .notify(NotificationKind::Success, "Transaction deleted");
        info!(id, "Transaction deleted");
        Ok(MutationOutcome::Applied)
    }

    async fn not_found(&self, op: OperationId, id: &str) -> MutationOutcome {
        debug!(id, "Transaction not found");
        self.operations
            .finish(op, OperationStatus::Succeeded)
            .await;
        self.notifier
            .notify(NotificationKind::Error, "Transaction not found");
        MutationOutcome::NotFound
    }

    async fn fail(
        &self,
        op: OperationId,
        error: FinanceError,
        cause: DocumentError,
        context: Fields,
    ) -> FinanceError {
        warn!(error = %cause, "{}", error.audit_message());

        let mut record = AuditRecord::error(error.audit_message()).detail("error", cause.to_string());
        record.context = context;
        record_best_effort(self.audit.as_ref(), record).await;

        self.notifier
            .notify(NotificationKind::Error, &error.to_string());
        self.operations
            .finish(op, OperationStatus::Failed(error.to_string()))
            .await;
        error
    }
}

fn context_of<const N: usize>(entries: [(&str, Value); N]) -> Fields {
    entries
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect()
}

fn transaction_value(transaction: &Transaction) -> Value {
    let mut fields = transaction.to_fields();
    fields.insert("id".to_string(), Value::from(transaction.id.clone()));
    Value::Object(fields)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::audit::AuditKind;
    use crate::core::document::Document;
    use crate::core::notify::{Notification, NotificationCenter};
    use crate::core::transaction::TransactionKind;
    use crate::store::memory::MemoryDocumentStore;
    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use serde_json::json;

    #[derive(Default)]
    struct RecordingAudit {
        records: Mutex<Vec<AuditRecord>>,
    }

    #[async_trait]
    impl AuditSink for RecordingAudit {
        async fn record(&self, record: &AuditRecord) -> anyhow::Result<()> {
            self.records.lock().await.push(record.clone());
            Ok(())
        }
    }

    /// A backend that is down for every call.
    struct UnavailableStore;

    #[async_trait]
    impl DocumentStore for UnavailableStore {
        async fn get(&self, _: &str, _: &str) -> Result<Option<Document>, DocumentError> {
            Err(anyhow::anyhow!("connection refused").into())
        }
        async fn query_eq(
            &self,
            _: &str,
            _: &str,
            _: &Value,
        ) -> Result<Vec<Document>, DocumentError> {
            Err(anyhow::anyhow!("connection refused").into())
        }
        async fn add(&self, _: &str, _: Fields) -> Result<String, DocumentError> {
            Err(anyhow::anyhow!("connection refused").into())
        }
        async fn set(&self, _: &str, _: &str, _: Fields) -> Result<(), DocumentError> {
            Err(anyhow::anyhow!("connection refused").into())
        }
        async fn update(&self, _: &str, _: &str, _: Fields) -> Result<(), DocumentError> {
            Err(anyhow::anyhow!("connection refused").into())
        }
        async fn delete(&self, _: &str, _: &str) -> Result<(), DocumentError> {
            Err(anyhow::anyhow!("connection refused").into())
        }
    }

    struct Fixture {
        ledger: Ledger,
        store: Arc<MemoryDocumentStore>,
        notifications: Arc<NotificationCenter>,
        audit: Arc<RecordingAudit>,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryDocumentStore::new());
        let notifications = Arc::new(NotificationCenter::new());
        let audit = Arc::new(RecordingAudit::default());
        let ledger = Ledger::new(store.clone(), notifications.clone(), audit.clone());
        Fixture {
            ledger,
            store,
            notifications,
            audit,
        }
    }

    fn draft(kind: TransactionKind, amount: i64, category: &str, date: &str) -> TransactionDraft {
        TransactionDraft::new(kind, Decimal::from(amount), category, Some(date))
    }

    fn messages(list: &[Notification]) -> Vec<(NotificationKind, String)> {
        list.iter().map(|n| (n.kind, n.message.clone())).collect()
    }

    #[tokio::test]
    async fn test_create_then_fetch_returns_assigned_id() {
        let f = fixture();
        let created = f
            .ledger
            .create(
                "user1",
                draft(TransactionKind::Income, 100, "Salary", "2023-01-06"),
            )
            .await
            .unwrap();
        assert!(!created.id.is_empty());
        assert_eq!(created.user_id, "user1");

        let fresh = Ledger::new(
            f.store.clone(),
            f.notifications.clone(),
            f.audit.clone(),
        );
        let snapshot = fresh.fetch_all("user1").await.unwrap();
        assert_eq!(snapshot.transactions(), &[created]);
    }

    #[tokio::test]
    async fn test_fetch_only_returns_owner_transactions() {
        let f = fixture();
        f.ledger
            .create("user1", draft(TransactionKind::Income, 100, "Salary", "2023-01-06"))
            .await
            .unwrap();
        f.ledger
            .create("user2", draft(TransactionKind::Expense, 5, "Food", "2023-01-06"))
            .await
            .unwrap();

        let snapshot = f.ledger.fetch_all("user2").await.unwrap();
        assert_eq!(snapshot.transactions().len(), 1);
        assert_eq!(snapshot.transactions()[0].category, "Food");
    }

    #[tokio::test]
    async fn test_fetch_substitutes_missing_date_and_skips_broken_documents() {
        let f = fixture();
        f.store
            .add(
                TRANSACTIONS,
                json!({"userId": "user1", "type": "income", "amount": 10, "category": "Gift"})
                    .as_object()
                    .cloned()
                    .unwrap(),
            )
            .await
            .unwrap();
        f.store
            .add(
                TRANSACTIONS,
                json!({"userId": "user1", "type": "income", "amount": "lots"})
                    .as_object()
                    .cloned()
                    .unwrap(),
            )
            .await
            .unwrap();

        let snapshot = f.ledger.fetch_all("user1").await.unwrap();
        assert_eq!(snapshot.transactions().len(), 1);
        assert!(snapshot.transactions()[0].occurred_at().is_some());
    }

    #[tokio::test]
    async fn test_update_replaces_entry() {
        let f = fixture();
        let mut tx = f
            .ledger
            .create("user1", draft(TransactionKind::Expense, 30, "Food", "2023-01-08"))
            .await
            .unwrap();
        tx.amount = Decimal::from(45);
        tx.category = "Groceries".to_string();

        let outcome = f.ledger.update(tx.clone()).await.unwrap();
        assert_eq!(outcome, MutationOutcome::Applied);
        assert_eq!(f.ledger.snapshot().await.transactions(), &[tx.clone()]);

        let stored = f.store.get(TRANSACTIONS, &tx.id).await.unwrap().unwrap();
        assert_eq!(stored.fields["amount"], json!(45));
        assert_eq!(stored.fields["userId"], json!("user1"));
    }

    #[tokio::test]
    async fn test_update_missing_id_is_not_found_and_leaves_snapshot() {
        let f = fixture();
        f.ledger
            .create("user1", draft(TransactionKind::Expense, 30, "Food", "2023-01-08"))
            .await
            .unwrap();
        let before = f.ledger.snapshot().await;

        let ghost = Transaction::from_draft(
            "missing".to_string(),
            "user1",
            draft(TransactionKind::Expense, 1, "Food", "2023-01-08"),
        );
        let outcome = f.ledger.update(ghost).await.unwrap();

        assert_eq!(outcome, MutationOutcome::NotFound);
        assert_eq!(f.ledger.snapshot().await, before);
    }

    #[tokio::test]
    async fn test_delete_removes_entry() {
        let f = fixture();
        let tx = f
            .ledger
            .create("user1", draft(TransactionKind::Expense, 30, "Food", "2023-01-08"))
            .await
            .unwrap();

        let outcome = f.ledger.delete(&tx.id).await.unwrap();
        assert_eq!(outcome, MutationOutcome::Applied);
        assert!(f.ledger.snapshot().await.transactions().is_empty());
        assert!(f.store.get(TRANSACTIONS, &tx.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_missing_id_leaves_snapshot_unchanged() {
        let f = fixture();
        f.ledger
            .create("user1", draft(TransactionKind::Income, 100, "Salary", "2023-01-06"))
            .await
            .unwrap();
        let before = f.ledger.snapshot().await;

        let outcome = f.ledger.delete("missing").await.unwrap();

        assert_eq!(outcome, MutationOutcome::NotFound);
        assert_eq!(f.ledger.snapshot().await, before);
        assert_eq!(
            messages(&f.notifications.list()).last(),
            Some(&(NotificationKind::Error, "Transaction not found".to_string()))
        );
    }

    #[tokio::test]
    async fn test_fetch_failure_keeps_snapshot_and_reports_once() {
        let f = fixture();
        f.ledger
            .create("user1", draft(TransactionKind::Income, 100, "Salary", "2023-01-06"))
            .await
            .unwrap();
        let before = f.ledger.snapshot().await;

        let notifications = Arc::new(NotificationCenter::new());
        let audit = Arc::new(RecordingAudit::default());
        let broken = Ledger::new(Arc::new(UnavailableStore), notifications.clone(), audit.clone());
        *broken.snapshot.write().await = before.clone();

        let err = broken.fetch_all("user1").await.unwrap_err();
        assert_eq!(err, FinanceError::Fetch);
        assert_eq!(broken.snapshot().await, before);

        assert_eq!(
            messages(&notifications.list()),
            vec![(NotificationKind::Error, "Failed to load transactions".to_string())]
        );
        let records = audit.records.lock().await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].kind, AuditKind::Error);
        assert_eq!(records[0].message, "Error while loading transactions");
        assert!(records[0].details["error"]
            .as_str()
            .unwrap()
            .contains("connection refused"));
        assert_eq!(records[0].context["userId"], json!("user1"));
    }

    #[tokio::test]
    async fn test_write_failures_leave_snapshot_unchanged() {
        let notifications = Arc::new(NotificationCenter::new());
        let audit = Arc::new(RecordingAudit::default());
        let ledger = Ledger::new(Arc::new(UnavailableStore), notifications.clone(), audit.clone());

        let err = ledger
            .create("user1", draft(TransactionKind::Income, 1, "Salary", "2023-01-06"))
            .await
            .unwrap_err();
        assert_eq!(err, FinanceError::Write(WriteAction::Create));
        assert_eq!(err.to_string(), "Failed to add transaction");

        let err = ledger.delete("any").await.unwrap_err();
        assert_eq!(err, FinanceError::Write(WriteAction::Delete));

        assert!(ledger.snapshot().await.transactions().is_empty());
        assert_eq!(ledger.snapshot().await.revision(), 0);
        assert_eq!(audit.records.lock().await.len(), 2);
    }

    #[tokio::test]
    async fn test_operation_status_is_per_operation() {
        let notifications = Arc::new(NotificationCenter::new());
        let audit = Arc::new(RecordingAudit::default());
        let ledger = Ledger::new(Arc::new(UnavailableStore), notifications, audit);

        let _ = ledger.fetch_all("user1").await;
        let _ = ledger.delete("x").await;

        assert!(!ledger.operations().is_loading().await);
        let failures = ledger.operations().failures().await;
        assert_eq!(failures.len(), 2);
        assert_eq!(failures[0].1.kind, OperationKind::Fetch);
        assert_eq!(
            failures[0].1.status,
            OperationStatus::Failed("Failed to load transactions".to_string())
        );
        assert_eq!(failures[1].1.kind, OperationKind::Delete);
        assert_eq!(
            ledger.operations().status(failures[1].0).await,
            Some(OperationStatus::Failed("Failed to delete transaction".to_string()))
        );

        ledger.operations().clear_settled().await;
        assert!(ledger.operations().failures().await.is_empty());
    }

    #[tokio::test]
    async fn test_settled_operations_are_bounded() {
        let notifications = Arc::new(NotificationCenter::new());
        let audit = Arc::new(RecordingAudit::default());
        let ledger = Ledger::new(Arc::new(UnavailableStore), notifications, audit);

        for i in 0..SETTLED_LIMIT + 10 {
            let _ = ledger.delete(&format!("tx-{i}")).await;
        }

        let failures = ledger.operations().failures().await;
        assert_eq!(failures.len(), SETTLED_LIMIT);
        assert_eq!(failures[0].0, OperationId(11));
        assert_eq!(
            failures.last().map(|(id, _)| *id),
            Some(OperationId((SETTLED_LIMIT + 10) as u64))
        );
        assert_eq!(ledger.operations().status(OperationId(1)).await, None);
    }

    #[tokio::test]
    async fn test_create_notifies_progress_and_success() {
        let f = fixture();
        f.ledger
            .create("user1", draft(TransactionKind::Income, 100, "Salary", "2023-01-06"))
            .await
            .unwrap();
        assert_eq!(
            messages(&f.notifications.list()),
            vec![
                (NotificationKind::Info, "Adding transaction...".to_string()),
                (NotificationKind::Success, "Transaction added".to_string()),
            ]
        );
        assert!(f.audit.records.lock().await.is_empty());
    }
}

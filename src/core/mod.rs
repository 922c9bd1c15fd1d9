//! Domain model, aggregation and the services built on the storage traits

pub mod account;
pub mod analytics;
pub mod audit;
pub mod auth;
pub mod config;
pub mod currency;
pub mod document;
pub mod error;
pub mod filter;
pub mod ledger;
pub mod log;
pub mod notify;
pub mod selector;
pub mod transaction;

// Re-export main types for cleaner imports
pub use account::{AccountService, User};
pub use analytics::{AnalyticsViews, CategoryAggregate, Summary, TrendPoint};
pub use audit::{AuditRecord, AuditSink, DocumentAuditSink};
pub use auth::{AuthProvider, AuthSession, SessionStore, SharedToken};
pub use document::{Document, DocumentError, DocumentStore, Fields};
pub use error::{AuthError, FinanceError};
pub use filter::DateFilter;
pub use ledger::{Ledger, MutationOutcome, Snapshot};
pub use notify::{NotificationCenter, NotificationKind, NotificationSink};
pub use selector::AnalyticsSelector;
pub use transaction::{Transaction, TransactionDraft, TransactionKind};

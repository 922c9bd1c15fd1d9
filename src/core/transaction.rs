//! Transaction records and their mapping to and from stored documents.

use crate::core::document::{Document, DocumentError, Fields};
use anyhow::{Result, anyhow, bail};
use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use std::fmt::Display;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Income,
    Expense,
}

impl Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                TransactionKind::Income => "income",
                TransactionKind::Expense => "expense",
            }
        )
    }
}

impl FromStr for TransactionKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "income" => Ok(TransactionKind::Income),
            "expense" => Ok(TransactionKind::Expense),
            _ => Err(anyhow!("Invalid transaction type: {}", s)),
        }
    }
}

/// A single income or expense record owned by one user.
///
/// `date` keeps the ISO-8601 text as it was stored; use [`parse_instant`]
/// to interpret it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub user_id: String,
    pub kind: TransactionKind,
    pub amount: Decimal,
    pub category: String,
    pub date: String,
}

/// A transaction as entered by the user, before it has an id or an owner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionDraft {
    pub kind: TransactionKind,
    pub amount: Decimal,
    pub category: String,
    pub date: String,
}

impl TransactionDraft {
    pub fn new(kind: TransactionKind, amount: Decimal, category: &str, date: Option<&str>) -> Self {
        Self {
            kind,
            amount,
            category: category.trim().to_string(),
            date: date.map_or_else(today, str::to_string),
        }
    }

    /// Checks the constraints the entry form enforces: a category, a
    /// positive amount no larger than [`MAX_AMOUNT`] and a readable date.
    pub fn validate(&self) -> Result<()> {
        validate_fields(&self.category, self.amount, &self.date)
    }
}

impl Transaction {
    pub fn from_draft(id: String, user_id: &str, draft: TransactionDraft) -> Self {
        Self {
            id,
            user_id: user_id.to_string(),
            kind: draft.kind,
            amount: draft.amount,
            category: draft.category,
            date: draft.date,
        }
    }

    /// Same checks as [`TransactionDraft::validate`], applied before saving an edit.
    pub fn validate(&self) -> Result<()> {
        validate_fields(&self.category, self.amount, &self.date)
    }

    /// Maps a stored document into a transaction. A missing `date` field is
    /// replaced by `fallback_date`.
    pub fn from_document(document: Document, fallback_date: &str) -> Result<Self, DocumentError> {
        let Document { id, fields } = document;
        let malformed = |reason: String| DocumentError::Malformed {
            id: id.clone(),
            reason,
        };

        let user_id = string_field(&fields, "userId")
            .ok_or_else(|| malformed("missing userId".to_string()))?;
        let kind = string_field(&fields, "type")
            .ok_or_else(|| malformed("missing type".to_string()))?
            .parse::<TransactionKind>()
            .map_err(|e| malformed(e.to_string()))?;
        let amount = fields
            .get("amount")
            .and_then(decimal_from_value)
            .ok_or_else(|| malformed("amount is not a number".to_string()))?;
        let category = string_field(&fields, "category").unwrap_or_default();
        let date = string_field(&fields, "date")
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| fallback_date.to_string());

        Ok(Self {
            id,
            user_id,
            kind,
            amount,
            category,
            date,
        })
    }

    /// Every stored field, including the owner.
    pub fn to_fields(&self) -> Fields {
        let mut fields = self.editable_fields();
        fields.insert("userId".to_string(), Value::from(self.user_id.clone()));
        fields
    }

    /// The fields an edit may change; the owner is never rewritten.
    pub fn editable_fields(&self) -> Fields {
        let mut fields = Fields::new();
        fields.insert("amount".to_string(), decimal_to_value(self.amount));
        fields.insert("category".to_string(), Value::from(self.category.clone()));
        fields.insert("type".to_string(), Value::from(self.kind.to_string()));
        fields.insert("date".to_string(), Value::from(self.date.clone()));
        fields
    }

    pub fn occurred_at(&self) -> Option<DateTime<Utc>> {
        parse_instant(&self.date)
    }
}

/// Largest amount a single transaction may carry.
pub const MAX_AMOUNT: i64 = 1_000_000_000_000;

fn validate_fields(category: &str, amount: Decimal, date: &str) -> Result<()> {
    if category.trim().is_empty() {
        bail!("Category must not be empty");
    }
    if amount <= Decimal::ZERO {
        bail!("Amount must be greater than zero, got {amount}");
    }
    if amount > Decimal::from(MAX_AMOUNT) {
        bail!("Amount must not exceed {MAX_AMOUNT}, got {amount}");
    }
    if parse_instant(date).is_none() {
        bail!("Date must be an ISO-8601 date such as 2024-03-01, got '{date}'");
    }
    Ok(())
}

fn string_field(fields: &Fields, name: &str) -> Option<String> {
    fields.get(name).and_then(Value::as_str).map(str::to_string)
}

fn decimal_from_value(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .map(Decimal::from)
            .or_else(|| n.as_f64().and_then(Decimal::from_f64)),
        Value::String(s) => Decimal::from_str(s.trim()).ok(),
        _ => None,
    }
}

/// Whole amounts are written as integers, fractional ones as floats.
fn decimal_to_value(amount: Decimal) -> Value {
    if amount.fract().is_zero()
        && let Some(whole) = amount.to_i64()
    {
        return Value::from(whole);
    }
    amount
        .to_f64()
        .and_then(Number::from_f64)
        .map_or_else(|| Value::from(amount.to_string()), Value::Number)
}

/// Parses a stored date: an RFC 3339 instant, a naive `YYYY-MM-DDTHH:MM:SS`
/// timestamp or a plain `YYYY-MM-DD` date. Naive values are read as UTC.
pub fn parse_instant(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(instant) = DateTime::parse_from_rfc3339(raw) {
        return Some(instant.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Current instant in the format used for substituted document dates.
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn today() -> String {
    Utc::now().date_naive().format("%Y-%m-%d").to_string()
}

//! Derived views over a transaction list: per-category totals, daily trend
//! points and overall income/expense figures.
use crate::core::filter::{DateFilter, filter_by_date};
use crate::core::transaction::{Transaction, TransactionKind};
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;
use tracing::debug;

/// Summed amount of one category for one transaction kind.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryAggregate {
    pub name: String,
    pub value: Decimal,
}

/// Income and expense totals of one `MM-DD` bucket.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendPoint {
    pub date: String,
    pub income: Decimal,
    pub expense: Decimal,
}

/// Totals across a whole transaction list.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Summary {
    pub income: Decimal,
    pub expenses: Decimal,
    pub balance: Decimal,
}

/// The three chart views computed for one date filter.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct AnalyticsViews {
    pub income: Vec<CategoryAggregate>,
    pub expense: Vec<CategoryAggregate>,
    pub trends: Vec<TrendPoint>,
}

impl AnalyticsViews {
    pub fn compute(transactions: &[Transaction], filter: DateFilter, now: DateTime<Utc>) -> Self {
        let filtered = filter_by_date(transactions, filter, now);
        debug!(
            total = transactions.len(),
            kept = filtered.len(),
            %filter,
            "Computing analytics views"
        );
        Self {
            income: category_totals(filtered.iter().copied(), TransactionKind::Income),
            expense: category_totals(filtered.iter().copied(), TransactionKind::Expense),
            trends: trend_series(filtered.iter().copied()),
        }
    }
}

/// Sums amounts per category for transactions of `kind`.
///
/// Categories appear in the order they are first seen, not sorted by name
/// or total. Transactions of the other kind contribute nothing. Totals
/// saturate at `Decimal::MAX` instead of overflowing.
pub fn category_totals<'a, I>(transactions: I, kind: TransactionKind) -> Vec<CategoryAggregate>
where
    I: IntoIterator<Item = &'a Transaction>,
{
    let mut totals: Vec<CategoryAggregate> = Vec::new();
    let mut index: HashMap<&'a str, usize> = HashMap::new();

    for tx in transactions.into_iter().filter(|tx| tx.kind == kind) {
        match index.get(tx.category.as_str()) {
            Some(&i) => totals[i].value = totals[i].value.saturating_add(tx.amount),
            None => {
                index.insert(tx.category.as_str(), totals.len());
                totals.push(CategoryAggregate {
                    name: tx.category.clone(),
                    value: tx.amount,
                });
            }
        }
    }

    totals
}

/// Groups transactions into `MM-DD` buckets and sums income and expense
/// separately within each.
///
/// The bucket label drops the year, so the same day of different years
/// lands in one bucket. Buckets are ordered by month and day; labels that
/// are not a valid month-day (an unparseable stored date is used verbatim)
/// come last in first-seen order.
pub fn trend_series<'a, I>(transactions: I) -> Vec<TrendPoint>
where
    I: IntoIterator<Item = &'a Transaction>,
{
    let mut points: Vec<TrendPoint> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for tx in transactions {
        let label = bucket_label(&tx.date);
        let i = *index.entry(label.clone()).or_insert_with(|| {
            points.push(TrendPoint {
                date: label,
                income: Decimal::ZERO,
                expense: Decimal::ZERO,
            });
            points.len() - 1
        });
        match tx.kind {
            TransactionKind::Income => points[i].income = points[i].income.saturating_add(tx.amount),
            TransactionKind::Expense => {
                points[i].expense = points[i].expense.saturating_add(tx.amount)
            }
        }
    }

    points.sort_by_key(|point| match month_day(&point.date) {
        Some(md) => (0, md),
        None => (1, (0, 0)),
    });
    points
}

/// The `MM-DD` label of a stored date, taken from its UTC calendar day.
pub fn bucket_label(date: &str) -> String {
    crate::core::transaction::parse_instant(date)
        .map(|at| at.format("%m-%d").to_string())
        .unwrap_or_else(|| date.to_string())
}

/// Reads a bucket label back as (month, day). Any leap year works for the
/// check, since only the ordering within one year matters.
fn month_day(label: &str) -> Option<(u32, u32)> {
    let (month, day) = label.split_once('-')?;
    let date = NaiveDate::from_ymd_opt(2000, month.parse().ok()?, day.parse().ok()?)?;
    Some((date.month(), date.day()))
}

/// Income, expenses and their difference, saturating like [`category_totals`].
pub fn summarize<'a, I>(transactions: I) -> Summary
where
    I: IntoIterator<Item = &'a Transaction>,
{
    let mut summary = Summary::default();
    for tx in transactions {
        match tx.kind {
            TransactionKind::Income => summary.income = summary.income.saturating_add(tx.amount),
            TransactionKind::Expense => {
                summary.expenses = summary.expenses.saturating_add(tx.amount)
            }
        }
    }
    summary.balance = summary.income.saturating_sub(summary.expenses);
    summary
}

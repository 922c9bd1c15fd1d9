//! Rolling date windows over a transaction list.

use crate::core::transaction::Transaction;
use anyhow::Result;
use chrono::{DateTime, Months, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DateFilter {
    Week,
    #[default]
    Month,
    Year,
    All,
}

impl Display for DateFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                DateFilter::Week => "week",
                DateFilter::Month => "month",
                DateFilter::Year => "year",
                DateFilter::All => "all",
            }
        )
    }
}

impl FromStr for DateFilter {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "week" => Ok(DateFilter::Week),
            "month" => Ok(DateFilter::Month),
            "year" => Ok(DateFilter::Year),
            "all" => Ok(DateFilter::All),
            _ => Err(anyhow::anyhow!("Invalid date filter: {}", s)),
        }
    }
}

impl DateFilter {
    /// The instant a transaction must be strictly after to pass the filter.
    ///
    /// Months and years are calendar arithmetic: the day of month is clamped
    /// to the end of a shorter month (Mar 31 -> Feb 28, Feb 29 -> Feb 28).
    pub fn lower_bound(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let bound = match self {
            DateFilter::All => return None,
            DateFilter::Week => now.checked_sub_signed(TimeDelta::weeks(1)),
            DateFilter::Month => now.checked_sub_months(Months::new(1)),
            DateFilter::Year => now.checked_sub_months(Months::new(12)),
        };
        Some(bound.unwrap_or(DateTime::<Utc>::MIN_UTC))
    }
}

/// Keeps the transactions dated strictly after the filter's lower bound,
/// in their original order. A transaction at exactly the bound is dropped,
/// as is any transaction whose date cannot be parsed.
pub fn filter_by_date(
    transactions: &[Transaction],
    filter: DateFilter,
    now: DateTime<Utc>,
) -> Vec<&Transaction> {
    let Some(bound) = filter.lower_bound(now) else {
        return transactions.iter().collect();
    };

    transactions
        .iter()
        .filter(|tx| tx.occurred_at().is_some_and(|at| at > bound))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::transaction::TransactionKind;
    use chrono::{SecondsFormat, TimeZone};

    fn tx(id: &str, date: &str) -> Transaction {
        Transaction {
            id: id.to_string(),
            user_id: "user1".to_string(),
            kind: TransactionKind::Expense,
            amount: 10.into(),
            category: "Food".to_string(),
            date: date.to_string(),
        }
    }

    fn ids(filtered: &[&Transaction]) -> Vec<String> {
        filtered.iter().map(|t| t.id.clone()).collect()
    }

    fn iso(at: DateTime<Utc>) -> String {
        at.to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    #[test]
    fn test_all_is_identity() {
        let now = Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap();
        let transactions = vec![
            tx("1", "1999-01-01"),
            tx("2", "garbage"),
            tx("3", "2030-01-01"),
        ];
        let filtered = filter_by_date(&transactions, DateFilter::All, now);
        assert_eq!(ids(&filtered), vec!["1", "2", "3"]);
    }

    #[test]
    fn test_boundary_is_exclusive() {
        let now = Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap();
        for filter in [DateFilter::Week, DateFilter::Month, DateFilter::Year] {
            let bound = filter.lower_bound(now).unwrap();
            let transactions = vec![
                tx("before", &iso(bound - TimeDelta::seconds(1))),
                tx("at", &iso(bound)),
                tx("after", &iso(bound + TimeDelta::seconds(1))),
            ];
            let filtered = filter_by_date(&transactions, filter, now);
            assert_eq!(ids(&filtered), vec!["after"], "filter {filter}");
        }
    }

    #[test]
    fn test_lower_bounds() {
        let now = Utc.with_ymd_and_hms(2024, 3, 31, 9, 30, 0).unwrap();
        assert_eq!(
            DateFilter::Week.lower_bound(now),
            Some(Utc.with_ymd_and_hms(2024, 3, 24, 9, 30, 0).unwrap())
        );
        assert_eq!(
            DateFilter::Month.lower_bound(now),
            Some(Utc.with_ymd_and_hms(2024, 2, 29, 9, 30, 0).unwrap())
        );

        let leap_day = Utc.with_ymd_and_hms(2024, 2, 29, 0, 0, 0).unwrap();
        assert_eq!(
            DateFilter::Year.lower_bound(leap_day),
            Some(Utc.with_ymd_and_hms(2023, 2, 28, 0, 0, 0).unwrap())
        );
        assert_eq!(DateFilter::All.lower_bound(now), None);
    }

    #[test]
    fn test_preserves_order_and_skips_unparseable_dates() {
        let now = Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap();
        let transactions = vec![
            tx("late", "2024-06-14"),
            tx("bad", "14/06/2024"),
            tx("old", "2024-01-01"),
            tx("early", "2024-06-10T08:00:00Z"),
        ];
        let filtered = filter_by_date(&transactions, DateFilter::Week, now);
        assert_eq!(ids(&filtered), vec!["late", "early"]);
    }

    #[test]
    fn test_from_str() {
        assert_eq!("WEEK".parse::<DateFilter>().unwrap(), DateFilter::Week);
        assert_eq!("all".parse::<DateFilter>().unwrap(), DateFilter::All);
        assert!("decade".parse::<DateFilter>().is_err());
        assert_eq!(DateFilter::default(), DateFilter::Month);
    }
}

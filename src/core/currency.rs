//! Display currencies a user can pick for their profile

use anyhow::{Result, bail};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Currency {
    pub code: &'static str,
    pub symbol: &'static str,
}

pub const DEFAULT_CURRENCY: Currency = Currency {
    code: "RUB",
    symbol: "₽",
};

pub const CURRENCIES: [Currency; 9] = [
    DEFAULT_CURRENCY,
    Currency { code: "USD", symbol: "$" },
    Currency { code: "EUR", symbol: "€" },
    Currency { code: "AUD", symbol: "A$" },
    Currency { code: "CAD", symbol: "C$" },
    Currency { code: "CHF", symbol: "CHF" },
    Currency { code: "CNY", symbol: "¥" },
    Currency { code: "GBP", symbol: "£" },
    Currency { code: "JPY", symbol: "¥" },
];

pub fn find(code: &str) -> Option<Currency> {
    CURRENCIES
        .iter()
        .copied()
        .find(|c| c.code.eq_ignore_ascii_case(code))
}

/// Symbol for `code`, or the default currency's symbol when unknown.
pub fn symbol_for(code: &str) -> &'static str {
    find(code).unwrap_or(DEFAULT_CURRENCY).symbol
}

/// Looks up a currency the user asked for by code.
pub fn parse(code: &str) -> Result<Currency> {
    match find(code.trim()) {
        Some(currency) => Ok(currency),
        None => bail!(
            "Unknown currency '{}'. Supported: {}",
            code,
            CURRENCIES.map(|c| c.code).join(", ")
        ),
    }
}

//! Universal types shared across the engine and its collaborators.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A balance value as supplied by callers.
///
/// JSON inputs deserialize into `Text` or `Number`; `Fixed` carries a
/// third-party fixed-point value handed over programmatically. All three
/// resolve to a decimal string once, at ingestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BalanceValue {
    Text(String),
    Number(f64),
    Fixed(Decimal),
}

impl BalanceValue {
    /// Canonical fixed-point string representation.
    pub fn to_decimal_string(&self) -> String {
        match self {
            BalanceValue::Text(s) => s.clone(),
            BalanceValue::Number(n) => {
                // Render integral values without a trailing ".0" so raw
                // base-unit balances stay integer-shaped.
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    format!("{}", *n as i64)
                } else {
                    format!("{n}")
                }
            }
            BalanceValue::Fixed(d) => d.normalize().to_string(),
        }
    }
}

/// One entry of the list input form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceEntry {
    pub address: String,
    pub balance: BalanceValue,
}

/// Caller-supplied balances, in either accepted shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawBalances {
    /// Canonical form: identifier → amount.
    Map(HashMap<String, BalanceValue>),
    /// List form: `{address, balance}` pairs on the default chain.
    List(Vec<BalanceEntry>),
}

/// On-chain metadata for one token. Either field may be absent when the
/// corresponding call failed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenMetadata {
    pub symbol: Option<String>,
    pub decimals: Option<u32>,
}

/// Which point in time prices are fetched for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceTimestamp {
    /// Live prices.
    Now,
    /// Historical prices at a Unix timestamp (seconds).
    At(u64),
}

/// The result of a portfolio valuation.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Valuation {
    /// Total USD value across all tokens.
    pub usd_tvl: f64,
    /// USD value per resolved symbol.
    pub usd_token_balances: HashMap<String, f64>,
    /// Token amount per resolved symbol.
    pub token_balances: HashMap<String, f64>,
}

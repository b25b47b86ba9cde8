//! Input normalization.
//!
//! Converts either input shape into the canonical `identifier → amount`
//! mapping. List-form entries get their raw (base-unit) amount reconstructed
//! from a batched decimals lookup; the native-asset sentinel is rewritten to
//! its canonical identifier with the amount scaled down by 10^18.

use std::collections::HashMap;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tracing::warn;

use tally_common::constants::{NATIVE_DECIMALS, NATIVE_ID, NATIVE_SENTINEL};
use tally_common::traits::Multicall;
use tally_common::types::{BalanceEntry, RawBalances};
use tally_common::Chain;

/// A normalized amount. `Unknown` marks entries whose decimals could not be
/// resolved; they degrade to a zero-amount warning at valuation time instead
/// of failing the run.
#[derive(Debug, Clone, PartialEq)]
pub enum NormalizedAmount {
    Value(String),
    Unknown,
}

pub type NormalizedBalances = HashMap<String, NormalizedAmount>;

/// Normalize caller-supplied balances into the canonical mapping form.
/// Never fails: unresolvable entries are marked [`NormalizedAmount::Unknown`]
/// and surface as valuation-time warnings.
pub async fn normalize(raw: RawBalances, multicall: &dyn Multicall) -> NormalizedBalances {
    let mut balances = match raw {
        RawBalances::Map(map) => map
            .into_iter()
            .map(|(key, value)| (key, NormalizedAmount::Value(value.to_decimal_string())))
            .collect(),
        RawBalances::List(entries) => expand_list(entries, multicall).await,
    };
    rewrite_native(&mut balances);
    balances
}

/// List form: one decimals batch across all addresses on the default chain,
/// then `amount = balance × 10^decimals`, keyed by the original address.
async fn expand_list(
    entries: Vec<BalanceEntry>,
    multicall: &dyn Multicall,
) -> NormalizedBalances {
    if entries.is_empty() {
        return HashMap::new();
    }

    let targets: Vec<String> = entries.iter().map(|e| e.address.clone()).collect();
    // A failure of the whole batch degrades every entry rather than aborting
    // the valuation; the sentinel keeps its assumed 18 decimals either way.
    let decimals: HashMap<String, u32> = match multicall
        .erc20_decimals(Chain::Ethereum, &targets)
        .await
    {
        Ok(outputs) => outputs
            .into_iter()
            .filter(|o| o.success)
            .filter_map(|o| o.output.map(|d| (o.target, d)))
            .collect(),
        Err(e) => {
            warn!(error = %e, "decimals batch failed; degrading all list entries");
            HashMap::new()
        }
    };

    let mut out = HashMap::new();
    for entry in entries {
        let dec = decimals.get(&entry.address).copied().or_else(|| {
            entry
                .address
                .eq_ignore_ascii_case(NATIVE_SENTINEL)
                .then_some(NATIVE_DECIMALS)
        });
        let amount = match dec {
            Some(d) => scale_up(&entry.balance.to_decimal_string(), d)
                .map(NormalizedAmount::Value)
                .unwrap_or(NormalizedAmount::Unknown),
            None => {
                warn!(address = %entry.address, "no decimals for list entry; marking unknown");
                NormalizedAmount::Unknown
            }
        };
        out.insert(entry.address, amount);
    }
    out
}

/// Rewrite the native-asset sentinel key to its canonical identifier,
/// scaling the amount down by 10^18.
fn rewrite_native(balances: &mut NormalizedBalances) {
    let sentinel = balances
        .keys()
        .find(|k| k.eq_ignore_ascii_case(NATIVE_SENTINEL))
        .cloned();
    let Some(key) = sentinel else { return };
    let Some(amount) = balances.remove(&key) else { return };

    let rescaled = match amount {
        NormalizedAmount::Value(s) => match s.trim().parse::<Decimal>() {
            Ok(d) => {
                let scaled = d / Decimal::from(10u64.pow(NATIVE_DECIMALS));
                NormalizedAmount::Value(scaled.normalize().to_string())
            }
            Err(_) => NormalizedAmount::Unknown,
        },
        NormalizedAmount::Unknown => NormalizedAmount::Unknown,
    };
    balances.insert(NATIVE_ID.to_string(), rescaled);
}

/// `value × 10^decimals` as an exact decimal string. `None` when the value
/// does not parse or the rescale overflows the 96-bit mantissa.
fn scale_up(value: &str, decimals: u32) -> Option<String> {
    if decimals > 19 {
        return None;
    }
    let d: Decimal = value.trim().parse().ok()?;
    let scaled = d.checked_mul(Decimal::from(10u64.pow(decimals)))?;
    // Reject rescales that silently lost precision to rounding.
    scaled.to_f64()?;
    Some(scaled.normalize().to_string())
}

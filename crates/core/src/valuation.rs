//! Per-token valuation and aggregation.
//!
//! Every normalized balance produces exactly one valuation attempt. Attempts
//! never raise: unknown metadata degrades to a zero amount, a missing price
//! degrades to zero USD, and anything unexpected for a single identifier is
//! caught and recorded under an `ERROR` symbol. One bad token must never
//! abort the batch.

use futures::future::join_all;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tracing::{debug, warn};

use tally_common::types::Valuation;
use tally_common::{TallyError, TallyResult};

use crate::classify::{classify, TokenKey};
use crate::metadata::MetadataBook;
use crate::normalize::{NormalizedAmount, NormalizedBalances};
use crate::prices::PriceBook;

/// One token's resolved contribution.
#[derive(Debug, Clone)]
pub struct TokenValuation {
    pub symbol: String,
    pub amount: f64,
    pub usd: f64,
}

/// Value every normalized balance independently, as an unordered bag of
/// tasks joined once. Completion order cannot affect the totals.
pub async fn valuate_tokens(
    balances: &NormalizedBalances,
    metadata: &MetadataBook,
    prices: &PriceBook,
) -> Vec<TokenValuation> {
    let tasks = balances.iter().map(|(identifier, amount)| async move {
        match resolve_token(identifier, amount, metadata, prices) {
            Ok(valuation) => valuation,
            Err(e) => {
                warn!(%identifier, error = %e, "token valuation failed; recording as error");
                TokenValuation {
                    symbol: format!("ERROR {identifier}"),
                    amount: 0.0,
                    usd: 0.0,
                }
            }
        }
    });
    join_all(tasks).await
}

/// Reduce settled per-token results into the final totals. `usd_tvl` is
/// recomputed over the results, never accumulated mid-flight; summation is
/// associative and commutative, so task order is irrelevant.
pub fn aggregate(results: Vec<TokenValuation>) -> Valuation {
    let usd_tvl = results.iter().map(|r| r.usd).sum();
    let mut valuation = Valuation {
        usd_tvl,
        ..Valuation::default()
    };
    for result in results {
        *valuation
            .token_balances
            .entry(result.symbol.clone())
            .or_insert(0.0) += result.amount;
        *valuation
            .usd_token_balances
            .entry(result.symbol)
            .or_insert(0.0) += result.usd;
    }
    valuation
}

fn resolve_token(
    identifier: &str,
    amount: &NormalizedAmount,
    metadata: &MetadataBook,
    prices: &PriceBook,
) -> TallyResult<TokenValuation> {
    match classify(identifier) {
        TokenKey::OnChain { chain, address } => {
            let meta = metadata.get(chain, &address);
            let symbol = meta
                .and_then(|m| m.symbol.clone())
                .unwrap_or_else(|| format!("UNKNOWN ({identifier})"));
            let qty = match (meta.and_then(|m| m.decimals), amount) {
                (Some(decimals), NormalizedAmount::Value(raw)) => scaled_amount(raw, decimals)?,
                _ => {
                    // Assume zero rather than fail: one unresolvable token
                    // must not block the rest of the portfolio.
                    warn!(%symbol, identifier, "token decimals unknown; assuming zero amount");
                    0.0
                }
            };
            let price = prices.address_price(chain, &address).unwrap_or_else(|| {
                debug!(identifier, "no price found; zero USD contribution");
                0.0
            });
            Ok(TokenValuation {
                symbol,
                amount: qty,
                usd: qty * price,
            })
        }
        TokenKey::Generic { id } => {
            let qty = match amount {
                NormalizedAmount::Value(raw) => parse_amount(raw)?,
                NormalizedAmount::Unknown => {
                    warn!(identifier, "amount unknown; assuming zero");
                    0.0
                }
            };
            let price = prices.id_price(&id).unwrap_or_else(|| {
                debug!(identifier, "no price found; zero USD contribution");
                0.0
            });
            Ok(TokenValuation {
                symbol: id,
                amount: qty,
                usd: qty * price,
            })
        }
    }
}

/// `raw / 10^decimals`. Exact decimal math where the mantissa allows,
/// falling back to float division for out-of-range values.
fn scaled_amount(raw: &str, decimals: u32) -> TallyResult<f64> {
    if decimals <= 28 {
        if let Ok(d) = raw.trim().parse::<Decimal>() {
            if let Some(scaled) = d.checked_mul(Decimal::new(1, decimals)) {
                if let Some(f) = scaled.to_f64() {
                    return Ok(f);
                }
            }
        }
    }
    Ok(parse_amount(raw)? / 10f64.powi(decimals as i32))
}

fn parse_amount(raw: &str) -> TallyResult<f64> {
    raw.trim()
        .parse::<f64>()
        .map_err(|_| TallyError::InvalidAmount(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_common::types::TokenMetadata;
    use tally_common::Chain;

    fn meta(chain: Chain, address: &str, symbol: Option<&str>, decimals: Option<u32>) -> MetadataBook {
        let mut book = MetadataBook::default();
        book.insert(
            chain,
            address,
            TokenMetadata {
                symbol: symbol.map(String::from),
                decimals,
            },
        );
        book
    }

    fn balances_of(pairs: &[(&str, NormalizedAmount)]) -> NormalizedBalances {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[tokio::test]
    async fn test_prefixed_token_scaled_and_priced() {
        let metadata = meta(Chain::Polygon, "0xABCDEF", Some("USDC"), Some(6));
        let mut prices = PriceBook::default();
        prices.insert_address(Chain::Polygon, "0xABCDEF", 1.0);
        let balances = balances_of(&[(
            "polygon:0xABCDEF",
            NormalizedAmount::Value("1000000".into()),
        )]);

        let results = valuate_tokens(&balances, &metadata, &prices).await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].symbol, "USDC");
        assert_eq!(results[0].amount, 1.0);
        assert_eq!(results[0].usd, 1.0);
    }

    #[tokio::test]
    async fn test_missing_decimals_assumes_zero_amount() {
        let metadata = meta(Chain::Ethereum, "0xabc", Some("MYST"), None);
        let balances = balances_of(&[("0xabc", NormalizedAmount::Value("1000000".into()))]);

        let results = valuate_tokens(&balances, &metadata, &PriceBook::default()).await;
        assert_eq!(results[0].symbol, "MYST");
        assert_eq!(results[0].amount, 0.0);
        assert_eq!(results[0].usd, 0.0);
    }

    #[tokio::test]
    async fn test_missing_symbol_synthesizes_unknown() {
        let metadata = meta(Chain::Ethereum, "0xabc", None, Some(18));
        let balances =
            balances_of(&[("0xabc", NormalizedAmount::Value("1000000000000000000".into()))]);

        let results = valuate_tokens(&balances, &metadata, &PriceBook::default()).await;
        assert_eq!(results[0].symbol, "UNKNOWN (0xabc)");
        assert_eq!(results[0].amount, 1.0);
    }

    #[tokio::test]
    async fn test_missing_price_keeps_token_amount() {
        let metadata = meta(Chain::Ethereum, "0xabc", Some("LINK"), Some(18));
        let balances =
            balances_of(&[("0xabc", NormalizedAmount::Value("2000000000000000000".into()))]);

        let results = valuate_tokens(&balances, &metadata, &PriceBook::default()).await;
        assert_eq!(results[0].amount, 2.0);
        assert_eq!(results[0].usd, 0.0);
    }

    #[tokio::test]
    async fn test_generic_id_uses_plain_amount() {
        let mut prices = PriceBook::default();
        prices.insert_id("ethereum", 2000.0);
        let balances = balances_of(&[("ethereum", NormalizedAmount::Value("2.5".into()))]);

        let results = valuate_tokens(&balances, &MetadataBook::default(), &prices).await;
        assert_eq!(results[0].symbol, "ethereum");
        assert_eq!(results[0].amount, 2.5);
        assert_eq!(results[0].usd, 5000.0);
    }

    #[tokio::test]
    async fn test_unparseable_amount_isolated_as_error_entry() {
        let mut prices = PriceBook::default();
        prices.insert_id("good-coin", 1.0);
        let balances = balances_of(&[
            ("good-coin", NormalizedAmount::Value("3".into())),
            ("bad-coin", NormalizedAmount::Value("not-a-number".into())),
        ]);

        let results = valuate_tokens(&balances, &MetadataBook::default(), &prices).await;
        let aggregated = aggregate(results);
        assert_eq!(aggregated.usd_token_balances["good-coin"], 3.0);
        assert_eq!(aggregated.usd_token_balances["ERROR bad-coin"], 0.0);
        assert_eq!(aggregated.usd_tvl, 3.0);
    }

    #[tokio::test]
    async fn test_same_symbol_sums_not_overwrites() {
        let mut metadata = MetadataBook::default();
        metadata.insert(
            Chain::Ethereum,
            "0xaaa",
            TokenMetadata {
                symbol: Some("WBTC".into()),
                decimals: Some(8),
            },
        );
        metadata.insert(
            Chain::Bsc,
            "0xbbb",
            TokenMetadata {
                symbol: Some("WBTC".into()),
                decimals: Some(8),
            },
        );
        let mut prices = PriceBook::default();
        prices.insert_address(Chain::Ethereum, "0xaaa", 10.0);
        prices.insert_address(Chain::Bsc, "0xbbb", 10.0);
        let balances = balances_of(&[
            ("0xaaa", NormalizedAmount::Value("100000000".into())),
            ("bsc:0xbbb", NormalizedAmount::Value("200000000".into())),
        ]);

        let results = valuate_tokens(&balances, &metadata, &prices).await;
        let aggregated = aggregate(results);
        assert_eq!(aggregated.token_balances["WBTC"], 3.0);
        assert_eq!(aggregated.usd_token_balances["WBTC"], 30.0);
        assert_eq!(aggregated.usd_tvl, 30.0);
    }

    #[test]
    fn test_tvl_equals_sum_of_contributions() {
        let results = vec![
            TokenValuation {
                symbol: "A".into(),
                amount: 1.0,
                usd: 10.0,
            },
            TokenValuation {
                symbol: "B".into(),
                amount: 2.0,
                usd: 0.5,
            },
        ];
        let aggregated = aggregate(results);
        let sum: f64 = aggregated.usd_token_balances.values().sum();
        assert!((aggregated.usd_tvl - sum).abs() < 1e-9);
        assert_eq!(aggregated.usd_tvl, 10.5);
    }

    #[test]
    fn test_scaled_amount_exact_for_native_magnitudes() {
        assert_eq!(scaled_amount("2500000000000000000", 18).unwrap(), 2.5);
        assert_eq!(scaled_amount("1000000", 6).unwrap(), 1.0);
    }
}

//! tally-core: multi-chain portfolio valuation engine.
//!
//! Pipeline: normalize inputs → bucket identifiers by chain → fetch token
//! metadata and USD prices per bucket (concurrently) → value every token
//! independently → reduce into totals. All network access goes through the
//! [`Multicall`] and [`PriceSource`] collaborator traits; failures degrade
//! per token, never abort the batch.

pub mod classify;
pub mod metadata;
pub mod normalize;
pub mod prices;
pub mod report;
pub mod valuation;

#[cfg(test)]
mod testutil;

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use tally_common::traits::{Multicall, PriceSource};
use tally_common::types::{PriceTimestamp, RawBalances, Valuation};

pub use classify::{classify, ChainBuckets, TokenKey};
pub use valuation::TokenValuation;

/// Options for one valuation run.
#[derive(Debug, Clone)]
pub struct ValuateOptions {
    /// Live prices or a historical Unix timestamp.
    pub timestamp: PriceTimestamp,
    /// Print the per-token USD breakdown after the run.
    pub verbose: bool,
    /// Prices the caller already knows, keyed by generic id; never re-fetched.
    pub known_prices: HashMap<String, f64>,
}

impl Default for ValuateOptions {
    fn default() -> Self {
        Self {
            timestamp: PriceTimestamp::Now,
            verbose: false,
            known_prices: HashMap::new(),
        }
    }
}

/// The valuation engine: holds the two collaborators and runs the pipeline.
pub struct Valuator {
    multicall: Arc<dyn Multicall>,
    prices: Arc<dyn PriceSource>,
}

impl Valuator {
    pub fn new(multicall: Arc<dyn Multicall>, prices: Arc<dyn PriceSource>) -> Self {
        Self { multicall, prices }
    }

    /// Compute the USD value of a portfolio of balances.
    ///
    /// Always returns a result: unresolvable tokens degrade to zero-value
    /// entries (`UNKNOWN (…)` / `ERROR …` symbols) instead of failing.
    pub async fn valuate(&self, balances: RawBalances, opts: &ValuateOptions) -> Valuation {
        let normalized = normalize::normalize(balances, self.multicall.as_ref()).await;
        debug!(tokens = normalized.len(), "normalized balances");

        let buckets = ChainBuckets::from_keys(normalized.keys());
        let (metadata, price_book) = tokio::join!(
            metadata::fetch_metadata(self.multicall.as_ref(), &buckets),
            prices::fetch_prices(
                self.prices.as_ref(),
                &buckets,
                opts.timestamp,
                &opts.known_prices
            ),
        );

        let results = valuation::valuate_tokens(&normalized, &metadata, &price_book).await;
        if opts.verbose {
            report::print_breakdown(&results);
        }
        valuation::aggregate(results)
    }
}

//! On-chain token metadata fetching.
//!
//! For every non-empty chain bucket, two batched calls, `symbol` and
//! `decimals`, run concurrently with each other and with the other chains.
//! Only calls the collaborator reports successful land in the book; an
//! absent address means "unknown token" downstream.

use std::collections::HashMap;

use futures::future::join_all;
use tracing::warn;

use tally_common::traits::{CallOutput, Multicall};
use tally_common::types::TokenMetadata;
use tally_common::Chain;

use crate::classify::ChainBuckets;

/// Metadata keyed by `(chain, address)`, exact address match.
#[derive(Debug, Default)]
pub struct MetadataBook {
    inner: HashMap<(Chain, String), TokenMetadata>,
}

impl MetadataBook {
    pub fn get(&self, chain: Chain, address: &str) -> Option<&TokenMetadata> {
        self.inner.get(&(chain, address.to_string()))
    }

    #[cfg(test)]
    pub fn insert(&mut self, chain: Chain, address: &str, metadata: TokenMetadata) {
        self.inner.insert((chain, address.to_string()), metadata);
    }
}

/// Fetch symbol + decimals for every bucketed address. Empty buckets are
/// skipped without a network round trip; a failed batch leaves its chain's
/// tokens unknown rather than failing the valuation.
pub async fn fetch_metadata(multicall: &dyn Multicall, buckets: &ChainBuckets) -> MetadataBook {
    let per_chain = Chain::ALL.into_iter().map(|chain| {
        let addresses = buckets.addresses(chain);
        async move {
            let mut fields: HashMap<String, TokenMetadata> = HashMap::new();
            if addresses.is_empty() {
                return (chain, fields);
            }
            let (symbols, decimals) = tokio::join!(
                multicall.erc20_symbols(chain, addresses),
                multicall.erc20_decimals(chain, addresses),
            );
            match symbols {
                Ok(outputs) => {
                    for (target, symbol) in successes(outputs) {
                        fields.entry(target).or_default().symbol = Some(symbol);
                    }
                }
                Err(e) => warn!(%chain, error = %e, "symbol batch failed"),
            }
            match decimals {
                Ok(outputs) => {
                    for (target, dec) in successes(outputs) {
                        fields.entry(target).or_default().decimals = Some(dec);
                    }
                }
                Err(e) => warn!(%chain, error = %e, "decimals batch failed"),
            }
            (chain, fields)
        }
    });

    let mut book = MetadataBook::default();
    for (chain, fields) in join_all(per_chain).await {
        for (address, metadata) in fields {
            book.inner.insert((chain, address), metadata);
        }
    }
    book
}

fn successes<T>(outputs: Vec<CallOutput<T>>) -> impl Iterator<Item = (String, T)> {
    outputs
        .into_iter()
        .filter(|o| o.success)
        .filter_map(|o| o.output.map(|v| (o.target, v)))
}

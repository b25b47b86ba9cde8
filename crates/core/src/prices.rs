//! Price fetching orchestration.
//!
//! One fetch per non-empty chain bucket plus one for the generic ids, all
//! concurrent. The price collaborator owns retries and throttling; this pass
//! only routes buckets and folds results. A failed bucket is an unpriced
//! bucket, never a fatal error.

use std::collections::HashMap;

use futures::future::join_all;
use tracing::warn;

use tally_common::traits::PriceSource;
use tally_common::types::PriceTimestamp;
use tally_common::Chain;

use crate::classify::ChainBuckets;

/// USD prices keyed lower-case: per-chain by address, generic by id.
#[derive(Debug, Default)]
pub struct PriceBook {
    by_chain: HashMap<Chain, HashMap<String, f64>>,
    generic: HashMap<String, f64>,
}

impl PriceBook {
    pub fn address_price(&self, chain: Chain, address: &str) -> Option<f64> {
        self.by_chain
            .get(&chain)?
            .get(&address.to_lowercase())
            .copied()
    }

    pub fn id_price(&self, id: &str) -> Option<f64> {
        self.generic.get(&id.to_lowercase()).copied()
    }

    #[cfg(test)]
    pub fn insert_id(&mut self, id: &str, price: f64) {
        self.generic.insert(id.to_lowercase(), price);
    }

    #[cfg(test)]
    pub fn insert_address(&mut self, chain: Chain, address: &str, price: f64) {
        self.by_chain
            .entry(chain)
            .or_default()
            .insert(address.to_lowercase(), price);
    }
}

/// Fetch USD prices for every bucket at the requested timestamp. Ids already
/// present in `known` are not re-fetched.
pub async fn fetch_prices(
    source: &dyn PriceSource,
    buckets: &ChainBuckets,
    at: PriceTimestamp,
    known: &HashMap<String, f64>,
) -> PriceBook {
    let per_chain = Chain::ALL.into_iter().map(|chain| {
        let addresses = buckets.addresses(chain);
        async move {
            if addresses.is_empty() {
                return (chain, HashMap::new());
            }
            match source.address_prices(chain, addresses, at).await {
                Ok(prices) => (chain, lowercase_keys(prices)),
                Err(e) => {
                    warn!(%chain, error = %e, "price fetch failed; bucket left unpriced");
                    (chain, HashMap::new())
                }
            }
        }
    });

    let generic = async {
        let mut prices: HashMap<String, f64> =
            known.iter().map(|(k, v)| (k.to_lowercase(), *v)).collect();
        let pending: Vec<String> = buckets
            .generic
            .iter()
            .filter(|id| !prices.contains_key(&id.to_lowercase()))
            .cloned()
            .collect();
        if !pending.is_empty() {
            match source.id_prices(&pending, at).await {
                Ok(fetched) => prices.extend(lowercase_keys(fetched)),
                Err(e) => warn!(error = %e, "generic price fetch failed; ids left unpriced"),
            }
        }
        prices
    };

    let (by_chain, generic) = tokio::join!(join_all(per_chain), generic);
    PriceBook {
        by_chain: by_chain.into_iter().collect(),
        generic,
    }
}

fn lowercase_keys(map: HashMap<String, f64>) -> HashMap<String, f64> {
    map.into_iter().map(|(k, v)| (k.to_lowercase(), v)).collect()
}

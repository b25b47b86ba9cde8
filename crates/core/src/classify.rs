//! Identifier classification.
//!
//! One total function decides where every balance key belongs. The same
//! function drives bucket construction and per-token resolution, so the two
//! can never disagree.

use std::collections::HashMap;

use tally_common::Chain;

/// Where an identifier routes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKey {
    /// A contract address on a supported chain (prefix stripped).
    OnChain { chain: Chain, address: String },
    /// A free-form id destined for the generic price lookup.
    Generic { id: String },
}

/// Classify a balance identifier. Total: every input lands in exactly one
/// bucket, unknown prefixes fall through to the generic bucket.
pub fn classify(identifier: &str) -> TokenKey {
    if let Some((prefix, address)) = identifier.split_once(':') {
        if let Some(chain) = Chain::from_prefix(prefix) {
            return TokenKey::OnChain {
                chain,
                address: address.to_string(),
            };
        }
        return TokenKey::Generic {
            id: identifier.to_string(),
        };
    }
    if identifier.starts_with("0x") {
        return TokenKey::OnChain {
            chain: Chain::Ethereum,
            address: identifier.to_string(),
        };
    }
    TokenKey::Generic {
        id: identifier.to_string(),
    }
}

/// Identifiers partitioned into per-chain address lists plus the generic
/// id list.
#[derive(Debug, Default)]
pub struct ChainBuckets {
    per_chain: HashMap<Chain, Vec<String>>,
    pub generic: Vec<String>,
}

impl ChainBuckets {
    pub fn from_keys<'a>(keys: impl Iterator<Item = &'a String>) -> Self {
        let mut buckets = ChainBuckets::default();
        for key in keys {
            match classify(key) {
                TokenKey::OnChain { chain, address } => {
                    buckets.per_chain.entry(chain).or_default().push(address);
                }
                TokenKey::Generic { id } => buckets.generic.push(id),
            }
        }
        buckets
    }

    /// Addresses bucketed for one chain (empty when none).
    pub fn addresses(&self, chain: Chain) -> &[String] {
        self.per_chain.get(&chain).map(Vec::as_slice).unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_address_routes_to_default_chain() {
        assert_eq!(
            classify("0xdeadbeef"),
            TokenKey::OnChain {
                chain: Chain::Ethereum,
                address: "0xdeadbeef".into()
            }
        );
    }

    #[test]
    fn test_prefixed_address_strips_prefix() {
        assert_eq!(
            classify("polygon:0xABCDEF"),
            TokenKey::OnChain {
                chain: Chain::Polygon,
                address: "0xABCDEF".into()
            }
        );
        assert_eq!(
            classify("bsc:0x1234"),
            TokenKey::OnChain {
                chain: Chain::Bsc,
                address: "0x1234".into()
            }
        );
        assert_eq!(
            classify("avax:0x1234"),
            TokenKey::OnChain {
                chain: Chain::Avax,
                address: "0x1234".into()
            }
        );
    }

    #[test]
    fn test_unknown_prefix_falls_through_to_generic() {
        assert_eq!(
            classify("fantom:0x1234"),
            TokenKey::Generic {
                id: "fantom:0x1234".into()
            }
        );
    }

    #[test]
    fn test_free_form_id_is_generic() {
        assert_eq!(
            classify("ethereum"),
            TokenKey::Generic {
                id: "ethereum".into()
            }
        );
        assert_eq!(
            classify("staked-ether"),
            TokenKey::Generic {
                id: "staked-ether".into()
            }
        );
    }

    #[test]
    fn test_buckets_partition_every_key_once() {
        let keys = vec![
            "0xaa".to_string(),
            "bsc:0xbb".to_string(),
            "polygon:0xcc".to_string(),
            "avax:0xdd".to_string(),
            "some-coin".to_string(),
            "fantom:0xee".to_string(),
        ];
        let buckets = ChainBuckets::from_keys(keys.iter());
        assert_eq!(buckets.addresses(Chain::Ethereum), ["0xaa"]);
        assert_eq!(buckets.addresses(Chain::Bsc), ["0xbb"]);
        assert_eq!(buckets.addresses(Chain::Polygon), ["0xcc"]);
        assert_eq!(buckets.addresses(Chain::Avax), ["0xdd"]);
        assert_eq!(buckets.generic, ["some-coin", "fantom:0xee"]);
    }
}

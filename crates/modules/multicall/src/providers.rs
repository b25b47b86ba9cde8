//! Chain → RPC endpoint registry.
//!
//! Seeded with each chain's public default, overridable per process via
//! `TALLY_RPC_<CHAIN>` env vars or [`ProviderRegistry::set`].

use std::collections::HashMap;
use std::sync::RwLock;

use tracing::warn;
use url::Url;

use tally_common::Chain;

pub struct ProviderRegistry {
    urls: RwLock<HashMap<Chain, Url>>,
}

impl ProviderRegistry {
    /// Build a registry with defaults plus env overrides applied.
    pub fn new() -> Self {
        let mut urls = HashMap::new();
        for chain in Chain::ALL {
            let env_key = format!("TALLY_RPC_{}", chain.to_string().to_uppercase());
            let candidate = std::env::var(&env_key)
                .ok()
                .unwrap_or_else(|| chain.default_rpc().to_string());
            match candidate.parse::<Url>() {
                Ok(url) => {
                    urls.insert(chain, url);
                }
                Err(e) => {
                    warn!(%chain, error = %e, "invalid RPC override; keeping default");
                    if let Ok(url) = chain.default_rpc().parse::<Url>() {
                        urls.insert(chain, url);
                    }
                }
            }
        }
        Self {
            urls: RwLock::new(urls),
        }
    }

    /// RPC endpoint for a chain. Absent only if an override clobbered the
    /// default with garbage, which `new` already guards against.
    pub fn get(&self, chain: Chain) -> Option<Url> {
        self.urls
            .read()
            .map(|urls| urls.get(&chain).cloned())
            .unwrap_or(None)
    }

    /// Endpoint lookup by chain name (`"bsc"`, `"polygon"`, …); unknown
    /// names yield `None` rather than an error.
    pub fn get_named(&self, name: &str) -> Option<Url> {
        name.parse::<Chain>().ok().and_then(|c| self.get(c))
    }

    /// Register or replace a chain's endpoint.
    pub fn set(&self, chain: Chain, url: Url) {
        if let Ok(mut urls) = self.urls.write() {
            urls.insert(chain, url);
        }
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_cover_every_chain() {
        let registry = ProviderRegistry::new();
        for chain in Chain::ALL {
            assert!(registry.get(chain).is_some(), "missing default for {chain}");
        }
    }

    #[test]
    fn test_set_overrides_default() {
        let registry = ProviderRegistry::new();
        let custom: Url = "http://localhost:8545".parse().unwrap();
        registry.set(Chain::Bsc, custom.clone());
        assert_eq!(registry.get(Chain::Bsc), Some(custom));
    }

    #[test]
    fn test_named_lookup() {
        let registry = ProviderRegistry::new();
        assert!(registry.get_named("polygon").is_some());
        assert!(registry.get_named("fantom").is_none());
    }
}

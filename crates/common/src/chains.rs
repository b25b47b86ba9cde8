//! Supported chain table.
//!
//! One table drives everything chain-specific: identifier prefixes, the
//! CoinGecko asset platform, and default RPC endpoints. Call sites iterate
//! [`Chain::ALL`] instead of hard-coding chain lists.

use serde::{Deserialize, Serialize};

/// Chain identifier: the fixed set of networks supported for valuation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Chain {
    Ethereum,
    Bsc,
    Polygon,
    Avax,
}

impl Chain {
    /// Every supported chain, default chain first.
    pub const ALL: [Chain; 4] = [Chain::Ethereum, Chain::Bsc, Chain::Polygon, Chain::Avax];

    /// Identifier prefix (`"bsc:"` etc.). The default chain has none;
    /// its tokens are bare addresses.
    pub fn prefix(self) -> Option<&'static str> {
        match self {
            Chain::Ethereum => None,
            Chain::Bsc => Some("bsc"),
            Chain::Polygon => Some("polygon"),
            Chain::Avax => Some("avax"),
        }
    }

    /// Resolve a chain from an identifier prefix.
    pub fn from_prefix(prefix: &str) -> Option<Chain> {
        Chain::ALL.iter().copied().find(|c| c.prefix() == Some(prefix))
    }

    /// True for the chain bare `0x…` identifiers route to.
    pub fn is_default(self) -> bool {
        matches!(self, Chain::Ethereum)
    }

    /// CoinGecko asset platform id for contract-address price lookups.
    pub fn coingecko_platform(self) -> &'static str {
        match self {
            Chain::Ethereum => "ethereum",
            Chain::Bsc => "binance-smart-chain",
            Chain::Polygon => "polygon-pos",
            Chain::Avax => "avalanche",
        }
    }

    /// Public RPC endpoint used when no override is registered.
    pub fn default_rpc(self) -> &'static str {
        match self {
            Chain::Ethereum => "https://eth.llamarpc.com",
            Chain::Bsc => "https://bsc-dataseed.binance.org",
            Chain::Polygon => "https://polygon-rpc.com",
            Chain::Avax => "https://api.avax.network/ext/bc/C/rpc",
        }
    }
}

impl std::fmt::Display for Chain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Chain::Ethereum => write!(f, "ethereum"),
            Chain::Bsc => write!(f, "bsc"),
            Chain::Polygon => write!(f, "polygon"),
            Chain::Avax => write!(f, "avax"),
        }
    }
}

impl std::str::FromStr for Chain {
    type Err = crate::error::TallyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ethereum" | "eth" => Ok(Chain::Ethereum),
            "bsc" => Ok(Chain::Bsc),
            "polygon" => Ok(Chain::Polygon),
            "avax" | "avalanche" => Ok(Chain::Avax),
            other => Err(crate::error::TallyError::Config(format!(
                "unknown chain: {other}"
            ))),
        }
    }
}

//! Mock collaborators for engine tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use tally_common::traits::{CallOutput, Multicall, PriceSource};
use tally_common::types::PriceTimestamp;
use tally_common::{Chain, TallyError, TallyResult};

/// In-memory multicall: configured (chain, address) pairs succeed, anything
/// else reports `success = false`. `failing()` makes whole batches error.
#[derive(Default)]
pub struct MockMulticall {
    symbols: HashMap<(Chain, String), String>,
    decimals: HashMap<(Chain, String), u32>,
    fail: bool,
    calls: AtomicUsize,
}

impl MockMulticall {
    pub fn with_symbol(mut self, chain: Chain, address: &str, symbol: &str) -> Self {
        self.symbols
            .insert((chain, address.to_string()), symbol.to_string());
        self
    }

    pub fn with_decimals(mut self, chain: Chain, address: &str, decimals: u32) -> Self {
        self.decimals.insert((chain, address.to_string()), decimals);
        self
    }

    pub fn with_token(self, chain: Chain, address: &str, symbol: &str, decimals: u32) -> Self {
        self.with_symbol(chain, address, symbol)
            .with_decimals(chain, address, decimals)
    }

    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    pub fn calls_made(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn lookup<T: Clone>(
        &self,
        map: &HashMap<(Chain, String), T>,
        chain: Chain,
        targets: &[String],
    ) -> TallyResult<Vec<CallOutput<T>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(TallyError::Rpc {
                chain: chain.to_string(),
                message: "mock failure".into(),
            });
        }
        Ok(targets
            .iter()
            .map(|target| {
                let output = map.get(&(chain, target.clone())).cloned();
                CallOutput {
                    target: target.clone(),
                    success: output.is_some(),
                    output,
                }
            })
            .collect())
    }
}

#[async_trait]
impl Multicall for MockMulticall {
    async fn erc20_symbols(
        &self,
        chain: Chain,
        targets: &[String],
    ) -> TallyResult<Vec<CallOutput<String>>> {
        self.lookup(&self.symbols, chain, targets)
    }

    async fn erc20_decimals(
        &self,
        chain: Chain,
        targets: &[String],
    ) -> TallyResult<Vec<CallOutput<u32>>> {
        self.lookup(&self.decimals, chain, targets)
    }
}

/// In-memory price source keyed the way the real client keys its responses
/// (lower-case).
#[derive(Default)]
pub struct MockPrices {
    by_address: HashMap<(Chain, String), f64>,
    by_id: HashMap<String, f64>,
    fail: bool,
}

impl MockPrices {
    pub fn with_address(mut self, chain: Chain, address: &str, usd: f64) -> Self {
        self.by_address
            .insert((chain, address.to_lowercase()), usd);
        self
    }

    pub fn with_id(mut self, id: &str, usd: f64) -> Self {
        self.by_id.insert(id.to_lowercase(), usd);
        self
    }

    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }
}

#[async_trait]
impl PriceSource for MockPrices {
    async fn address_prices(
        &self,
        chain: Chain,
        addresses: &[String],
        _at: PriceTimestamp,
    ) -> TallyResult<HashMap<String, f64>> {
        if self.fail {
            return Err(TallyError::Price("mock failure".into()));
        }
        Ok(addresses
            .iter()
            .filter_map(|addr| {
                self.by_address
                    .get(&(chain, addr.to_lowercase()))
                    .map(|usd| (addr.to_lowercase(), *usd))
            })
            .collect())
    }

    async fn id_prices(
        &self,
        ids: &[String],
        _at: PriceTimestamp,
    ) -> TallyResult<HashMap<String, f64>> {
        if self.fail {
            return Err(TallyError::Price("mock failure".into()));
        }
        Ok(ids
            .iter()
            .filter_map(|id| {
                self.by_id
                    .get(&id.to_lowercase())
                    .map(|usd| (id.to_lowercase(), *usd))
            })
            .collect())
    }
}

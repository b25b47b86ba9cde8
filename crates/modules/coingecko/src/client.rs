//! CoinGecko price source.
//!
//! Current prices go through the batched `simple` endpoints; historical
//! prices use per-asset `market_chart/range` queries around the requested
//! instant, taking the sample closest to it. Requests are throttled with a
//! small semaphore and retried with exponential backoff on 429.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use tally_common::traits::PriceSource;
use tally_common::types::PriceTimestamp;
use tally_common::{Chain, TallyError, TallyResult};

/// Samples within this many seconds of the requested instant are eligible
/// when resolving a historical price.
const HISTORY_WINDOW_SECS: u64 = 4 * 3600;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoinGeckoTier {
    Demo,
    Pro,
}

impl CoinGeckoTier {
    fn base_url(&self) -> &'static str {
        match self {
            Self::Demo => "https://api.coingecko.com/api/v3",
            Self::Pro => "https://pro-api.coingecko.com/api/v3",
        }
    }

    fn auth_header(&self) -> &'static str {
        match self {
            Self::Demo => "x-cg-demo-api-key",
            Self::Pro => "x-cg-pro-api-key",
        }
    }
}

#[derive(Debug, Deserialize)]
struct UsdPrice {
    usd: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct MarketChartData {
    prices: Vec<[f64; 2]>,
}

pub struct CoinGeckoClient {
    http: reqwest::Client,
    api_key: Option<String>,
    tier: CoinGeckoTier,
    throttle: Semaphore,
    max_retries: u32,
}

impl CoinGeckoClient {
    pub fn new(api_key: Option<String>, tier: CoinGeckoTier) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");
        Self {
            http,
            api_key,
            tier,
            throttle: Semaphore::new(4),
            max_retries: 3,
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_concurrency(mut self, permits: usize) -> Self {
        self.throttle = Semaphore::new(permits);
        self
    }

    async fn get<T: DeserializeOwned>(&self, path_and_query: &str) -> TallyResult<T> {
        let _permit = self
            .throttle
            .acquire()
            .await
            .map_err(|e| TallyError::Other(format!("price throttle closed: {e}")))?;

        let url = format!("{}{}", self.tier.base_url(), path_and_query);
        let mut retries = 0u32;

        loop {
            let mut request = self.http.get(&url);
            if let Some(key) = &self.api_key {
                request = request.header(self.tier.auth_header(), key);
            }

            let response = request
                .send()
                .await
                .map_err(|e| TallyError::Network(format!("coingecko request: {e}")))?;

            let status = response.status();
            if status == reqwest::StatusCode::TOO_MANY_REQUESTS && retries < self.max_retries {
                retries += 1;
                let backoff = Duration::from_millis(1000 * 2u64.pow(retries - 1));
                warn!(attempt = retries, ?backoff, "coingecko rate limited, backing off");
                tokio::time::sleep(backoff).await;
                continue;
            }

            if !status.is_success() {
                return Err(TallyError::Price(format!(
                    "coingecko returned HTTP {status} for {path_and_query}"
                )));
            }

            return response
                .json::<T>()
                .await
                .map_err(|e| TallyError::Decode(format!("coingecko body: {e}")));
        }
    }

    async fn range_price(&self, path: &str, at: u64) -> TallyResult<Option<f64>> {
        let from = at.saturating_sub(HISTORY_WINDOW_SECS);
        let to = at + HISTORY_WINDOW_SECS;
        let query = format!("{path}?vs_currency=usd&from={from}&to={to}");
        let chart: MarketChartData = self.get(&query).await?;
        Ok(nearest_price(&chart.prices, at as f64 * 1000.0))
    }
}

/// Pick the chart sample closest to `target_ms`, if any.
fn nearest_price(prices: &[[f64; 2]], target_ms: f64) -> Option<f64> {
    prices
        .iter()
        .min_by(|a, b| {
            (a[0] - target_ms)
                .abs()
                .total_cmp(&(b[0] - target_ms).abs())
        })
        .map(|sample| sample[1])
}

#[async_trait]
impl PriceSource for CoinGeckoClient {
    async fn address_prices(
        &self,
        chain: Chain,
        addresses: &[String],
        at: PriceTimestamp,
    ) -> TallyResult<HashMap<String, f64>> {
        if addresses.is_empty() {
            return Ok(HashMap::new());
        }
        let platform = chain.coingecko_platform();

        match at {
            PriceTimestamp::Now => {
                let joined = addresses
                    .iter()
                    .map(|a| a.to_lowercase())
                    .collect::<Vec<_>>()
                    .join(",");
                let query = format!(
                    "/simple/token_price/{platform}?contract_addresses={joined}&vs_currencies=usd"
                );
                let raw: HashMap<String, UsdPrice> = self.get(&query).await?;
                debug!(%chain, requested = addresses.len(), priced = raw.len(), "token prices");
                Ok(raw
                    .into_iter()
                    .filter_map(|(addr, p)| p.usd.map(|usd| (addr.to_lowercase(), usd)))
                    .collect())
            }
            PriceTimestamp::At(ts) => {
                let lookups = addresses.iter().map(|addr| async move {
                    let path = format!(
                        "/coins/{platform}/contract/{}/market_chart/range",
                        addr.to_lowercase()
                    );
                    (addr.to_lowercase(), self.range_price(&path, ts).await)
                });
                let mut prices = HashMap::new();
                for (addr, result) in join_all(lookups).await {
                    match result {
                        Ok(Some(usd)) => {
                            prices.insert(addr, usd);
                        }
                        Ok(None) => {}
                        Err(e) => warn!(%addr, error = %e, "historical token price failed"),
                    }
                }
                Ok(prices)
            }
        }
    }

    async fn id_prices(
        &self,
        ids: &[String],
        at: PriceTimestamp,
    ) -> TallyResult<HashMap<String, f64>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        match at {
            PriceTimestamp::Now => {
                let joined = ids
                    .iter()
                    .map(|id| id.to_lowercase())
                    .collect::<Vec<_>>()
                    .join(",");
                let query = format!("/simple/price?ids={joined}&vs_currencies=usd");
                let raw: HashMap<String, UsdPrice> = self.get(&query).await?;
                Ok(raw
                    .into_iter()
                    .filter_map(|(id, p)| p.usd.map(|usd| (id.to_lowercase(), usd)))
                    .collect())
            }
            PriceTimestamp::At(ts) => {
                let lookups = ids.iter().map(|id| async move {
                    let path = format!("/coins/{}/market_chart/range", id.to_lowercase());
                    (id.to_lowercase(), self.range_price(&path, ts).await)
                });
                let mut prices = HashMap::new();
                for (id, result) in join_all(lookups).await {
                    match result {
                        Ok(Some(usd)) => {
                            prices.insert(id, usd);
                        }
                        Ok(None) => {}
                        Err(e) => warn!(%id, error = %e, "historical id price failed"),
                    }
                }
                Ok(prices)
            }
        }
    }
}

//! Collaborator traits: the seams between the valuation engine and the
//! outside world.
//!
//! The engine never speaks a wire protocol itself; it consumes these two
//! traits. Concrete implementations live in the module crates, mocks live
//! in the core crate's tests.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::chains::Chain;
use crate::error::TallyResult;
use crate::types::PriceTimestamp;

/// One call's outcome inside a batched read. `success` mirrors the per-call
/// flag reported by the batching contract; consumers keep successful calls
/// only and treat absence as the failure signal.
#[derive(Debug, Clone)]
pub struct CallOutput<T> {
    pub target: String,
    pub success: bool,
    pub output: Option<T>,
}

/// Batched read-only contract access: many calls, one round trip.
#[async_trait]
pub trait Multicall: Send + Sync {
    /// `symbol()` for every target, one batch per chain.
    async fn erc20_symbols(
        &self,
        chain: Chain,
        targets: &[String],
    ) -> TallyResult<Vec<CallOutput<String>>>;

    /// `decimals()` for every target, one batch per chain.
    async fn erc20_decimals(
        &self,
        chain: Chain,
        targets: &[String],
    ) -> TallyResult<Vec<CallOutput<u32>>>;
}

/// USD price lookups. Implementations own their retry policy and any
/// request throttling; the engine only passes buckets through.
///
/// Returned maps are keyed lower-case.
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Prices for contract addresses on one chain.
    async fn address_prices(
        &self,
        chain: Chain,
        addresses: &[String],
        at: PriceTimestamp,
    ) -> TallyResult<HashMap<String, f64>>;

    /// Prices for free-form ids (pricing-service slugs).
    async fn id_prices(
        &self,
        ids: &[String],
        at: PriceTimestamp,
    ) -> TallyResult<HashMap<String, f64>>;
}

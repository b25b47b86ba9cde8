//! Batched ERC-20 metadata reads through the Multicall3 aggregator.
//!
//! Every chain we support carries the canonical Multicall3 deployment at the
//! same address, so one `eth_call` per chain answers symbol/decimals for an
//! arbitrary set of tokens. Individual sub-calls are allowed to fail without
//! poisoning the batch.

use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::Address;
use alloy::sol;
use alloy::sol_types::SolCall;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use tally_common::constants::MULTICALL3_ADDRESS;
use tally_common::traits::{CallOutput, Multicall};
use tally_common::{Chain, TallyError, TallyResult};

use crate::providers::ProviderRegistry;

sol! {
    struct Call3 {
        address target;
        bool allowFailure;
        bytes callData;
    }

    struct Result3 {
        bool success;
        bytes returnData;
    }

    function aggregate3(Call3[] calldata calls) external payable returns (Result3[] memory returnData);

    interface IERC20 {
        function symbol() external view returns (string);
        function decimals() external view returns (uint8);
    }
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    result: Option<String>,
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

pub struct MulticallClient {
    http: reqwest::Client,
    providers: Arc<ProviderRegistry>,
}

impl MulticallClient {
    pub fn new(providers: Arc<ProviderRegistry>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");
        Self { http, providers }
    }

    /// Issue one aggregate3 call against `chain` with the same `calldata`
    /// sent to every target, then decode each sub-result with `decode`.
    ///
    /// Targets that do not parse as addresses are reported as failed slots
    /// without touching the network; positions always line up with `targets`.
    async fn batch_read<T, F>(
        &self,
        chain: Chain,
        targets: &[String],
        calldata: Vec<u8>,
        decode: F,
    ) -> TallyResult<Vec<CallOutput<T>>>
    where
        F: Fn(&[u8]) -> Option<T>,
    {
        let parsed: Vec<Option<Address>> = targets
            .iter()
            .map(|t| t.parse::<Address>().ok())
            .collect();

        let calls: Vec<Call3> = parsed
            .iter()
            .flatten()
            .map(|addr| Call3 {
                target: *addr,
                allowFailure: true,
                callData: calldata.clone().into(),
            })
            .collect();

        let mut outputs: Vec<CallOutput<T>> = targets
            .iter()
            .map(|t| CallOutput {
                target: t.clone(),
                success: false,
                output: None,
            })
            .collect();

        if calls.is_empty() {
            return Ok(outputs);
        }

        let data = aggregate3Call { calls }.abi_encode();
        let raw = self.eth_call(chain, &data).await?;
        let results = aggregate3Call::abi_decode_returns(&raw).map_err(|e| {
            TallyError::Decode(format!("aggregate3 return data on {chain}: {e}"))
        })?;

        let mut results = results.into_iter();
        for (slot, addr) in outputs.iter_mut().zip(parsed.iter()) {
            if addr.is_none() {
                continue;
            }
            let Some(result) = results.next() else { break };
            if result.success {
                slot.output = decode(&result.returnData);
                slot.success = slot.output.is_some();
            }
        }

        Ok(outputs)
    }

    async fn eth_call(&self, chain: Chain, calldata: &[u8]) -> TallyResult<Vec<u8>> {
        let url = self.providers.get(chain).ok_or_else(|| TallyError::Rpc {
            chain: chain.to_string(),
            message: "no RPC endpoint configured".to_string(),
        })?;

        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "eth_call",
            "params": [
                {
                    "to": MULTICALL3_ADDRESS,
                    "data": format!("0x{}", hex::encode(calldata)),
                },
                "latest"
            ],
        });

        debug!(%chain, bytes = calldata.len(), "eth_call multicall3");

        let response = self
            .http
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(|e| TallyError::Network(format!("eth_call on {chain}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TallyError::Rpc {
                chain: chain.to_string(),
                message: format!("HTTP {status}"),
            });
        }

        let rpc: JsonRpcResponse = response
            .json()
            .await
            .map_err(|e| TallyError::Decode(format!("JSON-RPC body on {chain}: {e}")))?;

        if let Some(err) = rpc.error {
            return Err(TallyError::Rpc {
                chain: chain.to_string(),
                message: format!("{} (code {})", err.message, err.code),
            });
        }

        let result = rpc.result.ok_or_else(|| TallyError::Rpc {
            chain: chain.to_string(),
            message: "response carried neither result nor error".to_string(),
        })?;

        hex::decode(result.trim_start_matches("0x"))
            .map_err(|e| TallyError::Decode(format!("result hex on {chain}: {e}")))
    }
}

fn decode_symbol(data: &[u8]) -> Option<String> {
    IERC20::symbolCall::abi_decode_returns(data).ok()
}

fn decode_decimals(data: &[u8]) -> Option<u32> {
    IERC20::decimalsCall::abi_decode_returns(data)
        .ok()
        .map(u32::from)
}

#[async_trait]
impl Multicall for MulticallClient {
    async fn erc20_symbols(
        &self,
        chain: Chain,
        targets: &[String],
    ) -> TallyResult<Vec<CallOutput<String>>> {
        let calldata = IERC20::symbolCall {}.abi_encode();
        self.batch_read(chain, targets, calldata, decode_symbol)
            .await
    }

    async fn erc20_decimals(
        &self,
        chain: Chain,
        targets: &[String],
    ) -> TallyResult<Vec<CallOutput<u32>>> {
        let calldata = IERC20::decimalsCall {}.abi_encode();
        self.batch_read(chain, targets, calldata, decode_decimals)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::sol_types::SolValue;

    #[test]
    fn test_selectors() {
        assert_eq!(&IERC20::symbolCall {}.abi_encode()[..4], [0x95, 0xd8, 0x9b, 0x41]);
        assert_eq!(
            &IERC20::decimalsCall {}.abi_encode()[..4],
            [0x31, 0x3c, 0xe5, 0x67]
        );
        let agg = aggregate3Call { calls: vec![] }.abi_encode();
        assert_eq!(&agg[..4], [0x82, 0xad, 0x56, 0xcb]);
    }

    #[test]
    fn test_decode_decimals() {
        let mut blob = vec![0u8; 32];
        blob[31] = 18;
        assert_eq!(decode_decimals(&blob), Some(18));
        assert_eq!(decode_decimals(&[]), None);
    }

    #[test]
    fn test_decode_symbol() {
        let encoded = String::from("USDC").abi_encode();
        assert_eq!(decode_symbol(&encoded), Some("USDC".to_string()));
        assert_eq!(decode_symbol(&[0xde, 0xad]), None);
    }

    #[tokio::test]
    async fn test_invalid_targets_skip_network() {
        // Registry pointed at nothing reachable; invalid addresses must
        // never trigger an RPC round-trip.
        let registry = Arc::new(ProviderRegistry::new());
        let client = MulticallClient::new(registry);
        let targets = vec!["not-an-address".to_string(), "0x123".to_string()];
        let out = client
            .erc20_symbols(Chain::Ethereum, &targets)
            .await
            .unwrap();
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|o| !o.success && o.output.is_none()));
    }
}

//! alloy Provider backed ChainReader
//!
//! Batched reads go through Multicall3 `aggregate3` with `allowFailure: true`
//! so one failing sub-call (a pair that was never deployed, a token without
//! `symbol()`) does not fail the whole batch.

use super::{ChainReader, ReadCall};
use crate::contracts::IMulticall3;
use crate::error::{EngineError, Result};
use crate::registry::MULTICALL3_ADDRESS;
use alloy::primitives::{Address, Bytes};
use alloy::providers::Provider;
use alloy::rpc::types::{TransactionInput, TransactionRequest};
use alloy::sol_types::{Panic, Revert, SolCall, SolError};
use async_trait::async_trait;
use tracing::debug;

/// ChainReader over any alloy provider
pub struct RpcChainReader<P> {
    provider: P,
    chain_id: u64,
    multicall_address: Address,
}

impl<P: Provider + 'static> RpcChainReader<P> {
    pub fn new(provider: P, chain_id: u64) -> Self {
        Self {
            provider,
            chain_id,
            multicall_address: MULTICALL3_ADDRESS,
        }
    }

    pub fn with_multicall(mut self, multicall_address: Address) -> Self {
        self.multicall_address = multicall_address;
        self
    }
}

/// Build Multicall3 `aggregate3` calldata from a list of sub-calls.
///
/// Each sub-call is wrapped as (target, allowFailure: true, callData).
fn build_aggregate3_calldata(calls: &[ReadCall]) -> Bytes {
    let calls = calls
        .iter()
        .map(|call| IMulticall3::Call3 {
            target: call.target,
            allowFailure: true,
            callData: call.call_data.clone(),
        })
        .collect();
    IMulticall3::aggregate3Call { calls }.abi_encode().into()
}

#[async_trait]
impl<P: Provider + 'static> ChainReader for RpcChainReader<P> {
    fn chain_id(&self) -> u64 {
        self.chain_id
    }

    async fn simulate_call(&self, target: Address, call_data: Bytes) -> Result<Bytes> {
        let tx = TransactionRequest::default()
            .to(target)
            .input(TransactionInput::new(call_data));

        self.provider
            .call(tx)
            .await
            .map_err(|e| EngineError::external(format!("eth_call to {}", target), e))
    }

    async fn batch_read(&self, calls: &[ReadCall]) -> Result<Vec<Option<Bytes>>> {
        if calls.is_empty() {
            return Ok(Vec::new());
        }

        let calldata = build_aggregate3_calldata(calls);
        let response = self.simulate_call(self.multicall_address, calldata).await?;

        let results = IMulticall3::aggregate3Call::abi_decode_returns(&response)
            .map_err(|e| EngineError::external("decode aggregate3 response", e))?;

        if results.len() != calls.len() {
            return Err(EngineError::external(
                "aggregate3",
                anyhow::anyhow!(
                    "Multicall3 returned {} results, expected {}",
                    results.len(),
                    calls.len()
                ),
            ));
        }

        Ok(results
            .into_iter()
            .zip(calls)
            .map(|(result, call)| {
                if result.success {
                    Some(result.returnData)
                } else {
                    debug!(
                        "Batched call to {} failed: {}",
                        call.target,
                        revert_reason(&result.returnData)
                    );
                    None
                }
            })
            .collect())
    }

    async fn gas_price(&self) -> Result<u128> {
        self.provider
            .get_gas_price()
            .await
            .map_err(|e| EngineError::external("eth_gasPrice", e))
    }
}

/// Human-readable description of a failed call's return data.
///
/// - Error(string) → the revert message
/// - Panic(uint256) → the panic code
/// - empty → no data (missing contract or bare revert)
pub fn revert_reason(return_data: &[u8]) -> String {
    if return_data.is_empty() {
        return "reverted without data".to_string();
    }
    if let Ok(revert) = Revert::abi_decode(return_data) {
        return format!("reverted: {}", revert.reason);
    }
    if let Ok(panic) = Panic::abi_decode(return_data) {
        return format!("panicked with code {}", panic.code);
    }
    format!("reverted with {} bytes of data", return_data.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::U256;

    #[test]
    fn test_revert_reason_error_string() {
        let data = Revert {
            reason: "insufficient liquidity".to_string(),
        }
        .abi_encode();
        assert_eq!(revert_reason(&data), "reverted: insufficient liquidity");
    }

    #[test]
    fn test_revert_reason_panic() {
        let data = Panic {
            code: U256::from(0x11u64),
        }
        .abi_encode();
        assert!(revert_reason(&data).contains("panicked"));
    }

    #[test]
    fn test_revert_reason_empty() {
        assert_eq!(revert_reason(&[]), "reverted without data");
    }

    #[test]
    fn test_aggregate3_calldata_roundtrip() {
        let calls = vec![
            ReadCall::new(Address::repeat_byte(1), vec![0xde, 0xad]),
            ReadCall::new(Address::repeat_byte(2), vec![0xbe, 0xef]),
        ];
        let encoded = build_aggregate3_calldata(&calls);
        assert_eq!(&encoded[..4], &IMulticall3::aggregate3Call::SELECTOR);

        let decoded = IMulticall3::aggregate3Call::abi_decode(&encoded).unwrap();
        assert_eq!(decoded.calls.len(), 2);
        assert_eq!(decoded.calls[1].target, Address::repeat_byte(2));
        assert!(decoded.calls.iter().all(|c| c.allowFailure));
    }
}

//! Chain Query Capability
//!
//! Read-only access to a chain: single simulated calls, batched reads and
//! the current gas price. Every quoter and reader in the engine goes
//! through `ChainReader`, so tests swap in an in-memory implementation.

pub mod rpc;

#[cfg(test)]
pub(crate) mod mock;

use crate::error::Result;
use alloy::primitives::{Address, Bytes};
use async_trait::async_trait;

pub use rpc::{revert_reason, RpcChainReader};

/// One sub-call of a batched read
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadCall {
    pub target: Address,
    pub call_data: Bytes,
}

impl ReadCall {
    pub fn new(target: Address, call_data: impl Into<Bytes>) -> Self {
        Self {
            target,
            call_data: call_data.into(),
        }
    }
}

#[async_trait]
pub trait ChainReader: Send + Sync {
    fn chain_id(&self) -> u64;

    /// Execute a read-only call (eth_call) and return its raw output.
    /// A revert is an error.
    async fn simulate_call(&self, target: Address, call_data: Bytes) -> Result<Bytes>;

    /// Execute many read-only calls in one round-trip. The outer error covers
    /// the round-trip itself; each entry is `None` when that sub-call failed.
    async fn batch_read(&self, calls: &[ReadCall]) -> Result<Vec<Option<Bytes>>>;

    /// Current gas price in wei
    async fn gas_price(&self) -> Result<u128>;
}

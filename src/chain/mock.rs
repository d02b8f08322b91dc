//! In-memory ChainReader for unit tests

use super::{ChainReader, ReadCall};
use crate::error::{EngineError, Result};
use alloy::primitives::{Address, Bytes};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};

type Handler = Box<dyn Fn(Address, &[u8]) -> Result<Bytes> + Send + Sync>;

pub struct MockChainReader {
    chain_id: u64,
    handler: Handler,
    gas_price: Option<u128>,
    pub simulate_calls: AtomicUsize,
    pub batch_calls: AtomicUsize,
}

impl MockChainReader {
    /// Every call (single or batched) is answered by `handler`
    pub fn new(
        chain_id: u64,
        handler: impl Fn(Address, &[u8]) -> Result<Bytes> + Send + Sync + 'static,
    ) -> Self {
        Self {
            chain_id,
            handler: Box::new(handler),
            gas_price: None,
            simulate_calls: AtomicUsize::new(0),
            batch_calls: AtomicUsize::new(0),
        }
    }

    /// Reader that fails every call
    pub fn failing(chain_id: u64) -> Self {
        Self::new(chain_id, |target, _| {
            Err(EngineError::external(
                format!("eth_call to {}", target),
                anyhow::anyhow!("execution reverted"),
            ))
        })
    }

    pub fn with_gas_price(mut self, gas_price: u128) -> Self {
        self.gas_price = Some(gas_price);
        self
    }
}

#[async_trait]
impl ChainReader for MockChainReader {
    fn chain_id(&self) -> u64 {
        self.chain_id
    }

    async fn simulate_call(&self, target: Address, call_data: Bytes) -> Result<Bytes> {
        self.simulate_calls.fetch_add(1, Ordering::SeqCst);
        (self.handler)(target, &call_data)
    }

    async fn batch_read(&self, calls: &[ReadCall]) -> Result<Vec<Option<Bytes>>> {
        self.batch_calls.fetch_add(1, Ordering::SeqCst);
        Ok(calls
            .iter()
            .map(|call| (self.handler)(call.target, &call.call_data).ok())
            .collect())
    }

    async fn gas_price(&self) -> Result<u128> {
        self.gas_price
            .ok_or_else(|| EngineError::external("eth_gasPrice", anyhow::anyhow!("unavailable")))
    }
}

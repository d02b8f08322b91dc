//! Token metadata cache
//!
//! ERC-20 symbol/decimals never change once deployed, so successful
//! lookups are kept for the life of the process. Failed lookups are not
//! cached and simply yield no metadata.

use crate::chain::{ChainReader, ReadCall};
use crate::contracts::IERC20;
use crate::registry::ChainDeployment;
use crate::types::{is_native, TokenInfo};
use alloy::primitives::{Address, Bytes, B256};
use alloy::sol_types::SolCall;
use dashmap::DashMap;
use std::collections::HashMap;
use tracing::debug;

const NATIVE_DECIMALS: u8 = 18;

#[derive(Default)]
pub struct TokenMetadataCache {
    entries: DashMap<(u64, Address), TokenInfo>,
}

impl TokenMetadataCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, chain_id: u64, token: Address) -> Option<TokenInfo> {
        self.entries.get(&(chain_id, token)).map(|e| e.clone())
    }

    /// Metadata for `tokens`, reading every uncached ERC-20 in one batch.
    /// Tokens that cannot be resolved are absent from the result.
    pub async fn resolve(
        &self,
        reader: &dyn ChainReader,
        chain: &ChainDeployment,
        tokens: &[Address],
    ) -> HashMap<Address, TokenInfo> {
        let mut resolved = HashMap::new();
        let mut missing: Vec<Address> = Vec::new();

        for &token in tokens {
            if is_native(token) {
                resolved.insert(
                    token,
                    TokenInfo {
                        address: token,
                        symbol: chain.native_symbol.clone(),
                        decimals: NATIVE_DECIMALS,
                    },
                );
            } else if let Some(info) = self.get(chain.chain_id, token) {
                resolved.insert(token, info);
            } else if !missing.contains(&token) {
                missing.push(token);
            }
        }

        if missing.is_empty() {
            return resolved;
        }

        let calls: Vec<ReadCall> = missing
            .iter()
            .flat_map(|&token| {
                [
                    ReadCall::new(token, IERC20::symbolCall {}.abi_encode()),
                    ReadCall::new(token, IERC20::decimalsCall {}.abi_encode()),
                ]
            })
            .collect();

        let results = match reader.batch_read(&calls).await {
            Ok(results) => results,
            Err(e) => {
                debug!("Token metadata read failed on chain {}: {}", chain.chain_id, e);
                return resolved;
            }
        };

        for (token, pair) in missing.iter().zip(results.chunks(2)) {
            let [symbol_data, decimals_data] = pair else {
                continue;
            };
            let symbol = symbol_data.as_ref().and_then(decode_symbol);
            let decimals = decimals_data
                .as_ref()
                .and_then(|data| IERC20::decimalsCall::abi_decode_returns(data).ok());

            match (symbol, decimals) {
                (Some(symbol), Some(decimals)) => {
                    let info = TokenInfo {
                        address: *token,
                        symbol,
                        decimals,
                    };
                    self.entries.insert((chain.chain_id, *token), info.clone());
                    resolved.insert(*token, info);
                }
                _ => debug!("No metadata for {} on chain {}", token, chain.chain_id),
            }
        }

        resolved
    }
}

/// `string` symbol, or the older `bytes32` form some tokens return
fn decode_symbol(data: &Bytes) -> Option<String> {
    if let Ok(symbol) = IERC20::symbolCall::abi_decode_returns(data) {
        if !symbol.is_empty() {
            return Some(symbol);
        }
    }
    if data.len() != 32 {
        return None;
    }
    let raw = B256::from_slice(data);
    let end = raw.iter().position(|b| *b == 0).unwrap_or(32);
    let symbol = std::str::from_utf8(&raw[..end]).ok()?;
    (!symbol.is_empty()).then(|| symbol.to_string())
}

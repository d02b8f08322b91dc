//! Reserve-based pricing
//!
//! Fetches `getReserves()` for every hop of a path in one batched read and
//! prices the route analytically. A missing reserve read for any hop fails
//! the whole route: partial pricing is never returned.

use crate::chain::{ChainReader, ReadCall};
use crate::contracts::IUniswapV2Pair;
use crate::error::{EngineError, Result};
use crate::pool::calculator::get_amount_out_multi;
use crate::types::SwapPath;
use alloy::primitives::U256;
use alloy::sol_types::SolCall;
use std::sync::Arc;
use tracing::debug;

/// Reserve snapshot oriented in swap direction: (reserve_in, reserve_out)
pub type OrientedReserves = (U256, U256);

pub struct ReserveQuoter {
    reader: Arc<dyn ChainReader>,
}

impl ReserveQuoter {
    pub fn new(reader: Arc<dyn ChainReader>) -> Self {
        Self { reader }
    }

    /// Read reserves for every hop of `path`, oriented token_in -> token_out
    pub async fn fetch_reserves(&self, path: &SwapPath) -> Result<Vec<OrientedReserves>> {
        let call_data = IUniswapV2Pair::getReservesCall {}.abi_encode();
        let calls: Vec<ReadCall> = path
            .pools
            .iter()
            .map(|pool| ReadCall::new(pool.address, call_data.clone()))
            .collect();

        let results = self.reader.batch_read(&calls).await?;

        let mut reserves = Vec::with_capacity(results.len());
        for (hop, (pool, result)) in path.pools.iter().zip(results).enumerate() {
            let data = result.ok_or_else(|| {
                EngineError::NoLiquidity(format!(
                    "reserve read failed for pair {} (hop {})",
                    pool.address, hop
                ))
            })?;
            let ret = IUniswapV2Pair::getReservesCall::abi_decode_returns(&data).map_err(|e| {
                EngineError::NoLiquidity(format!("undecodable reserves from {}: {}", pool.address, e))
            })?;

            let reserve0 = U256::from(ret.reserve0);
            let reserve1 = U256::from(ret.reserve1);
            if reserve0.is_zero() || reserve1.is_zero() {
                return Err(EngineError::NoLiquidity(format!(
                    "pair {} has empty reserves",
                    pool.address
                )));
            }

            let oriented = if path.tokens[hop] == pool.token0 {
                (reserve0, reserve1)
            } else {
                (reserve1, reserve0)
            };
            debug!(
                "Pair {} reserves in={} out={}",
                pool.address, oriented.0, oriented.1
            );
            reserves.push(oriented);
        }

        if reserves.len() != path.pools.len() {
            return Err(EngineError::NoLiquidity(format!(
                "got {} reserve reads for {} hops",
                reserves.len(),
                path.pools.len()
            )));
        }

        Ok(reserves)
    }

    /// Price `amount_in` through the path's pairs
    pub async fn quote(&self, path: &SwapPath, amount_in: U256, fee_units: u32) -> Result<U256> {
        let reserves = self.fetch_reserves(path).await?;
        let amount_out = get_amount_out_multi(amount_in, &reserves, fee_units);
        if amount_out.is_zero() {
            return Err(EngineError::NoLiquidity(format!(
                "route {:?} prices to zero output",
                path.tokens
            )));
        }
        Ok(amount_out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::mock::MockChainReader;
    use crate::pool::path::reserve_path;
    use crate::registry::{ChainRegistry, CHAIN_ETHEREUM};
    use alloy::primitives::aliases::U112;
    use alloy::primitives::{Address, Bytes};
    use alloy::sol_types::SolValue;
    use std::collections::HashMap;

    fn reserves_return(r0: u64, r1: u64) -> Bytes {
        (U112::from(r0), U112::from(r1), 0u32).abi_encode_params().into()
    }

    fn v2() -> crate::registry::ReserveVenueDeployment {
        ChainRegistry::with_defaults()
            .get(CHAIN_ETHEREUM)
            .unwrap()
            .uniswap_v2
            .clone()
            .unwrap()
    }

    #[tokio::test]
    async fn test_single_hop_exact_output() {
        let token_a = Address::repeat_byte(0x01);
        let token_b = Address::repeat_byte(0x02);
        let path = reserve_path(&v2(), &[token_a, token_b]).unwrap();
        // token_a sorts first, so reserve0 belongs to token_a
        let reader = MockChainReader::new(1, |_, _| Ok(reserves_return(1_000_000_000, 2_000_000_000)));

        let quoter = ReserveQuoter::new(Arc::new(reader));
        let out = quoter.quote(&path, U256::from(1_000_000u64), 3).await.unwrap();

        // amount_in * 997 * reserve_out / (reserve_in * 1000 + amount_in * 997)
        let amount_in_with_fee = U256::from(1_000_000u64) * U256::from(997u64);
        let expected = amount_in_with_fee * U256::from(2_000_000_000u64)
            / (U256::from(1_000_000_000u64) * U256::from(1000u64) + amount_in_with_fee);
        assert_eq!(out, expected);
        assert_eq!(out, U256::from(1_992_013u64));
    }

    #[tokio::test]
    async fn test_reserves_oriented_by_direction() {
        let token_a = Address::repeat_byte(0x01);
        let token_b = Address::repeat_byte(0x02);
        // selling token_b: reserve_in must be reserve1
        let path = reserve_path(&v2(), &[token_b, token_a]).unwrap();
        let reader = MockChainReader::new(1, |_, _| Ok(reserves_return(10, 20)));

        let reserves = ReserveQuoter::new(Arc::new(reader))
            .fetch_reserves(&path)
            .await
            .unwrap();
        assert_eq!(reserves, vec![(U256::from(20u64), U256::from(10u64))]);
    }

    #[tokio::test]
    async fn test_one_missing_hop_fails_route() {
        let deployment = v2();
        let tokens = [
            Address::repeat_byte(0x01),
            Address::repeat_byte(0x02),
            Address::repeat_byte(0x03),
        ];
        let path = reserve_path(&deployment, &tokens).unwrap();
        let live_pair = path.pools[0].address;

        let table = HashMap::from([(live_pair, reserves_return(1_000_000, 1_000_000))]);
        let reader = MockChainReader::new(1, move |target, _| {
            table
                .get(&target)
                .cloned()
                .ok_or_else(|| EngineError::external("eth_call", anyhow::anyhow!("no code")))
        });

        let result = ReserveQuoter::new(Arc::new(reader))
            .quote(&path, U256::from(1_000u64), 3)
            .await;
        assert!(matches!(result, Err(EngineError::NoLiquidity(_))));
    }

    #[tokio::test]
    async fn test_empty_reserves_is_no_liquidity() {
        let path = reserve_path(&v2(), &[Address::repeat_byte(1), Address::repeat_byte(2)]).unwrap();
        let reader = MockChainReader::new(1, |_, _| Ok(reserves_return(0, 5)));
        let result = ReserveQuoter::new(Arc::new(reader))
            .quote(&path, U256::from(1u64), 3)
            .await;
        assert!(matches!(result, Err(EngineError::NoLiquidity(_))));
    }
}

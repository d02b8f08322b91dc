//! Fee-Tier Tournament
//!
//! Prices a token route against every candidate fee tier (single-hop) or
//! every candidate tier pairing (two-hop) through QuoterV2, all attempts
//! in flight at once. Failed attempts are dropped; the greatest output
//! wins and ties go to the earliest candidate.

use crate::chain::{revert_reason, ChainReader};
use crate::contracts::IQuoterV2;
use crate::error::{EngineError, Result};
use crate::pool::path::{encode_path, fee_to_u24};
use alloy::primitives::aliases::U160;
use alloy::primitives::{Address, U256};
use alloy::sol_types::SolCall;
use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, info};

/// Fee tiers tried for single-hop routes, in tie-break order
pub const FEE_TIERS: [u32; 4] = [
    100,    // 0.01% - stablecoin pairs
    500,    // 0.05% - stable/correlated pairs
    3000,   // 0.30% - standard tier
    10_000, // 1.00% - exotic pairs
];

/// Tier pairings tried for two-hop routes, in tie-break order
pub const TWO_HOP_FEE_COMBOS: [(u32, u32); 8] = [
    (500, 500),
    (500, 3000),
    (3000, 500),
    (3000, 3000),
    (100, 500),
    (500, 100),
    (3000, 10_000),
    (10_000, 3000),
];

/// One successful pricing attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierAttempt {
    /// One fee tier per hop
    pub fees: Vec<u32>,
    pub amount_out: U256,
    /// Raw QuoterV2 gas estimate, without router overhead
    pub gas_estimate: u64,
}

/// Pick the strictly greatest output; on ties the first attempt wins.
/// Failed attempts are ignored. `None` when nothing succeeded.
pub fn select_best<I>(attempts: I) -> Option<TierAttempt>
where
    I: IntoIterator<Item = Result<TierAttempt>>,
{
    let mut best: Option<TierAttempt> = None;
    for attempt in attempts.into_iter().flatten() {
        let better = match &best {
            Some(current) => attempt.amount_out > current.amount_out,
            None => true,
        };
        if better {
            best = Some(attempt);
        }
    }
    best
}

/// QuoterV2 backed tournament for one chain
pub struct TournamentQuoter {
    reader: Arc<dyn ChainReader>,
    quoter: Address,
}

impl TournamentQuoter {
    pub fn new(reader: Arc<dyn ChainReader>, quoter: Address) -> Self {
        Self { reader, quoter }
    }

    /// Run the tournament for a 2-token (single-hop) or 3-token (two-hop) route.
    pub async fn quote(&self, tokens: &[Address], amount_in: U256) -> Result<TierAttempt> {
        let attempts = match tokens {
            [token_in, token_out] => {
                let futs = FEE_TIERS
                    .iter()
                    .map(|fee| self.attempt_single(*token_in, *token_out, *fee, amount_in));
                join_all(futs).await
            }
            [_, _, _] => {
                let futs = TWO_HOP_FEE_COMBOS
                    .iter()
                    .map(|(fee1, fee2)| self.attempt_multi(tokens, vec![*fee1, *fee2], amount_in));
                join_all(futs).await
            }
            _ => {
                return Err(EngineError::InvalidInput(format!(
                    "tournament supports 1 or 2 hops, got {} tokens",
                    tokens.len()
                )))
            }
        };

        let total = attempts.len();
        let succeeded = attempts.iter().filter(|a| a.is_ok()).count();

        match select_best(attempts) {
            Some(winner) => {
                info!(
                    "Tier tournament winner {:?}: out={} gas={} ({}/{} attempts priced)",
                    winner.fees, winner.amount_out, winner.gas_estimate, succeeded, total
                );
                Ok(winner)
            }
            None => Err(EngineError::NoLiquidity(format!(
                "all {} fee tier attempts failed for route {:?}",
                total, tokens
            ))),
        }
    }

    async fn attempt_single(
        &self,
        token_in: Address,
        token_out: Address,
        fee: u32,
        amount_in: U256,
    ) -> Result<TierAttempt> {
        let call = IQuoterV2::quoteExactInputSingleCall {
            params: IQuoterV2::QuoteExactInputSingleParams {
                tokenIn: token_in,
                tokenOut: token_out,
                amountIn: amount_in,
                fee: fee_to_u24(fee),
                sqrtPriceLimitX96: U160::ZERO,
            },
        };

        let output = self
            .reader
            .simulate_call(self.quoter, call.abi_encode().into())
            .await
            .inspect_err(|e| debug!("Tier {} attempt failed: {}", fee, e))?;

        let ret = IQuoterV2::quoteExactInputSingleCall::abi_decode_returns(&output).map_err(|e| {
            debug!("Tier {} returned undecodable data: {}", fee, revert_reason(&output));
            EngineError::external("decode quoteExactInputSingle", e)
        })?;

        Self::accept(vec![fee], ret.amountOut, ret.gasEstimate)
    }

    async fn attempt_multi(
        &self,
        tokens: &[Address],
        fees: Vec<u32>,
        amount_in: U256,
    ) -> Result<TierAttempt> {
        let path = encode_path(tokens, &fees)?;
        let call = IQuoterV2::quoteExactInputCall {
            path,
            amountIn: amount_in,
        };

        let output = self
            .reader
            .simulate_call(self.quoter, call.abi_encode().into())
            .await
            .inspect_err(|e| debug!("Tiers {:?} attempt failed: {}", fees, e))?;

        let ret = IQuoterV2::quoteExactInputCall::abi_decode_returns(&output)
            .map_err(|e| EngineError::external("decode quoteExactInput", e))?;

        Self::accept(fees, ret.amountOut, ret.gasEstimate)
    }

    fn accept(fees: Vec<u32>, amount_out: U256, gas_estimate: U256) -> Result<TierAttempt> {
        // A zero output means the pool exists but cannot fill the trade
        if amount_out.is_zero() {
            return Err(EngineError::NoLiquidity(format!(
                "tiers {:?} quoted zero output",
                fees
            )));
        }
        debug!("Tiers {:?} quoted out={} gas={}", fees, amount_out, gas_estimate);
        Ok(TierAttempt {
            fees,
            amount_out,
            gas_estimate: gas_estimate.saturating_to::<u64>(),
        })
    }
}

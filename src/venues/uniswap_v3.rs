//! Uniswap V3 style venue: fee-tier pools priced through QuoterV2,
//! executed through the Universal Router with a packed path.

use super::{SwapVenue, VenueQuoteRequest};
use crate::chain::ChainReader;
use crate::error::{EngineError, Result};
use crate::execution::{encode_swap, SwapParams};
use crate::pool::calculator::tier_venue_fee;
use crate::pool::path::tier_path;
use crate::quoter::TournamentQuoter;
use crate::registry::TierVenueDeployment;
use crate::types::{SwapQuote, TxPayload, Venue};
use alloy::primitives::Address;
use async_trait::async_trait;
use std::sync::Arc;

pub struct UniswapV3Venue {
    chain_id: u64,
    wrapped_native: Address,
    router: Address,
    deployment: TierVenueDeployment,
    tournament: TournamentQuoter,
    gas_overhead: u64,
}

impl UniswapV3Venue {
    pub fn new(
        chain_id: u64,
        wrapped_native: Address,
        router: Address,
        deployment: TierVenueDeployment,
        reader: Arc<dyn ChainReader>,
        gas_overhead: u64,
    ) -> Self {
        let tournament = TournamentQuoter::new(reader, deployment.quoter);
        Self {
            chain_id,
            wrapped_native,
            router,
            deployment,
            tournament,
            gas_overhead,
        }
    }
}

#[async_trait]
impl SwapVenue for UniswapV3Venue {
    fn venue(&self) -> Venue {
        Venue::UniswapV3
    }

    async fn quote(&self, request: &VenueQuoteRequest) -> Result<SwapQuote> {
        let tokens = &request.route.tokens;
        let winner = self.tournament.quote(tokens, request.amount_in).await?;

        let path = tier_path(&self.deployment, tokens, &winner.fees)?;

        Ok(SwapQuote {
            chain_id: self.chain_id,
            from_token: request.from_token,
            to_token: request.to_token,
            from_amount: request.amount_in,
            to_amount: winner.amount_out,
            venue: Venue::UniswapV3,
            router: self.router,
            estimated_gas: winner.gas_estimate.saturating_add(self.gas_overhead),
            venue_fee: tier_venue_fee(request.amount_in, &winner.fees),
            pool: path.pools[0].clone(),
            intermediate_pool: path.pools.get(1).cloned(),
            path,
        })
    }

    fn encode(&self, quote: &SwapQuote, params: &SwapParams) -> Result<TxPayload> {
        if quote.venue != Venue::UniswapV3 || quote.chain_id != self.chain_id {
            return Err(EngineError::EncodingPrecondition(format!(
                "{} quote on chain {} handed to uniswap_v3 on chain {}",
                quote.venue, quote.chain_id, self.chain_id
            )));
        }
        encode_swap(quote, self.wrapped_native, params)
    }
}

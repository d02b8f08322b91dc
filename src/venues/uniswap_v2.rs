//! Uniswap V2 style venue: constant product pairs priced from reserves,
//! executed through the Universal Router with a plain token path.

use super::{SwapVenue, VenueQuoteRequest};
use crate::chain::ChainReader;
use crate::error::{EngineError, Result};
use crate::execution::{encode_swap, SwapParams};
use crate::pool::calculator::reserve_venue_fee;
use crate::pool::path::reserve_path;
use crate::quoter::ReserveQuoter;
use crate::registry::ReserveVenueDeployment;
use crate::types::{SwapQuote, TxPayload, Venue};
use alloy::primitives::Address;
use async_trait::async_trait;
use std::sync::Arc;

/// Gas for one pair swap, before router overhead
pub const RESERVE_HOP_GAS: u64 = 90_000;

pub struct UniswapV2Venue {
    chain_id: u64,
    wrapped_native: Address,
    router: Address,
    deployment: ReserveVenueDeployment,
    reserves: ReserveQuoter,
    gas_overhead: u64,
}

impl UniswapV2Venue {
    pub fn new(
        chain_id: u64,
        wrapped_native: Address,
        router: Address,
        deployment: ReserveVenueDeployment,
        reader: Arc<dyn ChainReader>,
        gas_overhead: u64,
    ) -> Self {
        Self {
            chain_id,
            wrapped_native,
            router,
            deployment,
            reserves: ReserveQuoter::new(reader),
            gas_overhead,
        }
    }
}

#[async_trait]
impl SwapVenue for UniswapV2Venue {
    fn venue(&self) -> Venue {
        Venue::UniswapV2
    }

    async fn quote(&self, request: &VenueQuoteRequest) -> Result<SwapQuote> {
        let path = reserve_path(&self.deployment, &request.route.tokens)?;
        let fee_units = self.deployment.fee_units;
        let amount_out = self.reserves.quote(&path, request.amount_in, fee_units).await?;

        let hops = path.hops() as u64;
        Ok(SwapQuote {
            chain_id: self.chain_id,
            from_token: request.from_token,
            to_token: request.to_token,
            from_amount: request.amount_in,
            to_amount: amount_out,
            venue: Venue::UniswapV2,
            router: self.router,
            estimated_gas: RESERVE_HOP_GAS * hops + self.gas_overhead,
            venue_fee: reserve_venue_fee(request.amount_in, fee_units, path.hops()),
            pool: path.pools[0].clone(),
            intermediate_pool: path.pools.get(1).cloned(),
            path,
        })
    }

    fn encode(&self, quote: &SwapQuote, params: &SwapParams) -> Result<TxPayload> {
        if quote.venue != Venue::UniswapV2 || quote.chain_id != self.chain_id {
            return Err(EngineError::EncodingPrecondition(format!(
                "{} quote on chain {} handed to uniswap_v2 on chain {}",
                quote.venue, quote.chain_id, self.chain_id
            )));
        }
        encode_swap(quote, self.wrapped_native, params)
    }
}

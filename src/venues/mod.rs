//! Liquidity venues
//!
//! Every swap venue prices a candidate route and encodes a quote it
//! produced. The set of venue families is closed, so dispatch goes through
//! the `VenueAdapter` enum rather than trait objects looked up at runtime.
//! Bridges are a separate capability (`BridgeVenue`).

pub mod bridge;
pub mod uniswap_v2;
pub mod uniswap_v3;

use crate::chain::ChainReader;
use crate::error::{EngineError, Result};
use crate::execution::SwapParams;
use crate::pool::CandidateRoute;
use crate::registry::ChainDeployment;
use crate::types::{SwapQuote, TxPayload, Venue};
use alloy::primitives::{Address, U256};
use async_trait::async_trait;
use std::sync::Arc;

pub use bridge::{AcrossBridge, BridgeQuoteRequest, BridgeVenue};
pub use uniswap_v2::UniswapV2Venue;
pub use uniswap_v3::UniswapV3Venue;

/// One venue pricing request
#[derive(Debug, Clone)]
pub struct VenueQuoteRequest {
    /// Requested input token (may be the native sentinel)
    pub from_token: Address,
    /// Requested output token (may be the native sentinel)
    pub to_token: Address,
    pub amount_in: U256,
    /// Pricing route (native already replaced by wrapped native)
    pub route: CandidateRoute,
}

#[async_trait]
pub trait SwapVenue: Send + Sync {
    fn venue(&self) -> Venue;

    async fn quote(&self, request: &VenueQuoteRequest) -> Result<SwapQuote>;

    fn encode(&self, quote: &SwapQuote, params: &SwapParams) -> Result<TxPayload>;
}

/// Closed set of swap venue implementations
pub enum VenueAdapter {
    UniswapV3(UniswapV3Venue),
    UniswapV2(UniswapV2Venue),
}

impl VenueAdapter {
    /// Adapter for `venue` on `chain`; ConfigurationMissing when the chain
    /// lacks a deployment the venue needs.
    pub fn for_chain(
        venue: Venue,
        chain: &ChainDeployment,
        reader: Arc<dyn ChainReader>,
        gas_overhead: u64,
    ) -> Result<Self> {
        let wrapped_native = chain.wrapped_native()?;
        let router = chain.universal_router()?;

        match venue {
            Venue::UniswapV3 => {
                let deployment = chain
                    .uniswap_v3
                    .clone()
                    .ok_or_else(|| EngineError::missing(chain.chain_id, "uniswap_v3 deployment"))?;
                Ok(VenueAdapter::UniswapV3(UniswapV3Venue::new(
                    chain.chain_id,
                    wrapped_native,
                    router,
                    deployment,
                    reader,
                    gas_overhead,
                )))
            }
            Venue::UniswapV2 => {
                let deployment = chain
                    .uniswap_v2
                    .clone()
                    .ok_or_else(|| EngineError::missing(chain.chain_id, "uniswap_v2 deployment"))?;
                Ok(VenueAdapter::UniswapV2(UniswapV2Venue::new(
                    chain.chain_id,
                    wrapped_native,
                    router,
                    deployment,
                    reader,
                    gas_overhead,
                )))
            }
            Venue::Across => Err(EngineError::InvalidInput(
                "across is a bridge, not a swap venue".into(),
            )),
        }
    }
}

#[async_trait]
impl SwapVenue for VenueAdapter {
    fn venue(&self) -> Venue {
        match self {
            VenueAdapter::UniswapV3(v) => v.venue(),
            VenueAdapter::UniswapV2(v) => v.venue(),
        }
    }

    async fn quote(&self, request: &VenueQuoteRequest) -> Result<SwapQuote> {
        match self {
            VenueAdapter::UniswapV3(v) => v.quote(request).await,
            VenueAdapter::UniswapV2(v) => v.quote(request).await,
        }
    }

    fn encode(&self, quote: &SwapQuote, params: &SwapParams) -> Result<TxPayload> {
        match self {
            VenueAdapter::UniswapV3(v) => v.encode(quote, params),
            VenueAdapter::UniswapV2(v) => v.encode(quote, params),
        }
    }
}

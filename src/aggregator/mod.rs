//! Quote Aggregation Service
//!
//! Fans a quote request out to every swap venue enabled on the chain (or
//! to the bridge for cross-chain requests), normalizes each success into a
//! `QuoteResult` with route steps and a fee breakdown, and ranks the
//! results by output amount.
//!
//! Key features:
//! - All venues launched before any is awaited; one venue failing never
//!   removes another venue's result
//! - Live gas price with a fixed fallback
//! - Best-effort USD fee conversion through the price oracle
//! - Token metadata cached for the life of the service
//! - Transaction building (plain, Permit2-authorized, bridge deposit)

pub mod fees;
pub mod metadata;

use crate::chain::ChainReader;
use crate::error::{EngineError, Result};
use crate::execution::{deadline_from_now, min_amount_out, ChainAllowanceReader, PermitFlow, PermitSigner, SwapParams};
use crate::oracle::{PriceAsset, PriceOracle};
use crate::pool::{CandidateRoute, PathBuilder};
use crate::registry::{ChainDeployment, ChainRegistry};
use crate::types::{
    is_native, validate_slippage, BridgeQuote, QuoteRequest, QuoteResult, RouteStep, SwapQuote, TokenInfo,
    TxPayload,
};
use crate::venues::{BridgeQuoteRequest, BridgeVenue, SwapVenue, VenueAdapter, VenueQuoteRequest};
use alloy::primitives::{Address, U256};
use futures::future::join_all;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub use fees::{fee_breakdown, native_to_usd, FeeInputs, GWEI};
pub use metadata::TokenMetadataCache;

/// Gas for a SpokePool deposit
pub const BRIDGE_DEPOSIT_GAS: u64 = 120_000;

/// Service-wide knobs, usually built from `EngineConfig`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuoteSettings {
    pub default_slippage_bps: u32,
    pub deadline_secs: u64,
    pub gas_price_fallback_wei: u128,
    /// Added to every router swap's gas estimate
    pub router_gas_overhead: u64,
}

impl Default for QuoteSettings {
    fn default() -> Self {
        Self {
            default_slippage_bps: 50,
            deadline_secs: crate::execution::DEFAULT_DEADLINE_SECS,
            gas_price_fallback_wei: 20 * GWEI,
            router_gas_overhead: 50_000,
        }
    }
}

struct ChainContext {
    reader: Arc<dyn ChainReader>,
    venues: Vec<VenueAdapter>,
}

pub struct QuoteService {
    registry: Arc<ChainRegistry>,
    settings: QuoteSettings,
    chains: HashMap<u64, ChainContext>,
    bridge: Option<Arc<dyn BridgeVenue>>,
    oracle: Option<Arc<dyn PriceOracle>>,
    token_metadata: TokenMetadataCache,
}

impl QuoteService {
    pub fn new(registry: Arc<ChainRegistry>, settings: QuoteSettings) -> Self {
        Self {
            registry,
            settings,
            chains: HashMap::new(),
            bridge: None,
            oracle: None,
            token_metadata: TokenMetadataCache::new(),
        }
    }

    /// Register a chain reader and build the chain's enabled venues.
    /// Venues whose deployment is incomplete are skipped with a warning.
    pub fn with_reader(mut self, reader: Arc<dyn ChainReader>) -> Result<Self> {
        let chain_id = reader.chain_id();
        let chain = self.registry.get(chain_id)?;

        let mut venues = Vec::new();
        for venue in &chain.enabled_venues {
            if venue.is_bridge() {
                continue;
            }
            match VenueAdapter::for_chain(*venue, chain, reader.clone(), self.settings.router_gas_overhead) {
                Ok(adapter) => venues.push(adapter),
                Err(e) => warn!("Skipping {} on chain {}: {}", venue, chain_id, e),
            }
        }

        info!(
            "Chain {} ({}) ready with venues {:?}",
            chain_id,
            chain.name,
            venues.iter().map(|v| v.venue().to_string()).collect::<Vec<_>>()
        );
        self.chains.insert(chain_id, ChainContext { reader, venues });
        Ok(self)
    }

    pub fn with_bridge(mut self, bridge: Arc<dyn BridgeVenue>) -> Self {
        self.bridge = Some(bridge);
        self
    }

    pub fn with_oracle(mut self, oracle: Arc<dyn PriceOracle>) -> Self {
        self.oracle = Some(oracle);
        self
    }

    pub fn registry(&self) -> &ChainRegistry {
        &self.registry
    }

    pub fn settings(&self) -> &QuoteSettings {
        &self.settings
    }

    /// Chains with a registered reader, ascending
    pub fn chain_ids(&self) -> Vec<u64> {
        let mut ids: Vec<u64> = self.chains.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    fn context(&self, chain_id: u64) -> Result<&ChainContext> {
        self.chains
            .get(&chain_id)
            .ok_or_else(|| EngineError::missing(chain_id, "chain reader"))
    }

    /// Every viable route for `request`, best output first.
    ///
    /// Empty when nothing is viable; errors only for malformed input.
    pub async fn build_quote(&self, request: &QuoteRequest) -> Result<Vec<QuoteResult>> {
        request.validate()?;
        let slippage_bps = request
            .slippage_bps
            .unwrap_or(self.settings.default_slippage_bps);
        validate_slippage(slippage_bps)?;

        let outcome = if request.is_cross_chain() {
            self.quote_cross_chain(request, slippage_bps).await
        } else {
            self.quote_same_chain(request, slippage_bps).await
        };

        let mut results = match outcome {
            Ok(results) => results,
            Err(e) if e.is_recoverable() => {
                debug!(
                    "No route for {} -> {} ({} -> {}): {}",
                    request.from_token, request.to_token, request.source_chain_id, request.target_chain_id, e
                );
                Vec::new()
            }
            Err(e) => return Err(e),
        };

        // Stable: equal outputs keep venue order
        results.sort_by(|a, b| b.to_amount.cmp(&a.to_amount));

        info!(
            "{} route(s) for {} {} -> {} on {} -> {}",
            results.len(),
            request.amount,
            request.from_token,
            request.to_token,
            request.source_chain_id,
            request.target_chain_id
        );
        Ok(results)
    }

    async fn quote_same_chain(&self, request: &QuoteRequest, slippage_bps: u32) -> Result<Vec<QuoteResult>> {
        let chain = self.registry.get(request.source_chain_id)?;
        let ctx = self.context(chain.chain_id)?;

        let from = chain.pricing_token(request.from_token)?;
        let to = chain.pricing_token(request.to_token)?;
        let routes = PathBuilder::new(chain).candidate_routes(from, to, &request.intermediate_tokens);
        if routes.is_empty() {
            return Err(EngineError::NoPath(format!(
                "no route {} -> {} on chain {}",
                request.from_token, request.to_token, chain.chain_id
            )));
        }

        let wanted = [request.from_token, request.to_token];
        let venue_quotes = join_all(
            ctx.venues
                .iter()
                .map(|venue| self.best_venue_quote(venue, request, &routes)),
        );
        let (venue_quotes, gas_price, token_infos, native_usd) = tokio::join!(
            venue_quotes,
            self.gas_price(Some(ctx.reader.as_ref())),
            self.token_metadata.resolve(ctx.reader.as_ref(), chain, &wanted),
            self.native_usd(chain),
        );

        let mut results = Vec::new();
        for (venue, outcome) in ctx.venues.iter().zip(venue_quotes) {
            match outcome {
                Ok(quote) => {
                    match self.swap_result(chain, quote, slippage_bps, gas_price, native_usd, &token_infos) {
                        Ok(result) => results.push(result),
                        Err(e) => warn!("Dropping {} quote on chain {}: {}", venue.venue(), chain.chain_id, e),
                    }
                }
                Err(e) if e.is_recoverable() => {
                    debug!("{} has no quote on chain {}: {}", venue.venue(), chain.chain_id, e)
                }
                Err(e) => warn!("{} quote failed on chain {}: {}", venue.venue(), chain.chain_id, e),
            }
        }
        Ok(results)
    }

    /// Best quote one venue gives over all candidate routes; first wins ties
    async fn best_venue_quote(
        &self,
        venue: &VenueAdapter,
        request: &QuoteRequest,
        routes: &[CandidateRoute],
    ) -> Result<SwapQuote> {
        let attempts = join_all(routes.iter().map(|route| {
            let venue_request = VenueQuoteRequest {
                from_token: request.from_token,
                to_token: request.to_token,
                amount_in: request.amount,
                route: route.clone(),
            };
            async move { venue.quote(&venue_request).await }
        }))
        .await;

        let mut best: Option<SwapQuote> = None;
        let mut last_error = None;
        for attempt in attempts {
            match attempt {
                Ok(quote) => {
                    if best.as_ref().map_or(true, |b| quote.to_amount > b.to_amount) {
                        best = Some(quote);
                    }
                }
                Err(e) => last_error = Some(e),
            }
        }

        best.ok_or_else(|| {
            last_error.unwrap_or_else(|| EngineError::NoLiquidity(format!("{} returned nothing", venue.venue())))
        })
    }

    fn swap_result(
        &self,
        chain: &ChainDeployment,
        quote: SwapQuote,
        slippage_bps: u32,
        gas_price: u128,
        native_usd: Option<Decimal>,
        token_infos: &HashMap<Address, TokenInfo>,
    ) -> Result<QuoteResult> {
        let to_amount_min = min_amount_out(quote.to_amount, slippage_bps)?;

        let mut steps = Vec::with_capacity(2);
        if !is_native(quote.from_token) {
            steps.push(RouteStep::Approve {
                token: quote.from_token,
                spender: chain.permit2,
                amount: quote.from_amount,
            });
        }
        steps.push(RouteStep::Swap {
            venue: quote.venue,
            router: quote.router,
            from_token: quote.from_token,
            to_token: quote.to_token,
            from_amount: quote.from_amount,
            to_amount: quote.to_amount,
            to_amount_min,
        });

        let fees = fee_breakdown(&FeeInputs {
            gas_estimate: quote.estimated_gas,
            gas_price,
            venue_fee: quote.venue_fee,
            bridge_fee: U256::ZERO,
            fees_in_native: is_native(quote.from_token) || chain.is_wrapped_native(quote.from_token),
            native_usd,
        });

        Ok(QuoteResult {
            venue: quote.venue,
            source_chain_id: chain.chain_id,
            target_chain_id: chain.chain_id,
            from_amount: quote.from_amount,
            to_amount: quote.to_amount,
            to_amount_min,
            slippage_bps,
            steps,
            fees,
            from_token_info: token_infos.get(&quote.from_token).cloned(),
            to_token_info: token_infos.get(&quote.to_token).cloned(),
            swap_quote: Some(quote),
            bridge_quote: None,
        })
    }

    /// Output token on the target chain: the requested one when the target
    /// chain knows it, else the same asset mapped over from the source chain
    fn bridge_output_token(&self, request: &QuoteRequest) -> Option<Address> {
        let token = request.to_token;
        if is_native(token) {
            return Some(token);
        }
        let target = self.registry.get(request.target_chain_id).ok()?;
        if target.is_wrapped_native(token) || target.symbol_of(token).is_some() {
            return Some(token);
        }
        self.registry
            .map_token(request.source_chain_id, token, request.target_chain_id)
    }

    async fn quote_cross_chain(&self, request: &QuoteRequest, slippage_bps: u32) -> Result<Vec<QuoteResult>> {
        let Some(bridge) = &self.bridge else {
            return Err(EngineError::missing(request.source_chain_id, "bridge venue"));
        };
        let source = self.registry.get(request.source_chain_id)?;
        let Some(output_token) = self.bridge_output_token(request) else {
            return Err(EngineError::NoPath(format!(
                "{} has no counterpart on chain {}",
                request.to_token, request.target_chain_id
            )));
        };

        let bridge_request = BridgeQuoteRequest {
            source_chain_id: request.source_chain_id,
            target_chain_id: request.target_chain_id,
            input_token: request.from_token,
            output_token,
            amount: request.amount,
            recipient: request.recipient(),
        };

        let source_reader = self.chains.get(&source.chain_id).map(|ctx| ctx.reader.as_ref());
        let (quote, gas_price, from_info, to_info, native_usd) = tokio::join!(
            bridge.get_quote(&bridge_request),
            self.gas_price(source_reader),
            self.token_info(request.source_chain_id, request.from_token),
            self.token_info(request.target_chain_id, output_token),
            self.native_usd(source),
        );

        let quote = match quote {
            Ok(Some(quote)) => quote,
            Ok(None) => return Ok(Vec::new()),
            Err(e) => {
                warn!("{} quote failed: {}", bridge.venue(), e);
                return Ok(Vec::new());
            }
        };

        let to_amount_min = quote.output_amount;
        let mut steps = Vec::with_capacity(2);
        if !is_native(quote.input_token) {
            steps.push(RouteStep::Approve {
                token: quote.input_token,
                spender: quote.spoke_pool,
                amount: quote.input_amount,
            });
        }
        steps.push(RouteStep::Bridge {
            venue: quote.venue,
            source_chain_id: quote.source_chain_id,
            target_chain_id: quote.target_chain_id,
            from_token: quote.input_token,
            to_token: quote.output_token,
            from_amount: quote.input_amount,
            to_amount: quote.output_amount,
            to_amount_min,
        });

        let fees = fee_breakdown(&FeeInputs {
            gas_estimate: BRIDGE_DEPOSIT_GAS,
            gas_price,
            venue_fee: U256::ZERO,
            bridge_fee: quote.total_fee,
            fees_in_native: is_native(quote.input_token) || source.is_wrapped_native(quote.input_token),
            native_usd,
        });

        Ok(vec![QuoteResult {
            venue: quote.venue,
            source_chain_id: quote.source_chain_id,
            target_chain_id: quote.target_chain_id,
            from_amount: quote.input_amount,
            to_amount: quote.output_amount,
            to_amount_min,
            slippage_bps,
            steps,
            fees,
            from_token_info: from_info,
            to_token_info: to_info,
            swap_quote: None,
            bridge_quote: Some(quote),
        }])
    }

    /// Router payload for a same-chain quote
    pub fn build_transaction(&self, quote: &SwapQuote, recipient: Address, slippage_bps: u32) -> Result<TxPayload> {
        self.encode_with(quote, recipient, slippage_bps, None)
    }

    /// Router payload whose batch starts with a freshly signed Permit2
    /// authorization for the quote's input. Native input needs no
    /// authorization and is built without one.
    pub async fn build_transaction_with_permit(
        &self,
        quote: &SwapQuote,
        owner: Address,
        recipient: Address,
        slippage_bps: u32,
        signer: &dyn PermitSigner,
    ) -> Result<TxPayload> {
        validate_slippage(slippage_bps)?;
        if is_native(quote.from_token) {
            return self.build_transaction(quote, recipient, slippage_bps);
        }

        let chain = self.registry.get(quote.chain_id)?;
        let ctx = self.context(quote.chain_id)?;
        let allowances = ChainAllowanceReader::new(ctx.reader.clone(), chain.permit2);
        let signed = PermitFlow::new(&allowances, chain.chain_id, chain.permit2)
            .authorize(owner, quote.from_token, quote.from_amount, quote.router, signer)
            .await?;

        self.encode_with(quote, recipient, slippage_bps, Some(signed))
    }

    fn encode_with(
        &self,
        quote: &SwapQuote,
        recipient: Address,
        slippage_bps: u32,
        permit: Option<crate::execution::SignedPermit>,
    ) -> Result<TxPayload> {
        validate_slippage(slippage_bps)?;
        let ctx = self.context(quote.chain_id)?;
        let venue = ctx
            .venues
            .iter()
            .find(|v| v.venue() == quote.venue)
            .ok_or_else(|| EngineError::missing(quote.chain_id, format!("{} venue", quote.venue)))?;

        let params = SwapParams {
            recipient,
            slippage_bps,
            deadline: deadline_from_now(self.settings.deadline_secs),
            permit,
        };
        venue.encode(quote, &params)
    }

    /// SpokePool deposit for a cross-chain quote
    pub fn build_bridge_transaction(&self, quote: &BridgeQuote, sender: Address) -> Result<TxPayload> {
        let bridge = self
            .bridge
            .as_ref()
            .ok_or_else(|| EngineError::missing(quote.source_chain_id, "bridge venue"))?;
        bridge.build_transaction(quote, sender)
    }

    async fn gas_price(&self, reader: Option<&dyn ChainReader>) -> u128 {
        let fallback = self.settings.gas_price_fallback_wei;
        let Some(reader) = reader else {
            return fallback;
        };
        match reader.gas_price().await {
            Ok(price) => price,
            Err(e) => {
                warn!(
                    "Gas price read failed on chain {}, using fallback {} wei: {}",
                    reader.chain_id(),
                    fallback,
                    e
                );
                fallback
            }
        }
    }

    async fn native_usd(&self, chain: &ChainDeployment) -> Option<Decimal> {
        let oracle = self.oracle.as_ref()?;
        let asset = PriceAsset::Coin(chain.native_coin_id.clone());
        match oracle.usd_price(chain.chain_id, &asset).await {
            Ok(price) => price,
            Err(e) => {
                debug!("No USD price for {} on chain {}: {}", chain.native_symbol, chain.chain_id, e);
                None
            }
        }
    }

    async fn token_info(&self, chain_id: u64, token: Address) -> Option<TokenInfo> {
        let chain = self.registry.get(chain_id).ok()?;
        let ctx = self.chains.get(&chain_id)?;
        self.token_metadata
            .resolve(ctx.reader.as_ref(), chain, &[token])
            .await
            .remove(&token)
    }
}

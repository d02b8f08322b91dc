//! Core data structures shared by the path builder, quoters, encoder
//! and aggregation service.

use crate::error::{EngineError, Result};
use alloy::primitives::{address, Address, Bytes, U256};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Sentinel address for the chain's native currency (ETH, POL, ...)
pub const NATIVE_TOKEN: Address = address!("EeeeeEeeeEeEeeEeEeEeeEEEeeeeEeeeeeeeEEeE");

/// Maximum slippage tolerance (exclusive) in basis points
pub const MAX_SLIPPAGE_BPS: u32 = 10_000;

pub fn is_native(token: Address) -> bool {
    token == NATIVE_TOKEN
}

/// Liquidity venue families the engine knows how to price and encode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Venue {
    UniswapV3, // fee-tier pools, priced through QuoterV2
    UniswapV2, // constant product pairs (Uniswap V2, QuickSwap, Sushi V2)
    Across,    // cross-chain bridge
}

/// How a venue's pools are parameterized
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolVersion {
    TierBased,
    ReserveBased,
}

impl Venue {
    pub fn version(&self) -> Option<PoolVersion> {
        match self {
            Venue::UniswapV3 => Some(PoolVersion::TierBased),
            Venue::UniswapV2 => Some(PoolVersion::ReserveBased),
            Venue::Across => None,
        }
    }

    pub fn is_bridge(&self) -> bool {
        matches!(self, Venue::Across)
    }
}

impl fmt::Display for Venue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Venue::UniswapV3 => write!(f, "uniswap_v3"),
            Venue::UniswapV2 => write!(f, "uniswap_v2"),
            Venue::Across => write!(f, "across"),
        }
    }
}

/// One liquidity venue instance. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pool {
    /// Derived via CREATE2, never looked up on-chain
    pub address: Address,
    pub token0: Address,
    pub token1: Address,
    pub venue: Venue,
    pub version: PoolVersion,
    /// Fee tier in hundredths of a bip (500 = 0.05%); tier-based venues only
    pub fee_tier: Option<u32>,
}

impl Pool {
    pub fn contains(&self, token: Address) -> bool {
        self.token0 == token || self.token1 == token
    }
}

/// Ordered 1-2 hop route through concrete pools
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapPath {
    pub tokens: Vec<Address>,
    pub pools: Vec<Pool>,
    /// token ‖ fee ‖ token ‖ ... packing; tier-based venues only
    pub encoded: Option<Bytes>,
}

impl SwapPath {
    /// Build a path, enforcing the hop invariants.
    pub fn new(tokens: Vec<Address>, pools: Vec<Pool>, encoded: Option<Bytes>) -> Result<Self> {
        if pools.is_empty() || pools.len() > 2 {
            return Err(EngineError::InvalidInput(format!(
                "path must have 1 or 2 pools, got {}",
                pools.len()
            )));
        }
        if tokens.len() != pools.len() + 1 {
            return Err(EngineError::InvalidInput(format!(
                "path has {} tokens for {} pools",
                tokens.len(),
                pools.len()
            )));
        }
        for (i, pool) in pools.iter().enumerate() {
            if !pool.contains(tokens[i]) || !pool.contains(tokens[i + 1]) {
                return Err(EngineError::InvalidInput(format!(
                    "pool {} does not connect {} -> {}",
                    pool.address,
                    tokens[i],
                    tokens[i + 1]
                )));
            }
        }
        Ok(Self {
            tokens,
            pools,
            encoded,
        })
    }

    pub fn token_in(&self) -> Address {
        self.tokens[0]
    }

    pub fn token_out(&self) -> Address {
        self.tokens[self.tokens.len() - 1]
    }

    pub fn hops(&self) -> usize {
        self.pools.len()
    }

    /// Fee tiers per hop (empty for reserve-based paths)
    pub fn fee_tiers(&self) -> Vec<u32> {
        self.pools.iter().filter_map(|p| p.fee_tier).collect()
    }
}

/// Priced result for one venue and one path. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapQuote {
    pub chain_id: u64,
    /// Requested input token (may be NATIVE_TOKEN)
    pub from_token: Address,
    /// Requested output token (may be NATIVE_TOKEN)
    pub to_token: Address,
    pub from_amount: U256,
    pub to_amount: U256,
    pub venue: Venue,
    pub router: Address,
    pub estimated_gas: u64,
    /// Informational; denominated in the input token
    pub venue_fee: U256,
    pub path: SwapPath,
    pub pool: Pool,
    pub intermediate_pool: Option<Pool>,
}

/// Finished transaction payload handed to the execution layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxPayload {
    pub to: Address,
    pub data: Bytes,
    pub value: U256,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenInfo {
    pub address: Address,
    pub symbol: String,
    pub decimals: u8,
}

/// Bridge quote returned by a bridge venue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeQuote {
    pub venue: Venue,
    pub source_chain_id: u64,
    pub target_chain_id: u64,
    pub input_token: Address,
    pub output_token: Address,
    pub input_amount: U256,
    /// Amount delivered on the target chain after relay fees
    pub output_amount: U256,
    pub total_fee: U256,
    pub recipient: Address,
    pub spoke_pool: Address,
    pub exclusive_relayer: Address,
    pub quote_timestamp: u32,
    pub fill_deadline: u32,
    pub exclusivity_deadline: u32,
}

/// One step of a venue-agnostic route
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RouteStep {
    Approve {
        token: Address,
        spender: Address,
        amount: U256,
    },
    Swap {
        venue: Venue,
        router: Address,
        from_token: Address,
        to_token: Address,
        from_amount: U256,
        to_amount: U256,
        to_amount_min: U256,
    },
    Bridge {
        venue: Venue,
        source_chain_id: u64,
        target_chain_id: u64,
        from_token: Address,
        to_token: Address,
        from_amount: U256,
        to_amount: U256,
        to_amount_min: U256,
    },
}

/// Fee breakdown; fields that do not apply are zero
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeBreakdown {
    pub gas_estimate: u64,
    pub gas_price: u128,
    pub gas_cost_native: U256,
    pub venue_fee: U256,
    pub protocol_fee: U256,
    pub bridge_fee: U256,
    pub total_fee_native: U256,
    /// Best-effort; omitted when the price oracle is unavailable
    pub total_fee_usd: Option<Decimal>,
}

/// Aggregation output returned to callers. Data only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteResult {
    pub venue: Venue,
    pub source_chain_id: u64,
    pub target_chain_id: u64,
    pub from_amount: U256,
    pub to_amount: U256,
    pub to_amount_min: U256,
    pub slippage_bps: u32,
    pub steps: Vec<RouteStep>,
    pub fees: FeeBreakdown,
    pub from_token_info: Option<TokenInfo>,
    pub to_token_info: Option<TokenInfo>,
    /// Present for same-chain swap routes; input to transaction building
    pub swap_quote: Option<SwapQuote>,
    /// Present for cross-chain routes
    pub bridge_quote: Option<BridgeQuote>,
}

/// A desired swap, same-chain or cross-chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteRequest {
    pub source_chain_id: u64,
    pub target_chain_id: u64,
    pub from_token: Address,
    pub to_token: Address,
    pub amount: U256,
    pub sender: Address,
    #[serde(default)]
    pub recipient: Option<Address>,
    #[serde(default)]
    pub slippage_bps: Option<u32>,
    /// Explicit pivot tokens for two-hop routing
    #[serde(default)]
    pub intermediate_tokens: Vec<Address>,
}

impl QuoteRequest {
    pub fn is_cross_chain(&self) -> bool {
        self.source_chain_id != self.target_chain_id
    }

    pub fn recipient(&self) -> Address {
        self.recipient.unwrap_or(self.sender)
    }

    /// Reject malformed requests before any network call
    pub fn validate(&self) -> Result<()> {
        if self.amount.is_zero() {
            return Err(EngineError::InvalidInput("amount must be greater than zero".into()));
        }
        if !self.is_cross_chain() && self.from_token == self.to_token {
            return Err(EngineError::InvalidInput(
                "source and target token are identical".into(),
            ));
        }
        if let Some(bps) = self.slippage_bps {
            validate_slippage(bps)?;
        }
        if self.recipient() == Address::ZERO {
            return Err(EngineError::InvalidInput("recipient is the zero address".into()));
        }
        Ok(())
    }
}

pub fn validate_slippage(slippage_bps: u32) -> Result<()> {
    if slippage_bps >= MAX_SLIPPAGE_BPS {
        return Err(EngineError::InvalidInput(format!(
            "slippage {} bps out of range [0, {})",
            slippage_bps, MAX_SLIPPAGE_BPS
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> QuoteRequest {
        QuoteRequest {
            source_chain_id: 1,
            target_chain_id: 1,
            from_token: Address::repeat_byte(0x11),
            to_token: Address::repeat_byte(0x22),
            amount: U256::from(1_000u64),
            sender: Address::repeat_byte(0x33),
            recipient: None,
            slippage_bps: Some(50),
            intermediate_tokens: vec![],
        }
    }

    fn pool(a: u8, b: u8) -> Pool {
        Pool {
            address: Address::repeat_byte(0xaa),
            token0: Address::repeat_byte(a),
            token1: Address::repeat_byte(b),
            venue: Venue::UniswapV3,
            version: PoolVersion::TierBased,
            fee_tier: Some(3000),
        }
    }

    #[test]
    fn test_valid_request() {
        assert!(request().validate().is_ok());
    }

    #[test]
    fn test_rejects_zero_amount() {
        let mut req = request();
        req.amount = U256::ZERO;
        assert!(matches!(req.validate(), Err(EngineError::InvalidInput(_))));
    }

    #[test]
    fn test_rejects_identical_tokens_same_chain() {
        let mut req = request();
        req.to_token = req.from_token;
        assert!(req.validate().is_err());

        // Same token across chains is a plain bridge transfer
        req.target_chain_id = 10;
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_rejects_slippage_out_of_range() {
        let mut req = request();
        req.slippage_bps = Some(10_000);
        assert!(req.validate().is_err());
        req.slippage_bps = Some(9_999);
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_rejects_zero_recipient() {
        let mut req = request();
        req.recipient = Some(Address::ZERO);
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_swap_path_invariants() {
        let a = Address::repeat_byte(1);
        let b = Address::repeat_byte(2);
        let c = Address::repeat_byte(3);

        let path = SwapPath::new(vec![a, b, c], vec![pool(1, 2), pool(2, 3)], None).unwrap();
        assert_eq!(path.hops(), 2);
        assert_eq!(path.token_out(), c);
        assert_eq!(path.fee_tiers(), vec![3000, 3000]);

        // Pools that do not share the pivot
        assert!(SwapPath::new(vec![a, b, c], vec![pool(1, 2), pool(1, 3)], None).is_err());
        // Token count mismatch
        assert!(SwapPath::new(vec![a, b], vec![pool(1, 2), pool(2, 3)], None).is_err());
        // Empty
        assert!(SwapPath::new(vec![a], vec![], None).is_err());
    }
}

//! Token/Chain Registry
//!
//! Reference data per chain: canonical wrapped-native token, venue
//! deployments (factory, quoter, init-code hash), Universal Router,
//! Permit2, Multicall3, Across SpokePool and a handful of well-known
//! tokens. Built-in defaults cover Ethereum, Optimism, Polygon, Base
//! and Arbitrum; configuration may override any of it.

use crate::error::{EngineError, Result};
use crate::types::{is_native, Venue};
use alloy::primitives::{address, b256, Address, B256};
use once_cell::sync::Lazy;
use std::collections::HashMap;

pub const CHAIN_ETHEREUM: u64 = 1;
pub const CHAIN_OPTIMISM: u64 = 10;
pub const CHAIN_POLYGON: u64 = 137;
pub const CHAIN_BASE: u64 = 8453;
pub const CHAIN_ARBITRUM: u64 = 42161;

/// Permit2 is deployed at the same address on every supported chain
pub const PERMIT2_ADDRESS: Address = address!("000000000022D473030F116dDEE9F6B43aC78BA3");

/// Multicall3 deployed address (same on all EVM chains)
pub const MULTICALL3_ADDRESS: Address = address!("cA11bde05977b3631167028862bE2a173976CA11");

/// keccak256 of the Uniswap V3 pool creation code
pub const UNISWAP_V3_POOL_INIT_CODE_HASH: B256 =
    b256!("e34f199b19b2b4f47f68442619d555527d244f78a3297ea89325f843f87b8b54");

/// keccak256 of the Uniswap V2 pair creation code
pub const UNISWAP_V2_PAIR_INIT_CODE_HASH: B256 =
    b256!("96e8ac4277198ff8b6f785478aa9a39f403cb768dd02cbee326c3e7da348845f");

const UNISWAP_V3_FACTORY: Address = address!("1F98431c8aD98523631AE4a59f267346ea31F984");
const UNISWAP_V3_QUOTER_V2: Address = address!("61fFE014bA17989E743c5F6cB21bF9697530B21e");

/// Fee-tier venue deployment (Uniswap V3 family)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierVenueDeployment {
    pub factory: Address,
    pub quoter: Address,
    pub pool_init_code_hash: B256,
}

/// Reserve-based venue deployment (Uniswap V2 family)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReserveVenueDeployment {
    pub factory: Address,
    pub pair_init_code_hash: B256,
    /// Swap fee in thousandths (3 = 0.3%)
    pub fee_units: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainDeployment {
    pub chain_id: u64,
    pub name: String,
    pub wrapped_native: Option<Address>,
    pub uniswap_v3: Option<TierVenueDeployment>,
    pub uniswap_v2: Option<ReserveVenueDeployment>,
    pub universal_router: Option<Address>,
    pub permit2: Address,
    pub multicall3: Address,
    pub spoke_pool: Option<Address>,
    /// CoinGecko asset platform id (token price lookups)
    pub coingecko_platform: String,
    /// CoinGecko coin id of the native currency
    pub native_coin_id: String,
    pub native_symbol: String,
    /// Well-known tokens by upper-case symbol
    pub tokens: HashMap<String, Address>,
    /// Tokens deep enough to be paired directly with anything
    pub direct_pair_tokens: Vec<Address>,
    /// Venues quoted on this chain, in quoting order
    pub enabled_venues: Vec<Venue>,
}

impl ChainDeployment {
    /// Chain with only the address-stable contracts (Permit2, Multicall3)
    /// filled in; everything else comes from configuration.
    pub fn bare(chain_id: u64) -> Self {
        Self {
            chain_id,
            name: format!("chain-{}", chain_id),
            wrapped_native: None,
            uniswap_v3: None,
            uniswap_v2: None,
            universal_router: None,
            permit2: PERMIT2_ADDRESS,
            multicall3: MULTICALL3_ADDRESS,
            spoke_pool: None,
            coingecko_platform: String::new(),
            native_coin_id: "ethereum".to_string(),
            native_symbol: "ETH".to_string(),
            tokens: HashMap::new(),
            direct_pair_tokens: Vec::new(),
            enabled_venues: vec![Venue::UniswapV3, Venue::UniswapV2],
        }
    }

    pub fn wrapped_native(&self) -> Result<Address> {
        self.wrapped_native
            .ok_or_else(|| EngineError::missing(self.chain_id, "wrapped native token"))
    }

    pub fn universal_router(&self) -> Result<Address> {
        self.universal_router
            .ok_or_else(|| EngineError::missing(self.chain_id, "universal router"))
    }

    pub fn spoke_pool(&self) -> Result<Address> {
        self.spoke_pool
            .ok_or_else(|| EngineError::missing(self.chain_id, "across spoke pool"))
    }

    /// Replace the native sentinel with the wrapped-native token
    pub fn pricing_token(&self, token: Address) -> Result<Address> {
        if is_native(token) {
            self.wrapped_native()
        } else {
            Ok(token)
        }
    }

    pub fn is_wrapped_native(&self, token: Address) -> bool {
        self.wrapped_native == Some(token)
    }

    pub fn token(&self, symbol: &str) -> Option<Address> {
        self.tokens.get(&symbol.to_uppercase()).copied()
    }

    pub fn symbol_of(&self, token: Address) -> Option<&str> {
        self.tokens
            .iter()
            .find(|(_, addr)| **addr == token)
            .map(|(symbol, _)| symbol.as_str())
    }
}

#[allow(clippy::too_many_arguments)]
fn deployment(
    chain_id: u64,
    name: &str,
    wrapped_native: Address,
    v3_factory: Address,
    v3_quoter: Address,
    v2_factory: Address,
    universal_router: Address,
    spoke_pool: Address,
    coingecko_platform: &str,
    native_coin_id: &str,
    native_symbol: &str,
    tokens: &[(&str, Address)],
    direct_pair_symbols: &[&str],
) -> ChainDeployment {
    let tokens: HashMap<String, Address> = tokens
        .iter()
        .map(|(symbol, addr)| (symbol.to_string(), *addr))
        .collect();
    let direct_pair_tokens = direct_pair_symbols
        .iter()
        .filter_map(|s| tokens.get(*s).copied())
        .collect();

    ChainDeployment {
        chain_id,
        name: name.to_string(),
        wrapped_native: Some(wrapped_native),
        uniswap_v3: Some(TierVenueDeployment {
            factory: v3_factory,
            quoter: v3_quoter,
            pool_init_code_hash: UNISWAP_V3_POOL_INIT_CODE_HASH,
        }),
        uniswap_v2: Some(ReserveVenueDeployment {
            factory: v2_factory,
            pair_init_code_hash: UNISWAP_V2_PAIR_INIT_CODE_HASH,
            fee_units: 3,
        }),
        universal_router: Some(universal_router),
        permit2: PERMIT2_ADDRESS,
        multicall3: MULTICALL3_ADDRESS,
        spoke_pool: Some(spoke_pool),
        coingecko_platform: coingecko_platform.to_string(),
        native_coin_id: native_coin_id.to_string(),
        native_symbol: native_symbol.to_string(),
        tokens,
        direct_pair_tokens,
        enabled_venues: vec![Venue::UniswapV3, Venue::UniswapV2],
    }
}

static DEFAULT_DEPLOYMENTS: Lazy<HashMap<u64, ChainDeployment>> = Lazy::new(|| {
    let mut m = HashMap::new();

    m.insert(
        CHAIN_ETHEREUM,
        deployment(
            CHAIN_ETHEREUM,
            "ethereum",
            address!("C02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2"),
            UNISWAP_V3_FACTORY,
            UNISWAP_V3_QUOTER_V2,
            address!("5C69bEe701ef814a2B6a3EDD4B1652CB9cc5aA6f"),
            address!("3fC91A3afd70395Cd496C647d5a6CC9D4B2b7FAD"),
            address!("5c7BCd6E7De5423a257D81B442095A1a6ced35C5"),
            "ethereum",
            "ethereum",
            "ETH",
            &[
                ("WETH", address!("C02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2")),
                ("USDC", address!("A0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48")),
                ("USDT", address!("dAC17F958D2ee523a2206206994597C13D831ec7")),
            ],
            &["USDC", "USDT"],
        ),
    );

    m.insert(
        CHAIN_OPTIMISM,
        deployment(
            CHAIN_OPTIMISM,
            "optimism",
            address!("4200000000000000000000000000000000000006"),
            UNISWAP_V3_FACTORY,
            UNISWAP_V3_QUOTER_V2,
            address!("0c3c1c532F1e39EdF36BE9Fe0bE1410313E074Bf"),
            address!("Cb1355ff08Ab38bBCE60111F1bb2B784bE25D7e8"),
            address!("6f26Bf09B1C792e3228e5467807a900A503c0281"),
            "optimistic-ethereum",
            "ethereum",
            "ETH",
            &[
                ("WETH", address!("4200000000000000000000000000000000000006")),
                ("USDC", address!("0b2C639c533813f4Aa9D7837CAf62653d097Ff85")),
            ],
            &["USDC"],
        ),
    );

    m.insert(
        CHAIN_POLYGON,
        deployment(
            CHAIN_POLYGON,
            "polygon",
            address!("0d500B1d8E8eF31E21C99d1Db9A6444d3ADf1270"),
            UNISWAP_V3_FACTORY,
            UNISWAP_V3_QUOTER_V2,
            address!("9e5A52f57b3038F1B8EeE45F28b3C1967e22799C"),
            address!("ec7BE89e9d109e7e3Fec59c222CF297125FEFda2"),
            address!("9295ee1d8C5b022Be115A2AD3c30C72E34e7F096"),
            "polygon-pos",
            "polygon-ecosystem-token",
            "POL",
            &[
                ("WPOL", address!("0d500B1d8E8eF31E21C99d1Db9A6444d3ADf1270")),
                ("WETH", address!("7ceB23fD6bC0adD59E62ac25578270cFf1b9f619")),
                ("USDC", address!("3c499c542cEF5E3811e1192ce70d8cC03d5c3359")),
                ("USDT", address!("c2132D05D31c914a87C6611C10748AEb04B58e8F")),
            ],
            &["USDC", "USDT"],
        ),
    );

    m.insert(
        CHAIN_BASE,
        deployment(
            CHAIN_BASE,
            "base",
            address!("4200000000000000000000000000000000000006"),
            address!("33128a8fC17869897dcE68Ed026d694621f6FDfD"),
            address!("3d4e44Eb1374240CE5F1B871ab261CD16335B76a"),
            address!("8909Dc15e40173Ff4699343b6eB8132c65e18eC6"),
            address!("3fC91A3afd70395Cd496C647d5a6CC9D4B2b7FAD"),
            address!("09aea4b2242abC8bb4BB78D537A67a245A7bEC64"),
            "base",
            "ethereum",
            "ETH",
            &[
                ("WETH", address!("4200000000000000000000000000000000000006")),
                ("USDC", address!("833589fCD6eDb6E08f4c7C32D4f71b54bdA02913")),
            ],
            &["USDC"],
        ),
    );

    m.insert(
        CHAIN_ARBITRUM,
        deployment(
            CHAIN_ARBITRUM,
            "arbitrum",
            address!("82aF49447D8a07e3bd95BD0d56f35241523fBab1"),
            UNISWAP_V3_FACTORY,
            UNISWAP_V3_QUOTER_V2,
            address!("f1D7CC64Fb4452F05c498126312eBE29f30Fbcf9"),
            address!("5E325eDA8064b456f4781070C0738d849c824258"),
            address!("e35e9842fceaCA96570B734083f4a58e8F7C5f2A"),
            "arbitrum-one",
            "ethereum",
            "ETH",
            &[
                ("WETH", address!("82aF49447D8a07e3bd95BD0d56f35241523fBab1")),
                ("USDC", address!("af88d065e77c8cC2239327C5EDb3A432268e5831")),
                ("USDT", address!("Fd086bC7CD5C481DCC9C85ebE478A1C0b69FCbb9")),
            ],
            &["USDC", "USDT"],
        ),
    );

    m
});

/// Per-chain reference data, keyed by chain id
#[derive(Debug, Clone, Default)]
pub struct ChainRegistry {
    chains: HashMap<u64, ChainDeployment>,
}

impl ChainRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Registry seeded with the built-in deployments
    pub fn with_defaults() -> Self {
        Self {
            chains: DEFAULT_DEPLOYMENTS.clone(),
        }
    }

    pub fn insert(&mut self, deployment: ChainDeployment) {
        self.chains.insert(deployment.chain_id, deployment);
    }

    pub fn get(&self, chain_id: u64) -> Result<&ChainDeployment> {
        self.chains
            .get(&chain_id)
            .ok_or_else(|| EngineError::missing(chain_id, "chain deployment"))
    }

    pub fn get_mut(&mut self, chain_id: u64) -> Option<&mut ChainDeployment> {
        self.chains.get_mut(&chain_id)
    }

    pub fn chain_ids(&self) -> Vec<u64> {
        let mut ids: Vec<u64> = self.chains.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Map a token on one chain to the same asset on another, by symbol.
    /// The native sentinel maps to itself.
    pub fn map_token(&self, from_chain: u64, token: Address, to_chain: u64) -> Option<Address> {
        if is_native(token) {
            return Some(token);
        }
        let source = self.get(from_chain).ok()?;
        let symbol = source.symbol_of(token)?;
        self.get(to_chain).ok()?.token(symbol)
    }
}

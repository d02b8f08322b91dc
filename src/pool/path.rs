//! Path Builder
//!
//! Decides between single-hop and two-hop routing, derives pool identities
//! deterministically (CREATE2, same as the venue factories) and packs
//! fee-tier paths into the `token ‖ fee ‖ token` byte layout.
//!
//! Token ordering: pools sort their tokens by address (token0 < token1).
//! Byte-wise comparison of addresses is identical to case-insensitive
//! comparison of their hex strings.

use crate::error::{EngineError, Result};
use crate::registry::{ChainDeployment, ReserveVenueDeployment, TierVenueDeployment};
use crate::types::{Pool, PoolVersion, SwapPath, Venue};
use alloy::primitives::aliases::U24;
use alloy::primitives::{keccak256, Address, Bytes};
use alloy::sol_types::SolValue;
use tracing::debug;

const ADDRESS_BYTES: usize = 20;
const FEE_BYTES: usize = 3;
const HOP_BYTES: usize = ADDRESS_BYTES + FEE_BYTES;

/// Largest value a uint24 fee can hold
const MAX_FEE: u32 = 0xFF_FFFF;

/// uint24 fee for contract calls; out-of-range bits are dropped
pub(crate) fn fee_to_u24(fee: u32) -> U24 {
    U24::from(fee & MAX_FEE)
}

/// Token sequence chosen by the path builder, before any venue picks pools
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateRoute {
    pub tokens: Vec<Address>,
}

impl CandidateRoute {
    pub fn is_single_hop(&self) -> bool {
        self.tokens.len() == 2
    }

    pub fn intermediate(&self) -> Option<Address> {
        if self.tokens.len() == 3 {
            Some(self.tokens[1])
        } else {
            None
        }
    }
}

/// Canonical (token0, token1) ordering
pub fn sort_tokens(a: Address, b: Address) -> (Address, Address) {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Uniswap V3 style pool address: CREATE2(factory, keccak(abi.encode(t0, t1, fee)), initCodeHash)
pub fn derive_tier_pool_address(
    deployment: &TierVenueDeployment,
    token_a: Address,
    token_b: Address,
    fee: u32,
) -> Address {
    let (token0, token1) = sort_tokens(token_a, token_b);
    let salt = keccak256((token0, token1, fee_to_u24(fee)).abi_encode());
    deployment
        .factory
        .create2(salt.0, deployment.pool_init_code_hash.0)
}

/// Uniswap V2 style pair address: CREATE2(factory, keccak(t0 ‖ t1), initCodeHash)
pub fn derive_reserve_pool_address(
    deployment: &ReserveVenueDeployment,
    token_a: Address,
    token_b: Address,
) -> Address {
    let (token0, token1) = sort_tokens(token_a, token_b);
    let mut packed = Vec::with_capacity(ADDRESS_BYTES * 2);
    packed.extend_from_slice(token0.as_slice());
    packed.extend_from_slice(token1.as_slice());
    let salt = keccak256(packed);
    deployment
        .factory
        .create2(salt.0, deployment.pair_init_code_hash.0)
}

/// Pool identity on `chain` for `venue`. Tier-based venues need `fee`.
pub fn derive_pool_address(
    chain: &ChainDeployment,
    venue: Venue,
    token_a: Address,
    token_b: Address,
    fee: Option<u32>,
) -> Result<Address> {
    match (venue.version(), fee) {
        (Some(PoolVersion::TierBased), Some(fee)) => {
            let deployment = chain
                .uniswap_v3
                .as_ref()
                .ok_or_else(|| EngineError::missing(chain.chain_id, "uniswap_v3 deployment"))?;
            Ok(derive_tier_pool_address(deployment, token_a, token_b, fee))
        }
        (Some(PoolVersion::TierBased), None) => Err(EngineError::InvalidInput(format!(
            "{} pool identity needs a fee tier",
            venue
        ))),
        (Some(PoolVersion::ReserveBased), _) => {
            let deployment = chain
                .uniswap_v2
                .as_ref()
                .ok_or_else(|| EngineError::missing(chain.chain_id, "uniswap_v2 deployment"))?;
            Ok(derive_reserve_pool_address(deployment, token_a, token_b))
        }
        (None, _) => Err(EngineError::InvalidInput(format!("{} has no pools", venue))),
    }
}

pub fn tier_pool(
    deployment: &TierVenueDeployment,
    token_a: Address,
    token_b: Address,
    fee: u32,
) -> Pool {
    let (token0, token1) = sort_tokens(token_a, token_b);
    Pool {
        address: derive_tier_pool_address(deployment, token0, token1, fee),
        token0,
        token1,
        venue: Venue::UniswapV3,
        version: PoolVersion::TierBased,
        fee_tier: Some(fee),
    }
}

pub fn reserve_pool(deployment: &ReserveVenueDeployment, token_a: Address, token_b: Address) -> Pool {
    let (token0, token1) = sort_tokens(token_a, token_b);
    Pool {
        address: derive_reserve_pool_address(deployment, token0, token1),
        token0,
        token1,
        venue: Venue::UniswapV2,
        version: PoolVersion::ReserveBased,
        fee_tier: None,
    }
}

/// Pack a fee-tier path: token(20) ‖ fee(3, big-endian) ‖ token(20) ‖ ...
pub fn encode_path(tokens: &[Address], fees: &[u32]) -> Result<Bytes> {
    if tokens.len() < 2 || fees.len() + 1 != tokens.len() {
        return Err(EngineError::InvalidInput(format!(
            "path needs len(tokens) == len(fees) + 1, got {} tokens and {} fees",
            tokens.len(),
            fees.len()
        )));
    }
    let mut out = Vec::with_capacity(ADDRESS_BYTES + fees.len() * HOP_BYTES);
    out.extend_from_slice(tokens[0].as_slice());
    for (i, fee) in fees.iter().enumerate() {
        if *fee > MAX_FEE {
            return Err(EngineError::InvalidInput(format!("fee {} exceeds uint24", fee)));
        }
        out.extend_from_slice(&fee.to_be_bytes()[1..]); // low 3 bytes
        out.extend_from_slice(tokens[i + 1].as_slice());
    }
    Ok(out.into())
}

/// Inverse of `encode_path`
pub fn decode_path(path: &[u8]) -> Result<(Vec<Address>, Vec<u32>)> {
    if path.len() < ADDRESS_BYTES + HOP_BYTES || (path.len() - ADDRESS_BYTES) % HOP_BYTES != 0 {
        return Err(EngineError::InvalidInput(format!(
            "malformed packed path of {} bytes",
            path.len()
        )));
    }

    let mut tokens = vec![Address::from_slice(&path[..ADDRESS_BYTES])];
    let mut fees = Vec::new();

    let mut cursor = ADDRESS_BYTES;
    while cursor + HOP_BYTES <= path.len() {
        let fee_bytes = &path[cursor..cursor + FEE_BYTES];
        fees.push(u32::from_be_bytes([0, fee_bytes[0], fee_bytes[1], fee_bytes[2]]));
        tokens.push(Address::from_slice(
            &path[cursor + FEE_BYTES..cursor + HOP_BYTES],
        ));
        cursor += HOP_BYTES;
    }

    Ok((tokens, fees))
}

/// Concrete fee-tier path for a token sequence and one fee per hop
pub fn tier_path(
    deployment: &TierVenueDeployment,
    tokens: &[Address],
    fees: &[u32],
) -> Result<SwapPath> {
    let encoded = encode_path(tokens, fees)?;
    let pools = tokens
        .windows(2)
        .zip(fees)
        .map(|(pair, fee)| tier_pool(deployment, pair[0], pair[1], *fee))
        .collect();
    SwapPath::new(tokens.to_vec(), pools, Some(encoded))
}

/// Concrete reserve-based path (plain token array, no byte packing)
pub fn reserve_path(deployment: &ReserveVenueDeployment, tokens: &[Address]) -> Result<SwapPath> {
    let pools = tokens
        .windows(2)
        .map(|pair| reserve_pool(deployment, pair[0], pair[1]))
        .collect();
    SwapPath::new(tokens.to_vec(), pools, None)
}

/// Decides single-hop vs two-hop routing for a chain
pub struct PathBuilder<'a> {
    chain: &'a ChainDeployment,
}

impl<'a> PathBuilder<'a> {
    pub fn new(chain: &'a ChainDeployment) -> Self {
        Self { chain }
    }

    /// Candidate token routes for `from -> to` (both already in pricing form,
    /// i.e. native replaced by wrapped native).
    ///
    /// An empty result means "no path": an expected outcome, not a fault.
    pub fn candidate_routes(
        &self,
        from: Address,
        to: Address,
        intermediates: &[Address],
    ) -> Vec<CandidateRoute> {
        let Some(wrapped_native) = self.chain.wrapped_native else {
            debug!(
                "No wrapped native token configured for chain {}, no path",
                self.chain.chain_id
            );
            return Vec::new();
        };

        if from == to {
            return Vec::new();
        }

        if self.is_direct(from, to, wrapped_native) {
            return vec![CandidateRoute {
                tokens: vec![from, to],
            }];
        }

        let mut pivots: Vec<Address> = Vec::new();
        for token in intermediates {
            if *token != from && *token != to && !pivots.contains(token) {
                pivots.push(*token);
            }
        }
        if pivots.is_empty() {
            pivots.push(wrapped_native);
        }

        pivots
            .into_iter()
            .map(|pivot| CandidateRoute {
                tokens: vec![from, pivot, to],
            })
            .collect()
    }

    fn is_direct(&self, from: Address, to: Address, wrapped_native: Address) -> bool {
        from == wrapped_native
            || to == wrapped_native
            || self.chain.direct_pair_tokens.contains(&from)
            || self.chain.direct_pair_tokens.contains(&to)
    }
}

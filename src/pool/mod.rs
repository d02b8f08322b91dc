//! Pool identity, path construction and constant product math.
//!
//! Pools are never looked up on-chain: addresses are derived from the
//! factory, the sorted token pair and (for fee-tier venues) the fee.

pub mod calculator;
pub mod path;

pub use calculator::{get_amount_out, get_amount_out_multi};
pub use path::{
    decode_path, derive_pool_address, derive_reserve_pool_address, derive_tier_pool_address, encode_path,
    reserve_path, sort_tokens, tier_path, CandidateRoute, PathBuilder,
};

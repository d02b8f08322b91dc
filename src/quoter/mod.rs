//! On-chain pricing: the fee-tier tournament for tier-based venues and
//! batched reserve reads for constant product venues.

pub mod reserves;
pub mod tournament;

pub use reserves::ReserveQuoter;
pub use tournament::{select_best, TierAttempt, TournamentQuoter, FEE_TIERS, TWO_HOP_FEE_COMBOS};

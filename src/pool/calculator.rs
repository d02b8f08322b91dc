//! Price Calculator
//!
//! Constant product (x * y = k) math for reserve-based pools.
//! Amounts are integer base units; every division floors.

use alloy::primitives::U256;

/// Fee denominator for reserve-based venues (fee_units are thousandths)
const FEE_DENOMINATOR: u64 = 1000;

/// Calculate amount out for a given input using the constant product formula
///
/// Formula: amount_out = (amount_in * (1000 - fee) * reserve_out) / (reserve_in * 1000 + amount_in * (1000 - fee))
///
/// `fee_units` is the swap fee in thousandths (3 = 0.3%). Returns zero on
/// empty input, empty reserves, a fee of 100% or arithmetic overflow.
pub fn get_amount_out(amount_in: U256, reserve_in: U256, reserve_out: U256, fee_units: u32) -> U256 {
    if amount_in.is_zero() || reserve_in.is_zero() || reserve_out.is_zero() {
        return U256::ZERO;
    }
    if u64::from(fee_units) >= FEE_DENOMINATOR {
        return U256::ZERO;
    }

    let fee_multiplier = U256::from(FEE_DENOMINATOR - u64::from(fee_units));
    let amount = (|| {
        let amount_in_with_fee = amount_in.checked_mul(fee_multiplier)?;
        let numerator = amount_in_with_fee.checked_mul(reserve_out)?;
        let denominator = reserve_in
            .checked_mul(U256::from(FEE_DENOMINATOR))?
            .checked_add(amount_in_with_fee)?;
        Some(numerator / denominator)
    })();

    amount.unwrap_or(U256::ZERO)
}

/// Chain get_amount_out across consecutive hops.
///
/// `reserves[i]` is (reserve_in, reserve_out) for hop i, already oriented
/// in the direction of the swap.
pub fn get_amount_out_multi(amount_in: U256, reserves: &[(U256, U256)], fee_units: u32) -> U256 {
    reserves.iter().fold(amount_in, |amount, (reserve_in, reserve_out)| {
        get_amount_out(amount, *reserve_in, *reserve_out, fee_units)
    })
}

/// `amount * numerator / denominator` without overflow, for numerator <= denominator
fn fraction_of(amount: U256, numerator: u64, denominator: u64) -> U256 {
    let numerator = U256::from(numerator.min(denominator));
    let denominator = U256::from(denominator);
    amount / denominator * numerator + amount % denominator * numerator / denominator
}

/// Venue fee over `hops` reserve-based hops, in input token units.
/// Each hop charges `fee_units` thousandths of what reaches it.
pub fn reserve_venue_fee(amount_in: U256, fee_units: u32, hops: usize) -> U256 {
    let remaining = (0..hops).fold(amount_in, |amount, _| {
        amount - fraction_of(amount, u64::from(fee_units), FEE_DENOMINATOR)
    });
    amount_in - remaining
}

/// Venue fee over a fee-tier path (tiers in hundredths of a bip), in input
/// token units. Later hops are charged on what the earlier ones left.
pub fn tier_venue_fee(amount_in: U256, fee_tiers: &[u32]) -> U256 {
    let remaining = fee_tiers
        .iter()
        .fold(amount_in, |amount, fee| amount - fraction_of(amount, u64::from(*fee), 1_000_000));
    amount_in - remaining
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_amount_out() {
        // 1000 tokens in, 100000/100000 reserves, 0.3% fee
        let amount_in = U256::from(1000u64);
        let reserve = U256::from(100_000u64);

        let amount_out = get_amount_out(amount_in, reserve, reserve, 3);

        // (1000 * 997 * 100000) / (100000 * 1000 + 1000 * 997) = 987
        assert_eq!(amount_out, U256::from(987u64));
    }

    #[test]
    fn test_get_amount_out_known_reserves() {
        // in=1e18, reserves (1e21, 2e21), fee 3
        let amount_in = U256::from(10u64).pow(U256::from(18u64));
        let reserve_in = U256::from(10u64).pow(U256::from(21u64));
        let reserve_out = reserve_in * U256::from(2u64);

        let expected = amount_in * U256::from(997u64) * reserve_out
            / (reserve_in * U256::from(1000u64) + amount_in * U256::from(997u64));
        let amount_out = get_amount_out(amount_in, reserve_in, reserve_out, 3);
        assert_eq!(amount_out, expected);
        // about 1.99 tokens out
        assert!(amount_out > U256::from(1_990_000_000_000_000_000u128));
        assert!(amount_out < U256::from(1_993_000_000_000_000_000u128));
    }

    #[test]
    fn test_get_amount_out_zero_cases() {
        let r = U256::from(1_000_000u64);
        assert_eq!(get_amount_out(U256::ZERO, r, r, 3), U256::ZERO);
        assert_eq!(get_amount_out(r, U256::ZERO, r, 3), U256::ZERO);
        assert_eq!(get_amount_out(r, r, U256::ZERO, 3), U256::ZERO);
        assert_eq!(get_amount_out(r, r, r, 1000), U256::ZERO);
        assert_eq!(get_amount_out(U256::MAX, r, r, 3), U256::ZERO);
    }

    #[test]
    fn test_multi_hop_chains_outputs() {
        let r = U256::from(1_000_000u64);
        let one_hop = get_amount_out(U256::from(1000u64), r, r, 3);
        let two_hop = get_amount_out_multi(U256::from(1000u64), &[(r, r), (r, r)], 3);
        assert_eq!(two_hop, get_amount_out(one_hop, r, r, 3));
        assert!(get_amount_out_multi(U256::from(1000u64), &[(r, r), (r, U256::ZERO)], 3).is_zero());
    }

    #[test]
    fn test_venue_fees() {
        assert_eq!(reserve_venue_fee(U256::from(10_000u64), 3, 1), U256::from(30u64));
        assert_eq!(tier_venue_fee(U256::from(1_000_000u64), &[500]), U256::from(500u64));
        assert!(tier_venue_fee(U256::from(1_000_000u64), &[]).is_zero());
    }

    #[test]
    fn test_venue_fees_cover_every_hop() {
        // 0.05% then 0.3% on the remaining 999_500
        let amount = U256::from(1_000_000u64);
        assert_eq!(tier_venue_fee(amount, &[500, 3000]), U256::from(500u64 + 2_998));
        // 0.3% of 1_000_000, then 0.3% of 997_000
        assert_eq!(reserve_venue_fee(amount, 3, 2), U256::from(3_000u64 + 2_991));
        assert!(tier_venue_fee(amount, &[500, 3000]) > tier_venue_fee(amount, &[500]));
        // no overflow at the top of the range
        assert!(tier_venue_fee(U256::MAX, &[10_000, 10_000]) < U256::MAX);
    }
}

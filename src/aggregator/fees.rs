//! Fee totals
//!
//! total_fee_native = gas_estimate * gas_price + venue fee (+ bridge fee)
//! Token-denominated fees only count towards the native total when the
//! input token is the native coin or its wrapped form.

use crate::types::FeeBreakdown;
use alloy::primitives::U256;
use rust_decimal::Decimal;

pub const GWEI: u128 = 1_000_000_000;

/// Native coin has 18 decimals on every supported chain
const NATIVE_DECIMALS: u32 = 18;

/// Inputs to one fee breakdown
#[derive(Debug, Clone, Default)]
pub struct FeeInputs {
    pub gas_estimate: u64,
    pub gas_price: u128,
    /// Denominated in the input token
    pub venue_fee: U256,
    /// Denominated in the input token
    pub bridge_fee: U256,
    /// Input token is native or wrapped native, so token fees are native fees
    pub fees_in_native: bool,
    /// USD price of one native coin, when known
    pub native_usd: Option<Decimal>,
}

pub fn fee_breakdown(inputs: &FeeInputs) -> FeeBreakdown {
    let gas_cost_native = U256::from(inputs.gas_estimate) * U256::from(inputs.gas_price);

    let mut total_fee_native = gas_cost_native;
    if inputs.fees_in_native {
        total_fee_native = total_fee_native
            .saturating_add(inputs.venue_fee)
            .saturating_add(inputs.bridge_fee);
    }

    FeeBreakdown {
        gas_estimate: inputs.gas_estimate,
        gas_price: inputs.gas_price,
        gas_cost_native,
        venue_fee: inputs.venue_fee,
        protocol_fee: U256::ZERO,
        bridge_fee: inputs.bridge_fee,
        total_fee_native,
        total_fee_usd: inputs
            .native_usd
            .and_then(|price| native_to_usd(total_fee_native, price)),
    }
}

/// wei / 1e18 * price, rounded to cents precision of 6 places
pub fn native_to_usd(amount_wei: U256, native_usd: Decimal) -> Option<Decimal> {
    let wei = u128::try_from(amount_wei).ok()?;
    let wei = i128::try_from(wei).ok()?;
    let native = Decimal::try_from_i128_with_scale(wei, NATIVE_DECIMALS).ok()?;
    native.checked_mul(native_usd).map(|usd| usd.round_dp(6))
}

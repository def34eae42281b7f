//! Fixed-point precision rules.
//!
//! CRITICAL: Never use floating-point for money or quantities. Every value
//! is a `rust_decimal::Decimal` and every rounding step is half-up.

use rust_decimal::{Decimal, RoundingStrategy};

/// Fractional digits stored for monetary amounts (`numeric(18,2)`).
pub const MONEY_SCALE: u32 = 2;

/// Fractional digits stored for stock quantities (`numeric(14,4)`).
///
/// Quantities are never rounded; anything finer is rejected on input.
pub const QUANTITY_SCALE: u32 = 4;

/// Fractional digits stored for unit costs (`numeric(14,4)`).
pub const UNIT_COST_SCALE: u32 = 4;

/// Rounds a monetary amount half-up to [`MONEY_SCALE`].
#[must_use]
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// Rounds a unit cost half-up to [`UNIT_COST_SCALE`].
#[must_use]
pub fn round_unit_cost(cost: Decimal) -> Decimal {
    cost.round_dp_with_strategy(UNIT_COST_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// Returns true if `value` carries no more than `scale` significant
/// fractional digits (trailing zeros are ignored).
#[must_use]
pub fn fits_scale(value: Decimal, scale: u32) -> bool {
    value.normalize().scale() <= scale
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    #[rstest]
    #[case(dec!(2.16665), dec!(2.1667))]
    #[case(dec!(2.16664), dec!(2.1666))]
    #[case(dec!(-1.00005), dec!(-1.0001))]
    #[case(dec!(3), dec!(3))]
    fn test_round_unit_cost_half_up(#[case] input: Decimal, #[case] expected: Decimal) {
        assert_eq!(round_unit_cost(input), expected);
    }

    #[rstest]
    #[case(dec!(0.005), dec!(0.01))]
    #[case(dec!(0.004), dec!(0.00))]
    #[case(dec!(12.345), dec!(12.35))]
    fn test_round_money_half_up(#[case] input: Decimal, #[case] expected: Decimal) {
        assert_eq!(round_money(input), expected);
    }

    #[rstest]
    #[case(dec!(1.2300), 2, true)]
    #[case(dec!(1.2345), 4, true)]
    #[case(dec!(1.23456), 4, false)]
    #[case(dec!(10), 0, true)]
    fn test_fits_scale(#[case] value: Decimal, #[case] scale: u32, #[case] expected: bool) {
        assert_eq!(fits_scale(value, scale), expected);
    }
}

//! On-hand stock valuation from remaining lot layers.

use rust_decimal::Decimal;
use serde::Serialize;
use tally_shared::types::{round_money, round_unit_cost};

use super::types::LotSnapshot;

/// Value of the stock on hand for one key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StockValuation {
    /// Quantity on hand.
    pub quantity: Decimal,
    /// `Σ qty_remaining × unit_cost`, rounded to money scale.
    pub total_value: Decimal,
    /// Average unit cost, rounded to unit cost scale.
    pub average_unit_cost: Decimal,
}

/// Values the remaining quantity of `lots`.
///
/// Returns `None` when nothing is on hand.
#[must_use]
pub fn value_lots(lots: &[LotSnapshot]) -> Option<StockValuation> {
    let (quantity, value) = lots
        .iter()
        .filter(|lot| lot.qty_remaining > Decimal::ZERO)
        .fold((Decimal::ZERO, Decimal::ZERO), |(q, v), lot| {
            (q + lot.qty_remaining, v + lot.qty_remaining * lot.unit_cost)
        });

    if quantity.is_zero() {
        return None;
    }

    Some(StockValuation {
        quantity,
        total_value: round_money(value),
        average_unit_cost: round_unit_cost(value / quantity),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn lot(qty: Decimal, cost: Decimal) -> LotSnapshot {
        LotSnapshot {
            id: Uuid::now_v7(),
            received_at: Utc::now(),
            unit_cost: cost,
            qty_remaining: qty,
        }
    }

    #[test]
    fn test_value_after_partial_consumption() {
        // Remaining after selling 6 of (5 @ 2.00, 3 @ 3.00).
        let lots = vec![lot(dec!(0), dec!(2.00)), lot(dec!(2), dec!(3.00))];
        let v = value_lots(&lots).unwrap();
        assert_eq!(v.quantity, dec!(2));
        assert_eq!(v.total_value, dec!(6.00));
        assert_eq!(v.average_unit_cost, dec!(3.0000));
    }

    #[test]
    fn test_average_is_weighted() {
        let lots = vec![lot(dec!(5), dec!(2.00)), lot(dec!(3), dec!(3.00))];
        let v = value_lots(&lots).unwrap();
        assert_eq!(v.total_value, dec!(19.00));
        assert_eq!(v.average_unit_cost, dec!(2.375));
    }

    #[test]
    fn test_nothing_on_hand() {
        assert!(value_lots(&[]).is_none());
        assert!(value_lots(&[lot(dec!(0), dec!(1))]).is_none());
    }
}

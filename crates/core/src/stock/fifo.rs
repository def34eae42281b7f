//! FIFO consumption planning.
//!
//! Lots are drained strictly oldest-first: ordered by `received_at`, ties
//! broken by lot id (UUID v7, i.e. insertion order).

use rust_decimal::Decimal;
use tally_shared::types::{QUANTITY_SCALE, UNIT_COST_SCALE, fits_scale, round_unit_cost};

use super::error::StockError;
use super::types::{ConsumptionPlan, LotSnapshot, PlannedAllocation};

/// Stateless FIFO planner.
pub struct FifoPlanner;

impl FifoPlanner {
    /// Validates a move quantity.
    ///
    /// # Errors
    ///
    /// Returns `InvalidQuantity` unless strictly positive at quantity scale.
    pub fn validate_quantity(qty: Decimal) -> Result<(), StockError> {
        if qty <= Decimal::ZERO || !fits_scale(qty, QUANTITY_SCALE) {
            return Err(StockError::InvalidQuantity(qty));
        }
        Ok(())
    }

    /// Validates a receipt unit cost.
    ///
    /// # Errors
    ///
    /// Returns `InvalidCost` unless strictly positive at unit cost scale.
    pub fn validate_unit_cost(unit_cost: Decimal) -> Result<(), StockError> {
        if unit_cost <= Decimal::ZERO || !fits_scale(unit_cost, UNIT_COST_SCALE) {
            return Err(StockError::InvalidCost(unit_cost));
        }
        Ok(())
    }

    /// Sorts lots into FIFO order.
    pub fn sort_fifo(lots: &mut [LotSnapshot]) {
        lots.sort_by(|a, b| a.received_at.cmp(&b.received_at).then(a.id.cmp(&b.id)));
    }

    /// Consumes `qty` from `lots` oldest-first.
    ///
    /// `lots` is sorted in place and each touched lot's `qty_remaining` is
    /// decremented, so several lines for the same key can be planned in
    /// sequence against one snapshot.
    ///
    /// # Errors
    ///
    /// - `InvalidQuantity` for a non-positive quantity
    /// - `AllocationShortfall` if the lots run out. Callers check
    ///   availability first, so this indicates a locking bug.
    pub fn consume(lots: &mut [LotSnapshot], qty: Decimal) -> Result<ConsumptionPlan, StockError> {
        Self::validate_quantity(qty)?;
        Self::sort_fifo(lots);

        let mut remaining = qty;
        let mut allocations = Vec::new();

        for lot in lots.iter_mut() {
            if remaining.is_zero() {
                break;
            }
            if lot.qty_remaining <= Decimal::ZERO {
                continue;
            }
            let take = remaining.min(lot.qty_remaining);
            lot.qty_remaining -= take;
            remaining -= take;
            allocations.push(PlannedAllocation {
                lot_id: lot.id,
                received_at: lot.received_at,
                qty: take,
                unit_cost: lot.unit_cost,
            });
        }

        if remaining > Decimal::ZERO {
            return Err(StockError::AllocationShortfall {
                requested: qty,
                missing: remaining,
            });
        }

        let unit_cost = Self::weighted_unit_cost(&allocations);
        Ok(ConsumptionPlan {
            allocations,
            unit_cost,
        })
    }

    /// Quantity-weighted average unit cost, rounded half-up to unit cost scale.
    ///
    /// Returns zero for an empty slice.
    #[must_use]
    pub fn weighted_unit_cost(allocations: &[PlannedAllocation]) -> Decimal {
        let qty: Decimal = allocations.iter().map(|a| a.qty).sum();
        if qty.is_zero() {
            return Decimal::ZERO;
        }
        let cost: Decimal = allocations.iter().map(|a| a.qty * a.unit_cost).sum();
        round_unit_cost(cost / qty)
    }

    /// Sum of `qty_remaining` over lots.
    #[must_use]
    pub fn on_hand(lots: &[LotSnapshot]) -> Decimal {
        lots.iter()
            .map(|lot| lot.qty_remaining.max(Decimal::ZERO))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use rstest::rstest;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, d, 9, 0, 0).unwrap()
    }

    fn lot(received: u32, qty: Decimal, cost: Decimal) -> LotSnapshot {
        LotSnapshot {
            id: Uuid::now_v7(),
            received_at: day(received),
            unit_cost: cost,
            qty_remaining: qty,
        }
    }

    #[test]
    fn test_fifo_consumes_oldest_first() {
        let l1 = lot(1, dec!(5), dec!(2.00));
        let l2 = lot(2, dec!(3), dec!(3.00));
        // Deliberately out of order: the planner sorts.
        let mut lots = vec![l2.clone(), l1.clone()];

        let plan = FifoPlanner::consume(&mut lots, dec!(6)).unwrap();

        assert_eq!(plan.allocations.len(), 2);
        assert_eq!(plan.allocations[0].lot_id, l1.id);
        assert_eq!(plan.allocations[0].qty, dec!(5));
        assert_eq!(plan.allocations[0].unit_cost, dec!(2.00));
        assert_eq!(plan.allocations[1].lot_id, l2.id);
        assert_eq!(plan.allocations[1].qty, dec!(1));
        assert_eq!(plan.unit_cost, dec!(2.1667));
        assert_eq!(plan.quantity(), dec!(6));

        assert_eq!(lots[0].id, l1.id);
        assert_eq!(lots[0].qty_remaining, dec!(0));
        assert_eq!(lots[1].qty_remaining, dec!(2));
    }

    #[test]
    fn test_same_timestamp_breaks_tie_by_id() {
        let first = lot(1, dec!(1), dec!(1.00));
        let second = LotSnapshot {
            id: Uuid::now_v7(),
            ..lot(1, dec!(1), dec!(9.00))
        };
        let mut lots = vec![second.clone(), first.clone()];
        let plan = FifoPlanner::consume(&mut lots, dec!(1)).unwrap();
        assert_eq!(plan.allocations[0].lot_id, first.id);
        assert_eq!(plan.unit_cost, dec!(1.00));
    }

    #[test]
    fn test_drained_lots_are_skipped() {
        let mut lots = vec![lot(1, dec!(0), dec!(1.00)), lot(2, dec!(4), dec!(2.50))];
        let plan = FifoPlanner::consume(&mut lots, dec!(4)).unwrap();
        assert_eq!(plan.allocations.len(), 1);
        assert_eq!(plan.unit_cost, dec!(2.50));
    }

    #[test]
    fn test_sequential_lines_share_snapshot() {
        let mut lots = vec![lot(1, dec!(5), dec!(2.00)), lot(2, dec!(3), dec!(3.00))];
        let first = FifoPlanner::consume(&mut lots, dec!(4)).unwrap();
        let second = FifoPlanner::consume(&mut lots, dec!(2)).unwrap();
        assert_eq!(first.unit_cost, dec!(2.00));
        // One unit left in the first lot, then one from the second.
        assert_eq!(second.unit_cost, dec!(2.50));
        assert_eq!(FifoPlanner::on_hand(&lots), dec!(2));
    }

    #[test]
    fn test_shortfall_is_reported() {
        let mut lots = vec![lot(1, dec!(2), dec!(1.00))];
        let err = FifoPlanner::consume(&mut lots, dec!(3)).unwrap_err();
        assert!(matches!(
            err,
            StockError::AllocationShortfall { missing, .. } if missing == dec!(1)
        ));
    }

    #[rstest]
    #[case(dec!(0))]
    #[case(dec!(-1))]
    #[case(dec!(0.00001))]
    fn test_invalid_quantity(#[case] qty: Decimal) {
        let mut lots = vec![lot(1, dec!(10), dec!(1.00))];
        assert!(matches!(
            FifoPlanner::consume(&mut lots, qty),
            Err(StockError::InvalidQuantity(_))
        ));
        assert_eq!(lots[0].qty_remaining, dec!(10));
    }

    #[rstest]
    #[case(dec!(2.00), true)]
    #[case(dec!(0.0001), true)]
    #[case(dec!(0), false)]
    #[case(dec!(-2), false)]
    #[case(dec!(1.00001), false)]
    fn test_validate_unit_cost(#[case] cost: Decimal, #[case] ok: bool) {
        assert_eq!(FifoPlanner::validate_unit_cost(cost).is_ok(), ok);
    }

    #[test]
    fn test_weighted_unit_cost_rounds_half_up() {
        let allocations = vec![
            PlannedAllocation {
                lot_id: Uuid::now_v7(),
                received_at: day(1),
                qty: dec!(1),
                unit_cost: dec!(1.0000),
            },
            PlannedAllocation {
                lot_id: Uuid::now_v7(),
                received_at: day(2),
                qty: dec!(1),
                unit_cost: dec!(1.0001),
            },
        ];
        // 1.00005 rounds up.
        assert_eq!(FifoPlanner::weighted_unit_cost(&allocations), dec!(1.0001));
        assert_eq!(FifoPlanner::weighted_unit_cost(&[]), dec!(0));
    }
}

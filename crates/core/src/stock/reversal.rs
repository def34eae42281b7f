//! Reversal planning for stock moves.
//!
//! - IN is undone by an OUT of the same lines (FIFO, same warehouse).
//! - OUT is undone by recreating one lot per allocation, with the original
//!   lot's cost and receipt time, so cost layers come back exactly.
//! - TRANSFER is undone by a transfer in the opposite direction.
//! - ADJUST is undone line by line: consumed lines are restored, created
//!   lines are consumed.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use super::error::StockError;
use super::types::{LineSnapshot, MoveSnapshot, MoveType, StockKey};

/// A lot to recreate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoredLot {
    /// Receipt time of the original lot.
    pub received_at: DateTime<Utc>,
    /// Unit cost taken at allocation time.
    pub unit_cost: Decimal,
    /// Quantity to restore.
    pub qty: Decimal,
}

/// What to do for one line of the reversing move.
#[derive(Debug, Clone)]
pub enum ReversalLine {
    /// Draw the quantity FIFO from the key.
    Consume {
        /// Warehouse and item to draw from.
        key: StockKey,
        /// Quantity to draw.
        quantity: Decimal,
    },
    /// Recreate the listed lots under the key.
    Restore {
        /// Warehouse and item to restore into.
        key: StockKey,
        /// Line quantity.
        quantity: Decimal,
        /// Line unit cost.
        unit_cost: Option<Decimal>,
        /// Lots to recreate.
        lots: Vec<RestoredLot>,
    },
}

/// Plan of the reversing move.
#[derive(Debug, Clone)]
pub struct MoveReversalPlan {
    /// Type of the reversing move.
    pub move_type: MoveType,
    /// Source warehouse of a reversing transfer.
    pub from_warehouse_id: Option<Uuid>,
    /// Target warehouse of a reversing transfer.
    pub to_warehouse_id: Option<Uuid>,
    /// Lines in original order.
    pub lines: Vec<ReversalLine>,
}

/// Stateless move reversal planner.
pub struct MoveReversalService;

impl MoveReversalService {
    /// Checks that a move may be reversed.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyReversed` or `CannotReverseReversal`.
    pub fn validate_can_reverse(stock_move: &MoveSnapshot) -> Result<(), StockError> {
        if stock_move.has_reversal {
            return Err(StockError::AlreadyReversed(stock_move.id));
        }
        if stock_move.is_reversal {
            return Err(StockError::CannotReverseReversal(stock_move.id));
        }
        Ok(())
    }

    /// Plans the reversing move.
    ///
    /// # Errors
    ///
    /// Returns the `validate_can_reverse` errors, `EmptyMove` for a move
    /// without lines, or `MissingWarehouse` for a transfer without both ends.
    pub fn plan(
        stock_move: &MoveSnapshot,
        lines: &[LineSnapshot],
    ) -> Result<MoveReversalPlan, StockError> {
        Self::validate_can_reverse(stock_move)?;
        if lines.is_empty() {
            return Err(StockError::EmptyMove);
        }

        let plan = match stock_move.move_type {
            MoveType::In => MoveReversalPlan {
                move_type: MoveType::Out,
                from_warehouse_id: None,
                to_warehouse_id: None,
                lines: lines.iter().map(Self::consume_line).collect(),
            },
            MoveType::Out => MoveReversalPlan {
                move_type: MoveType::In,
                from_warehouse_id: None,
                to_warehouse_id: None,
                lines: lines.iter().map(Self::restore_line).collect(),
            },
            MoveType::Adjust => MoveReversalPlan {
                move_type: MoveType::Adjust,
                from_warehouse_id: None,
                to_warehouse_id: None,
                lines: lines
                    .iter()
                    .map(|line| {
                        if line.allocations.is_empty() {
                            Self::consume_line(line)
                        } else {
                            Self::restore_line(line)
                        }
                    })
                    .collect(),
            },
            MoveType::Transfer => {
                let (Some(from), Some(to)) =
                    (stock_move.from_warehouse_id, stock_move.to_warehouse_id)
                else {
                    return Err(StockError::MissingWarehouse(stock_move.id));
                };
                MoveReversalPlan {
                    move_type: MoveType::Transfer,
                    from_warehouse_id: Some(to),
                    to_warehouse_id: Some(from),
                    lines: lines
                        .iter()
                        .map(|line| ReversalLine::Consume {
                            key: StockKey::new(to, line.key.item_id),
                            quantity: line.quantity,
                        })
                        .collect(),
                }
            }
        };

        Ok(plan)
    }

    fn consume_line(line: &LineSnapshot) -> ReversalLine {
        ReversalLine::Consume {
            key: line.key,
            quantity: line.quantity,
        }
    }

    fn restore_line(line: &LineSnapshot) -> ReversalLine {
        ReversalLine::Restore {
            key: line.key,
            quantity: line.quantity,
            unit_cost: line.unit_cost,
            lots: line
                .allocations
                .iter()
                .map(|a| RestoredLot {
                    received_at: a.received_at,
                    unit_cost: a.unit_cost,
                    qty: a.qty,
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    use crate::stock::types::PlannedAllocation;

    fn snapshot(move_type: MoveType) -> MoveSnapshot {
        MoveSnapshot {
            id: Uuid::now_v7(),
            move_type,
            from_warehouse_id: None,
            to_warehouse_id: None,
            is_reversal: false,
            has_reversal: false,
        }
    }

    fn key() -> StockKey {
        StockKey::new(Uuid::from_u128(10), Uuid::from_u128(20))
    }

    fn consumed_line() -> LineSnapshot {
        let received = Utc.with_ymd_and_hms(2026, 1, 1, 8, 0, 0).unwrap();
        LineSnapshot {
            key: key(),
            quantity: dec!(6),
            unit_cost: Some(dec!(2.1667)),
            allocations: vec![
                PlannedAllocation {
                    lot_id: Uuid::now_v7(),
                    received_at: received,
                    qty: dec!(5),
                    unit_cost: dec!(2.00),
                },
                PlannedAllocation {
                    lot_id: Uuid::now_v7(),
                    received_at: received + chrono::Duration::days(1),
                    qty: dec!(1),
                    unit_cost: dec!(3.00),
                },
            ],
        }
    }

    fn received_line() -> LineSnapshot {
        LineSnapshot {
            key: key(),
            quantity: dec!(4),
            unit_cost: Some(dec!(1.50)),
            allocations: vec![],
        }
    }

    #[test]
    fn test_out_restores_exact_cost_layers() {
        let plan = MoveReversalService::plan(&snapshot(MoveType::Out), &[consumed_line()]).unwrap();
        assert_eq!(plan.move_type, MoveType::In);
        let ReversalLine::Restore { lots, quantity, .. } = &plan.lines[0] else {
            panic!("expected restore line");
        };
        assert_eq!(*quantity, dec!(6));
        assert_eq!(lots.len(), 2);
        assert_eq!(lots[0].unit_cost, dec!(2.00));
        assert_eq!(lots[0].qty, dec!(5));
        assert_eq!(lots[1].unit_cost, dec!(3.00));
        assert!(lots[0].received_at < lots[1].received_at);
    }

    #[test]
    fn test_in_becomes_out() {
        let plan = MoveReversalService::plan(&snapshot(MoveType::In), &[received_line()]).unwrap();
        assert_eq!(plan.move_type, MoveType::Out);
        assert!(matches!(
            plan.lines[0],
            ReversalLine::Consume { quantity, .. } if quantity == dec!(4)
        ));
    }

    #[test]
    fn test_transfer_swaps_direction() {
        let from = Uuid::from_u128(1);
        let to = Uuid::from_u128(2);
        let mut original = snapshot(MoveType::Transfer);
        original.from_warehouse_id = Some(from);
        original.to_warehouse_id = Some(to);
        let mut line = consumed_line();
        line.key = StockKey::new(from, line.key.item_id);

        let plan = MoveReversalService::plan(&original, &[line]).unwrap();

        assert_eq!(plan.from_warehouse_id, Some(to));
        assert_eq!(plan.to_warehouse_id, Some(from));
        assert!(matches!(
            plan.lines[0],
            ReversalLine::Consume { key, .. } if key.warehouse_id == to
        ));
    }

    #[test]
    fn test_transfer_without_warehouses_rejected() {
        assert!(matches!(
            MoveReversalService::plan(&snapshot(MoveType::Transfer), &[consumed_line()]),
            Err(StockError::MissingWarehouse(_))
        ));
    }

    #[test]
    fn test_adjust_reverses_per_line() {
        let plan = MoveReversalService::plan(
            &snapshot(MoveType::Adjust),
            &[received_line(), consumed_line()],
        )
        .unwrap();
        assert_eq!(plan.move_type, MoveType::Adjust);
        assert!(matches!(plan.lines[0], ReversalLine::Consume { .. }));
        assert!(matches!(plan.lines[1], ReversalLine::Restore { .. }));
    }

    #[test]
    fn test_reversal_guards() {
        let mut reversed = snapshot(MoveType::In);
        reversed.has_reversal = true;
        assert!(matches!(
            MoveReversalService::plan(&reversed, &[received_line()]),
            Err(StockError::AlreadyReversed(_))
        ));

        let mut reversal = snapshot(MoveType::Out);
        reversal.is_reversal = true;
        assert!(matches!(
            MoveReversalService::plan(&reversal, &[consumed_line()]),
            Err(StockError::CannotReverseReversal(_))
        ));

        assert!(matches!(
            MoveReversalService::plan(&snapshot(MoveType::In), &[]),
            Err(StockError::EmptyMove)
        ));
    }
}

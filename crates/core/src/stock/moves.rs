//! Header and line rules shared by every stock move.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use uuid::Uuid;

use super::error::StockError;
use super::fifo::FifoPlanner;
use super::types::{LineRequest, MovePurpose, MoveType, StockKey};

/// Longest reference a move header stores, in characters.
pub const MAX_REFERENCE_LEN: usize = 100;

/// Stateless move rules.
pub struct MoveRules;

impl MoveRules {
    /// Validates a caller-supplied reference.
    ///
    /// # Errors
    ///
    /// Returns `ReferenceTooLong` past `MAX_REFERENCE_LEN` characters.
    pub fn validate_reference(reference: Option<&str>) -> Result<(), StockError> {
        let length = reference.map_or(0, |r| r.chars().count());
        if length > MAX_REFERENCE_LEN {
            return Err(StockError::ReferenceTooLong {
                length,
                max: MAX_REFERENCE_LEN,
            });
        }
        Ok(())
    }

    /// Builds a reference for a move derived from another one, cut to
    /// `MAX_REFERENCE_LEN` characters.
    #[must_use]
    pub fn derived_reference(prefix: &str, reference: &str) -> String {
        prefix
            .chars()
            .chain(reference.chars())
            .take(MAX_REFERENCE_LEN)
            .collect()
    }

    /// Purpose is only meaningful on moves that take stock away.
    ///
    /// # Errors
    ///
    /// Returns `PurposeNotAllowed` for IN and TRANSFER moves with a purpose.
    pub fn validate_purpose(
        move_type: MoveType,
        purpose: Option<MovePurpose>,
    ) -> Result<(), StockError> {
        match (move_type, purpose) {
            (MoveType::In | MoveType::Transfer, Some(_)) => {
                Err(StockError::PurposeNotAllowed(move_type))
            }
            _ => Ok(()),
        }
    }

    /// Validates transfer endpoints.
    ///
    /// # Errors
    ///
    /// Returns `SameWarehouse`.
    pub fn validate_transfer(from_warehouse: Uuid, to_warehouse: Uuid) -> Result<(), StockError> {
        if from_warehouse == to_warehouse {
            return Err(StockError::SameWarehouse);
        }
        Ok(())
    }

    /// Validates that there is at least one line and every quantity is valid.
    ///
    /// # Errors
    ///
    /// Returns `EmptyMove` or `InvalidQuantity`.
    pub fn validate_lines(lines: &[LineRequest]) -> Result<(), StockError> {
        if lines.is_empty() {
            return Err(StockError::EmptyMove);
        }
        lines
            .iter()
            .try_for_each(|line| FifoPlanner::validate_quantity(line.quantity))
    }

    /// Total requested quantity per key, in lock order.
    #[must_use]
    pub fn requested_by_key(warehouse_id: Uuid, lines: &[LineRequest]) -> BTreeMap<StockKey, Decimal> {
        let mut totals = BTreeMap::new();
        for line in lines {
            *totals
                .entry(StockKey::new(warehouse_id, line.item_id))
                .or_insert(Decimal::ZERO) += line.quantity;
        }
        totals
    }
}

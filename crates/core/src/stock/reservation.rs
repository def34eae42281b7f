//! Reservation and availability rules.
//!
//! `available = on_hand - active reservations`. Reservations never touch
//! lots; they only shrink what issues and new reservations may claim.

use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use super::error::StockError;
use super::fifo::FifoPlanner;
use super::types::{LotSnapshot, ReservationSnapshot, StockKey};

/// Stock figures for one key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Availability {
    /// Physical quantity in lots.
    pub on_hand: Decimal,
    /// Quantity held by active reservations.
    pub reserved: Decimal,
    /// `on_hand - reserved`.
    pub available: Decimal,
}

/// Stateless reservation rules.
pub struct ReservationService;

impl ReservationService {
    /// Computes availability, ignoring released reservations and the one
    /// named by `excluding`.
    #[must_use]
    pub fn availability(
        lots: &[LotSnapshot],
        reservations: &[ReservationSnapshot],
        excluding: Option<Uuid>,
    ) -> Availability {
        let on_hand = FifoPlanner::on_hand(lots);
        let reserved: Decimal = reservations
            .iter()
            .filter(|r| !r.released && Some(r.id) != excluding)
            .map(|r| r.quantity)
            .sum();
        Availability {
            on_hand,
            reserved,
            available: on_hand - reserved,
        }
    }

    /// Validates a new reservation against current availability.
    ///
    /// # Errors
    ///
    /// Returns `InvalidQuantity` or `InsufficientAvailableStock`.
    pub fn validate_reserve(
        key: StockKey,
        qty: Decimal,
        availability: &Availability,
    ) -> Result<(), StockError> {
        FifoPlanner::validate_quantity(qty)?;
        if availability.available < qty {
            return Err(StockError::InsufficientAvailableStock {
                key,
                requested: qty,
                available: availability.available,
            });
        }
        Ok(())
    }

    /// Fails unless `requested` fits in what is available.
    ///
    /// # Errors
    ///
    /// Returns `InsufficientStock`.
    pub fn ensure_available(
        key: StockKey,
        requested: Decimal,
        availability: &Availability,
    ) -> Result<(), StockError> {
        if availability.available < requested {
            return Err(StockError::InsufficientStock {
                key,
                requested,
                available: availability.available,
            });
        }
        Ok(())
    }

    /// Validates a reservation supplied to an issue.
    ///
    /// `requested` is the quantity the move draws for the reservation's key.
    ///
    /// # Errors
    ///
    /// Returns `ReservationMismatch` when the move has no line for the
    /// reserved key, `ReservationReleased`, or `ReservationTooSmall`.
    pub fn validate_use(
        reservation: &ReservationSnapshot,
        requested: Option<Decimal>,
    ) -> Result<(), StockError> {
        let Some(requested) = requested else {
            return Err(StockError::ReservationMismatch {
                reservation_id: reservation.id,
            });
        };
        if reservation.released {
            return Err(StockError::ReservationReleased(reservation.id));
        }
        if reservation.quantity < requested {
            return Err(StockError::ReservationTooSmall {
                reserved: reservation.quantity,
                requested,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn key() -> StockKey {
        StockKey::new(Uuid::from_u128(1), Uuid::from_u128(2))
    }

    fn lot(qty: Decimal) -> LotSnapshot {
        LotSnapshot {
            id: Uuid::now_v7(),
            received_at: Utc::now(),
            unit_cost: dec!(1.00),
            qty_remaining: qty,
        }
    }

    fn reservation(qty: Decimal, released: bool) -> ReservationSnapshot {
        ReservationSnapshot {
            id: Uuid::now_v7(),
            key: key(),
            quantity: qty,
            released,
        }
    }

    #[test]
    fn test_availability_ignores_released() {
        let lots = vec![lot(dec!(5)), lot(dec!(3))];
        let reservations = vec![reservation(dec!(2), false), reservation(dec!(4), true)];
        let a = ReservationService::availability(&lots, &reservations, None);
        assert_eq!(a.on_hand, dec!(8));
        assert_eq!(a.reserved, dec!(2));
        assert_eq!(a.available, dec!(6));
    }

    #[test]
    fn test_availability_excludes_supplied_reservation() {
        let lots = vec![lot(dec!(5))];
        let held = reservation(dec!(5), false);
        let a = ReservationService::availability(&lots, std::slice::from_ref(&held), Some(held.id));
        assert_eq!(a.available, dec!(5));
    }

    #[test]
    fn test_reserve_over_available_fails() {
        let lots = vec![lot(dec!(5))];
        let reservations = vec![reservation(dec!(4), false)];
        let a = ReservationService::availability(&lots, &reservations, None);
        assert!(ReservationService::validate_reserve(key(), dec!(1), &a).is_ok());
        assert!(matches!(
            ReservationService::validate_reserve(key(), dec!(1.0001), &a),
            Err(StockError::InsufficientAvailableStock { .. })
        ));
        assert!(matches!(
            ReservationService::validate_reserve(key(), dec!(0), &a),
            Err(StockError::InvalidQuantity(_))
        ));
    }

    #[test]
    fn test_ensure_available() {
        let a = ReservationService::availability(&[lot(dec!(2))], &[], None);
        assert!(ReservationService::ensure_available(key(), dec!(2), &a).is_ok());
        assert!(matches!(
            ReservationService::ensure_available(key(), dec!(3), &a),
            Err(StockError::InsufficientStock { .. })
        ));
    }

    #[test]
    fn test_validate_use() {
        let active = reservation(dec!(3), false);
        assert!(ReservationService::validate_use(&active, Some(dec!(3))).is_ok());
        assert!(matches!(
            ReservationService::validate_use(&active, Some(dec!(4))),
            Err(StockError::ReservationTooSmall { .. })
        ));
        assert!(matches!(
            ReservationService::validate_use(&active, None),
            Err(StockError::ReservationMismatch { .. })
        ));
        let released = reservation(dec!(3), true);
        assert!(matches!(
            ReservationService::validate_use(&released, Some(dec!(1))),
            Err(StockError::ReservationReleased(_))
        ));
    }
}

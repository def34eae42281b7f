//! Reservation repository.
//!
//! `reserve` takes the same lot locks as a stock issue for its key, so a
//! reservation and a concurrent issue never both see the same free
//! quantity.

use std::collections::BTreeMap;

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use tracing::{info, warn};
use uuid::Uuid;

use tally_core::stock::{ReservationService, StockError, StockKey};

use super::pg;
use super::stock::{active_reservations, lock_open_lots, lock_reservation, release_locked};
use crate::entities::{items, stock_reservations, warehouses};

/// Input for reserving stock.
#[derive(Debug, Clone)]
pub struct ReserveInput {
    /// Warehouse.
    pub warehouse_id: Uuid,
    /// Item.
    pub item_id: Uuid,
    /// Quantity held.
    pub quantity: Decimal,
    /// Kind of document holding the stock (e.g. "order").
    pub source_type: Option<String>,
    /// Identifier of that document.
    pub source_id: Option<String>,
}

/// Reservation repository.
#[derive(Debug, Clone)]
pub struct ReservationRepository {
    db: DatabaseConnection,
}

impl ReservationRepository {
    /// Creates a new reservation repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Holds stock for later issue.
    ///
    /// # Errors
    ///
    /// - `InvalidQuantity` unless the quantity is positive
    /// - `InsufficientAvailableStock` if `on_hand - reserved` is below it
    pub async fn reserve(
        &self,
        input: ReserveInput,
    ) -> Result<stock_reservations::Model, StockError> {
        let key = StockKey::new(input.warehouse_id, input.item_id);

        let txn = self.db.begin().await.map_err(pg::stock_error)?;

        warehouses::Entity::find_by_id(input.warehouse_id)
            .one(&txn)
            .await
            .map_err(pg::stock_error)?
            .ok_or(StockError::WarehouseNotFound(input.warehouse_id))?;
        items::Entity::find_by_id(input.item_id)
            .one(&txn)
            .await
            .map_err(pg::stock_error)?
            .ok_or(StockError::ItemNotFound(input.item_id))?;

        let lots = lock_open_lots(&txn, &BTreeMap::from([(key, input.quantity)])).await?;
        let reservations = active_reservations(&txn, key).await?;
        let key_lots = lots.get(&key).map_or(&[][..], Vec::as_slice);
        let availability = ReservationService::availability(key_lots, &reservations, None);

        if let Err(e) = ReservationService::validate_reserve(key, input.quantity, &availability) {
            if matches!(e, StockError::InsufficientAvailableStock { .. }) {
                warn!(
                    key = %key,
                    requested = %input.quantity,
                    available = %availability.available,
                    "Insufficient stock to reserve"
                );
            }
            return Err(e);
        }

        let reservation = stock_reservations::ActiveModel {
            id: Set(Uuid::now_v7()),
            warehouse_id: Set(input.warehouse_id),
            item_id: Set(input.item_id),
            quantity: Set(input.quantity),
            source_type: Set(input.source_type),
            source_id: Set(input.source_id),
            released_at: Set(None),
            created_at: Set(Utc::now().into()),
        }
        .insert(&txn)
        .await
        .map_err(pg::stock_error)?;

        txn.commit().await.map_err(pg::stock_error)?;

        info!(
            reservation_id = %reservation.id,
            key = %key,
            quantity = %reservation.quantity,
            "Stock reserved"
        );
        Ok(reservation)
    }

    /// Releases a reservation. Releasing twice is a no-op.
    pub async fn release(
        &self,
        reservation_id: Uuid,
    ) -> Result<stock_reservations::Model, StockError> {
        let txn = self.db.begin().await.map_err(pg::stock_error)?;
        let reservation = lock_reservation(&txn, reservation_id).await?;
        let already_released = reservation.released_at.is_some();
        let reservation = release_locked(&txn, reservation).await?;
        txn.commit().await.map_err(pg::stock_error)?;

        if !already_released {
            info!(reservation_id = %reservation_id, "Reservation released");
        }
        Ok(reservation)
    }

    /// Gets a reservation by ID.
    pub async fn get_reservation(
        &self,
        reservation_id: Uuid,
    ) -> Result<stock_reservations::Model, StockError> {
        stock_reservations::Entity::find_by_id(reservation_id)
            .one(&self.db)
            .await
            .map_err(pg::stock_error)?
            .ok_or(StockError::ReservationNotFound(reservation_id))
    }

    /// Lists unreleased reservations of a key, oldest first.
    pub async fn active_reservations(
        &self,
        warehouse_id: Uuid,
        item_id: Uuid,
    ) -> Result<Vec<stock_reservations::Model>, StockError> {
        stock_reservations::Entity::find()
            .filter(stock_reservations::Column::WarehouseId.eq(warehouse_id))
            .filter(stock_reservations::Column::ItemId.eq(item_id))
            .filter(stock_reservations::Column::ReleasedAt.is_null())
            .order_by_asc(stock_reservations::Column::CreatedAt)
            .order_by_asc(stock_reservations::Column::Id)
            .all(&self.db)
            .await
            .map_err(pg::stock_error)
    }
}

//! Stock domain types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of stock movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MoveType {
    /// Receipt: creates lots.
    In,
    /// Issue: consumes lots FIFO.
    Out,
    /// Between warehouses: consumes at the source, creates at the target.
    Transfer,
    /// Correction: creates or consumes depending on sign.
    Adjust,
}

impl std::fmt::Display for MoveType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::In => f.write_str("IN"),
            Self::Out => f.write_str("OUT"),
            Self::Transfer => f.write_str("TRANSFER"),
            Self::Adjust => f.write_str("ADJUST"),
        }
    }
}

/// Business reason for a stock issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MovePurpose {
    /// Sold to a customer; triggers automatic COGS when configured.
    Sale,
    /// Used internally.
    Consumption,
    /// Spoiled or discarded.
    Waste,
    /// Inventory count correction.
    Adjustment,
}

/// Contended resource: the lot set and reservation set of one item in one
/// warehouse.
///
/// Ordering is by warehouse, then item; locks are always taken in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StockKey {
    /// Warehouse.
    pub warehouse_id: Uuid,
    /// Item.
    pub item_id: Uuid,
}

impl StockKey {
    /// Creates a key.
    #[must_use]
    pub const fn new(warehouse_id: Uuid, item_id: Uuid) -> Self {
        Self {
            warehouse_id,
            item_id,
        }
    }
}

impl std::fmt::Display for StockKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "warehouse {} / item {}", self.warehouse_id, self.item_id)
    }
}

/// Snapshot of a lot loaded under lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LotSnapshot {
    /// Lot ID (UUID v7, so ordering follows insertion).
    pub id: Uuid,
    /// Receipt timestamp, the primary FIFO key.
    pub received_at: DateTime<Utc>,
    /// Cost per unit.
    pub unit_cost: Decimal,
    /// Quantity not yet consumed.
    pub qty_remaining: Decimal,
}

/// Requested quantity of one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineRequest {
    /// Item.
    pub item_id: Uuid,
    /// Quantity (strictly positive).
    pub quantity: Decimal,
}

/// One slice of a lot taken by a move line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedAllocation {
    /// Lot drawn from.
    pub lot_id: Uuid,
    /// Lot receipt timestamp.
    pub received_at: DateTime<Utc>,
    /// Quantity drawn.
    pub qty: Decimal,
    /// Unit cost of the lot at allocation time.
    pub unit_cost: Decimal,
}

/// Result of consuming a quantity FIFO.
#[derive(Debug, Clone)]
pub struct ConsumptionPlan {
    /// Allocations in consumption order.
    pub allocations: Vec<PlannedAllocation>,
    /// Quantity-weighted average unit cost, rounded half-up.
    pub unit_cost: Decimal,
}

impl ConsumptionPlan {
    /// Total quantity drawn.
    #[must_use]
    pub fn quantity(&self) -> Decimal {
        self.allocations.iter().map(|a| a.qty).sum()
    }
}

/// Snapshot of a reservation.
#[derive(Debug, Clone)]
pub struct ReservationSnapshot {
    /// Reservation ID.
    pub id: Uuid,
    /// Reserved key.
    pub key: StockKey,
    /// Reserved quantity.
    pub quantity: Decimal,
    /// Whether the reservation has been released.
    pub released: bool,
}

/// Snapshot of a move considered for reversal.
#[derive(Debug, Clone)]
pub struct MoveSnapshot {
    /// Move ID.
    pub id: Uuid,
    /// Kind of move.
    pub move_type: MoveType,
    /// Source warehouse (transfers).
    pub from_warehouse_id: Option<Uuid>,
    /// Target warehouse (transfers).
    pub to_warehouse_id: Option<Uuid>,
    /// Whether this move reverses another one.
    pub is_reversal: bool,
    /// Whether a reversal of this move already exists.
    pub has_reversal: bool,
}

/// A move line with the allocations recorded against it.
#[derive(Debug, Clone)]
pub struct LineSnapshot {
    /// Warehouse and item of the line.
    pub key: StockKey,
    /// Line quantity.
    pub quantity: Decimal,
    /// Line unit cost, if known.
    pub unit_cost: Option<Decimal>,
    /// Allocations drawn by this line; empty for lines that created lots.
    pub allocations: Vec<PlannedAllocation>,
}

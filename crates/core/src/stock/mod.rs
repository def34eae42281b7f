//! FIFO stock costing.
//!
//! - Lots: append-only cost layers per (warehouse, item)
//! - Moves: IN / OUT / TRANSFER / ADJUST with per-line FIFO allocation
//! - Reservations: soft holds reducing availability
//! - Reversal planning and on-hand valuation

pub mod error;
pub mod fifo;
pub mod moves;
pub mod reservation;
pub mod reversal;
pub mod types;
pub mod valuation;

#[cfg(test)]
mod fifo_props;

pub use error::StockError;
pub use fifo::FifoPlanner;
pub use moves::{MAX_REFERENCE_LEN, MoveRules};
pub use reservation::{Availability, ReservationService};
pub use reversal::{MoveReversalPlan, MoveReversalService, RestoredLot, ReversalLine};
pub use types::{
    ConsumptionPlan, LineRequest, LineSnapshot, LotSnapshot, MovePurpose, MoveSnapshot, MoveType,
    PlannedAllocation, ReservationSnapshot, StockKey,
};
pub use valuation::{StockValuation, value_lots};

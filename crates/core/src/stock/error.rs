//! Stock error types for lots, moves and reservations.

use rust_decimal::Decimal;
use tally_shared::{ErrorKind, StorageFailure};
use thiserror::Error;
use uuid::Uuid;

use super::types::{MoveType, StockKey};

/// Errors that can occur during stock operations.
#[derive(Debug, Error)]
pub enum StockError {
    // ========== Validation Errors ==========
    /// Quantity must be strictly positive at quantity scale.
    #[error("Invalid quantity: {0}")]
    InvalidQuantity(Decimal),

    /// Unit cost must be strictly positive at unit cost scale.
    #[error("Invalid unit cost: {0}")]
    InvalidCost(Decimal),

    /// A transfer needs two different warehouses.
    #[error("Transfer source and target warehouse are the same")]
    SameWarehouse,

    /// A transfer is missing its source or target warehouse.
    #[error("Transfer move {0} has no source or target warehouse")]
    MissingWarehouse(Uuid),

    /// A move needs at least one line.
    #[error("Stock move has no lines")]
    EmptyMove,

    /// Purpose only applies to OUT and ADJUST moves.
    #[error("Purpose is not allowed on {0} moves")]
    PurposeNotAllowed(MoveType),

    /// Reservation is for a different warehouse or item.
    #[error("Reservation {reservation_id} does not cover any line of this move")]
    ReservationMismatch {
        /// Reservation ID.
        reservation_id: Uuid,
    },

    /// Warehouse or item code is blank.
    #[error("Code must not be blank")]
    InvalidCode,

    /// Move reference does not fit the stored column.
    #[error("Reference is {length} characters, at most {max} are allowed")]
    ReferenceTooLong {
        /// Characters supplied.
        length: usize,
        /// Characters allowed.
        max: usize,
    },

    /// Move is linked to journal entries that a stock-only reversal would
    /// leave behind.
    #[error("Stock move {0} has posted journal entries; reverse it together with its COGS")]
    HasJournalEntries(Uuid),

    // ========== State Errors ==========
    /// Move already has a reversal.
    #[error("Stock move {0} has already been reversed")]
    AlreadyReversed(Uuid),

    /// Reversal moves cannot be reversed again.
    #[error("Stock move {0} is itself a reversal and cannot be reversed")]
    CannotReverseReversal(Uuid),

    /// Reservation was already released.
    #[error("Reservation {0} has already been released")]
    ReservationReleased(Uuid),

    // ========== Constraint Errors ==========
    /// Reservation is smaller than the quantity drawn against it.
    #[error("Reservation holds {reserved}, move requests {requested}")]
    ReservationTooSmall {
        /// Reserved quantity.
        reserved: Decimal,
        /// Requested quantity.
        requested: Decimal,
    },

    /// Warehouse code already used.
    #[error("Warehouse code {0} already exists")]
    DuplicateWarehouseCode(String),

    /// Item code already used.
    #[error("Item code {0} already exists")]
    DuplicateItemCode(String),

    // ========== Resource Errors ==========
    /// Not enough unreserved stock for an issue.
    #[error("Insufficient stock for {key}: requested {requested}, available {available}")]
    InsufficientStock {
        /// Warehouse and item.
        key: StockKey,
        /// Requested quantity.
        requested: Decimal,
        /// Available quantity.
        available: Decimal,
    },

    /// Not enough unreserved stock for a reservation.
    #[error("Insufficient available stock for {key}: requested {requested}, available {available}")]
    InsufficientAvailableStock {
        /// Warehouse and item.
        key: StockKey,
        /// Requested quantity.
        requested: Decimal,
        /// Available quantity.
        available: Decimal,
    },

    // ========== Invariant Violations ==========
    /// FIFO ran out of lots after availability was confirmed.
    #[error("FIFO allocation shortfall: requested {requested}, missing {missing}")]
    AllocationShortfall {
        /// Requested quantity.
        requested: Decimal,
        /// Quantity left uncovered.
        missing: Decimal,
    },

    // ========== Not Found Errors ==========
    /// Move not found.
    #[error("Stock move not found: {0}")]
    MoveNotFound(Uuid),

    /// Lot not found.
    #[error("Stock lot not found: {0}")]
    LotNotFound(Uuid),

    /// Reservation not found.
    #[error("Reservation not found: {0}")]
    ReservationNotFound(Uuid),

    /// Warehouse not found.
    #[error("Warehouse not found: {0}")]
    WarehouseNotFound(Uuid),

    /// Item not found.
    #[error("Item not found: {0}")]
    ItemNotFound(Uuid),

    // ========== Database Errors ==========
    /// Database error.
    #[error("Database error: {0}")]
    Database(StorageFailure),
}

impl StockError {
    /// Wraps a storage failure.
    #[must_use]
    pub fn storage(failure: StorageFailure) -> Self {
        Self::Database(failure)
    }

    /// Returns the error code for this error.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidQuantity(_) => "INVALID_QUANTITY",
            Self::InvalidCost(_) => "INVALID_COST",
            Self::SameWarehouse => "SAME_WAREHOUSE",
            Self::MissingWarehouse(_) => "MISSING_WAREHOUSE",
            Self::EmptyMove => "EMPTY_MOVE",
            Self::PurposeNotAllowed(_) => "PURPOSE_NOT_ALLOWED",
            Self::ReservationMismatch { .. } => "RESERVATION_MISMATCH",
            Self::InvalidCode => "INVALID_CODE",
            Self::ReferenceTooLong { .. } => "REFERENCE_TOO_LONG",
            Self::HasJournalEntries(_) => "HAS_JOURNAL_ENTRIES",
            Self::AlreadyReversed(_) => "ALREADY_REVERSED",
            Self::CannotReverseReversal(_) => "CANNOT_REVERSE_REVERSAL",
            Self::ReservationReleased(_) => "RESERVATION_RELEASED",
            Self::ReservationTooSmall { .. } => "RESERVATION_TOO_SMALL",
            Self::DuplicateWarehouseCode(_) => "DUPLICATE_WAREHOUSE_CODE",
            Self::DuplicateItemCode(_) => "DUPLICATE_ITEM_CODE",
            Self::InsufficientStock { .. } => "INSUFFICIENT_STOCK",
            Self::InsufficientAvailableStock { .. } => "INSUFFICIENT_AVAILABLE_STOCK",
            Self::AllocationShortfall { .. } => "ALLOCATION_SHORTFALL",
            Self::MoveNotFound(_) => "MOVE_NOT_FOUND",
            Self::LotNotFound(_) => "LOT_NOT_FOUND",
            Self::ReservationNotFound(_) => "RESERVATION_NOT_FOUND",
            Self::WarehouseNotFound(_) => "WAREHOUSE_NOT_FOUND",
            Self::ItemNotFound(_) => "ITEM_NOT_FOUND",
            Self::Database(_) => "DATABASE_ERROR",
        }
    }

    /// Returns the error kind.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidQuantity(_)
            | Self::InvalidCost(_)
            | Self::SameWarehouse
            | Self::MissingWarehouse(_)
            | Self::EmptyMove
            | Self::PurposeNotAllowed(_)
            | Self::ReservationMismatch { .. }
            | Self::InvalidCode
            | Self::ReferenceTooLong { .. } => ErrorKind::Validation,

            Self::AlreadyReversed(_)
            | Self::CannotReverseReversal(_)
            | Self::ReservationReleased(_)
            | Self::HasJournalEntries(_) => ErrorKind::State,

            Self::ReservationTooSmall { .. }
            | Self::DuplicateWarehouseCode(_)
            | Self::DuplicateItemCode(_) => ErrorKind::Constraint,

            Self::InsufficientStock { .. } | Self::InsufficientAvailableStock { .. } => {
                ErrorKind::Resource
            }

            Self::AllocationShortfall { .. } => ErrorKind::InvariantViolation,

            Self::MoveNotFound(_)
            | Self::LotNotFound(_)
            | Self::ReservationNotFound(_)
            | Self::WarehouseNotFound(_)
            | Self::ItemNotFound(_) => ErrorKind::NotFound,

            Self::Database(_) => ErrorKind::Storage,
        }
    }

    /// Returns true if retrying the whole operation may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Database(failure) if failure.is_retryable())
    }
}

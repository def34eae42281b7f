//! Errors raised where stock movements turn into journal entries.

use rust_decimal::Decimal;
use tally_shared::{ErrorKind, StorageFailure};
use thiserror::Error;
use uuid::Uuid;

use crate::ledger::LedgerError;
use crate::stock::{MoveType, StockError};

/// Errors that can occur in the COGS bridge.
#[derive(Debug, Error)]
pub enum CogsError {
    // ========== Validation Errors ==========
    /// COGS is only posted for OUT moves.
    #[error("Stock move {move_id} is {move_type}, COGS requires an OUT move")]
    NotAnOutMove {
        /// Move ID.
        move_id: Uuid,
        /// Actual move type.
        move_type: MoveType,
    },

    /// A required configuration value is unset.
    #[error("Stock accounting configuration is missing {0}")]
    MissingConfiguration(&'static str),

    /// No sale warehouse given and none configured.
    #[error("No sale warehouse given and no default sale warehouse configured")]
    MissingSaleWarehouse,

    /// No replenish warehouse configured.
    #[error("No default replenish-from warehouse configured")]
    MissingReplenishWarehouse,

    /// Sale amounts must be non-negative with a positive gross.
    #[error("Invalid sale amounts. Net: {net}, VAT: {vat}")]
    InvalidSaleAmount {
        /// Net amount.
        net: Decimal,
        /// VAT amount.
        vat: Decimal,
    },

    // ========== State Errors ==========
    /// Move already carries a COGS entry.
    #[error("COGS already posted for stock move {0}")]
    AlreadyPosted(Uuid),

    // ========== Constraint Errors ==========
    /// Allocated cost is not strictly positive.
    #[error("Stock move {0} has no cost to post")]
    ZeroCost(Uuid),

    // ========== Wrapped Errors ==========
    /// Journal failure.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// Stock failure.
    #[error(transparent)]
    Stock(#[from] StockError),

    /// Database error.
    #[error("Database error: {0}")]
    Database(StorageFailure),
}

impl CogsError {
    /// Wraps a storage failure.
    #[must_use]
    pub fn storage(failure: StorageFailure) -> Self {
        Self::Database(failure)
    }

    /// Returns the error code for this error.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NotAnOutMove { .. } => "NOT_AN_OUT_MOVE",
            Self::MissingConfiguration(_) => "MISSING_CONFIGURATION",
            Self::MissingSaleWarehouse => "MISSING_SALE_WAREHOUSE",
            Self::MissingReplenishWarehouse => "MISSING_REPLENISH_WAREHOUSE",
            Self::InvalidSaleAmount { .. } => "INVALID_SALE_AMOUNT",
            Self::AlreadyPosted(_) => "ALREADY_POSTED",
            Self::ZeroCost(_) => "ZERO_COST",
            Self::Ledger(err) => err.error_code(),
            Self::Stock(err) => err.error_code(),
            Self::Database(_) => "DATABASE_ERROR",
        }
    }

    /// Returns the error kind.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotAnOutMove { .. }
            | Self::MissingConfiguration(_)
            | Self::MissingSaleWarehouse
            | Self::MissingReplenishWarehouse
            | Self::InvalidSaleAmount { .. } => ErrorKind::Validation,
            Self::AlreadyPosted(_) => ErrorKind::State,
            Self::ZeroCost(_) => ErrorKind::Constraint,
            Self::Ledger(err) => err.kind(),
            Self::Stock(err) => err.kind(),
            Self::Database(_) => ErrorKind::Storage,
        }
    }

    /// Returns true if retrying the whole operation may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Ledger(err) => err.is_retryable(),
            Self::Stock(err) => err.is_retryable(),
            Self::Database(failure) => failure.is_retryable(),
            _ => false,
        }
    }
}

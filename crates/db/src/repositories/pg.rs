//! PostgreSQL failure classification.
//!
//! Constraint names come from the migrations; repositories use them to turn
//! a rejected write into the matching domain error.

use std::borrow::Borrow;

use sea_orm::{DbErr, RuntimeErr};
use sqlx::error::DatabaseError;
use tally_core::cogs::CogsError;
use tally_core::ledger::LedgerError;
use tally_core::stock::StockError;
use tally_shared::StorageFailure;

const UNIQUE_VIOLATION: &str = "23505";
const EXCLUSION_VIOLATION: &str = "23P01";

pub(crate) const UQ_ACCOUNTS_LEDGER_CODE: &str = "uq_accounts_ledger_code";
pub(crate) const UQ_PERIODS_LEDGER_NAME: &str = "uq_periods_ledger_name";
pub(crate) const EX_PERIODS_OVERLAP: &str = "ex_periods_overlap";
pub(crate) const UQ_JOURNAL_ENTRIES_LEDGER_NUMBER: &str = "uq_journal_entries_ledger_number";
pub(crate) const UQ_JOURNAL_ENTRIES_REVERSED_ENTRY: &str = "uq_journal_entries_reversed_entry";
pub(crate) const UQ_WAREHOUSES_CODE: &str = "uq_warehouses_code";
pub(crate) const UQ_ITEMS_CODE: &str = "uq_items_code";
pub(crate) const UQ_STOCK_MOVES_REVERSED_MOVE: &str = "uq_stock_moves_reversed_move";
pub(crate) const UQ_STOCK_MOVES_JOURNAL_ENTRY: &str = "uq_stock_moves_journal_entry";

fn database_error(err: &DbErr) -> Option<&(dyn DatabaseError + 'static)> {
    match err {
        DbErr::Exec(RuntimeErr::SqlxError(sqlx::Error::Database(e)))
        | DbErr::Query(RuntimeErr::SqlxError(sqlx::Error::Database(e)))
        | DbErr::Conn(RuntimeErr::SqlxError(sqlx::Error::Database(e))) => Some(e.as_ref()),
        _ => None,
    }
}

/// Returns the name of the unique or exclusion constraint a write violated.
pub(crate) fn violated_constraint(err: &DbErr) -> Option<&str> {
    let db_err = database_error(err)?;
    match db_err.code().as_deref() {
        Some(UNIQUE_VIOLATION | EXCLUSION_VIOLATION) => db_err.constraint(),
        _ => None,
    }
}

/// Returns true if `err` violated the named constraint.
pub(crate) fn violates(err: &DbErr, constraint: &str) -> bool {
    violated_constraint(err) == Some(constraint)
}

/// Captures a driver error with its SQLSTATE.
pub(crate) fn storage_failure(err: &DbErr) -> StorageFailure {
    let sqlstate = database_error(err)
        .and_then(|db_err| db_err.code())
        .map(std::borrow::Cow::into_owned);
    StorageFailure::new(err.to_string(), sqlstate)
}

pub(crate) fn ledger_error(err: impl Borrow<DbErr>) -> LedgerError {
    LedgerError::storage(storage_failure(err.borrow()))
}

pub(crate) fn stock_error(err: impl Borrow<DbErr>) -> StockError {
    StockError::storage(storage_failure(err.borrow()))
}

pub(crate) fn cogs_error(err: impl Borrow<DbErr>) -> CogsError {
    CogsError::storage(storage_failure(err.borrow()))
}

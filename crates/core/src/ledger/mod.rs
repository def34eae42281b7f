//! Double-entry journal logic.
//!
//! - Entry and item types
//! - Ordered validation pipelines for every entry mutation
//! - Reversal of posted entries
//! - Account balances and trial balance aggregation
//! - Error types for chart and journal operations

pub mod balance;
pub mod error;
pub mod reversal;
pub mod service;
pub mod types;

#[cfg(test)]
mod service_props;

pub use balance::{AccountBalance, AccountSummary, Posting, TrialBalance, TrialBalanceRow};
pub use error::LedgerError;
pub use reversal::{REVERSAL_ITEM_PREFIX, ReversalPlan, ReversalService};
pub use service::JournalService;
pub use types::{EntrySnapshot, EntryState, EntryStatus, EntryTotals, ItemLine};

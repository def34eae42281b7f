//! The bridge between stock movements and the journal.
//!
//! Turns the FIFO allocations of an OUT move into a balanced COGS entry,
//! and builds the cash sale entry that accompanies a sale.

pub mod error;
pub mod service;

pub use error::CogsError;
pub use service::{CogsService, EntryPlan, SaleAccounts, SaleAmounts};

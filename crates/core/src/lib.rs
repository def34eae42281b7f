//! Core business logic for Tally.
//!
//! This crate contains pure business logic with ZERO web or database dependencies.
//! All domain types, validation rules, and calculations live here; the
//! storage layer loads snapshots, asks these services for a decision, and
//! applies the result inside its own transaction.
//!
//! # Modules
//!
//! - `chart` - Accounts, the account tree and accounting periods
//! - `ledger` - Journal entries, posting, reversal and trial balance
//! - `stock` - FIFO lots, stock moves, reservations and valuation
//! - `cogs` - Cost of goods sold and sale postings derived from stock moves

pub mod chart;
pub mod cogs;
pub mod ledger;
pub mod stock;

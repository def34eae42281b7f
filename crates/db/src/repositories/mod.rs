//! Repositories over the ledger and stock tables.
//!
//! Every public operation runs inside its own database transaction. The
//! transaction-level building blocks are crate-private so the COGS bridge
//! can combine stock moves and journal entries in a single commit.

pub mod chart;
pub mod cogs;
pub mod journal;
mod pg;
pub mod reservation;
pub mod stock;

pub use chart::{ChartRepository, CreatePeriodInput};
pub use cogs::{CogsRepository, MoveReversalOutcome, SaleInput, SaleOutcome, StockOutOutcome};
pub use journal::{CreateEntryInput, EntryWithItems, JournalRepository, UpdateEntryInput};
pub use reservation::{ReservationRepository, ReserveInput};
pub use stock::{
    AdjustmentInput, LineDetail, MoveDetail, PostInInput, ReceiptInput, ReceiptLine,
    StockOutInput, StockRepository, TransferInput,
};

//! Chart of accounts: ledgers, the account tree and accounting periods.
//!
//! Everything here is static configuration consumed by the journal and the
//! COGS bridge. The rules are pure functions over snapshots that the storage
//! layer loads inside the mutating transaction.

pub mod account;
pub mod period;

pub use account::{AccountInfo, AccountRules, AccountType, NewAccount, NormalSide, ParentInfo};
pub use period::{PeriodInfo, PeriodRules};

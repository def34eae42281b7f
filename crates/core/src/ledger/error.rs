//! Ledger error types for chart, journal and reversal operations.
//!
//! Every variant maps to one [`ErrorKind`] so callers can branch on the
//! category without matching each variant.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use tally_shared::{ErrorKind, StorageFailure};
use thiserror::Error;
use uuid::Uuid;

use super::types::EntryStatus;

/// Errors that can occur during ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    // ========== Validation Errors ==========
    /// Item must carry exactly one strictly positive side at money scale.
    #[error("Item must have exactly one positive side. Debit: {debit}, Credit: {credit}")]
    InvalidAmountShape {
        /// Debit amount supplied.
        debit: Decimal,
        /// Credit amount supplied.
        credit: Decimal,
    },

    /// Account belongs to a different ledger than the entry.
    #[error("Account {account_id} belongs to ledger {account_ledger}, entry belongs to {entry_ledger}")]
    AccountLedgerMismatch {
        /// Account being posted to.
        account_id: Uuid,
        /// Ledger of the account.
        account_ledger: Uuid,
        /// Ledger of the entry.
        entry_ledger: Uuid,
    },

    /// Parent account belongs to a different ledger.
    #[error("Parent account {parent_id} belongs to a different ledger")]
    ParentLedgerMismatch {
        /// Parent account.
        parent_id: Uuid,
    },

    /// Account code is blank.
    #[error("Account code must not be blank")]
    InvalidAccountCode,

    /// Ledger name is blank.
    #[error("Ledger name must not be blank")]
    InvalidLedgerName,

    /// Period start is after its end.
    #[error("Period start {start} is after end {end}")]
    InvalidDateRange {
        /// Start date.
        start: NaiveDate,
        /// End date.
        end: NaiveDate,
    },

    /// Entry numbers are strictly positive.
    #[error("Entry number must be positive, got {0}")]
    InvalidNumber(i64),

    // ========== State Errors ==========
    /// Items can only be changed while the entry is a draft.
    #[error("Entry {entry_id} is {status}, items can only change on drafts")]
    EntryNotDraft {
        /// Entry ID.
        entry_id: Uuid,
        /// Current status.
        status: EntryStatus,
    },

    /// Only drafts can be posted.
    #[error("Entry {entry_id} is {status}, only drafts can be posted")]
    NotDraft {
        /// Entry ID.
        entry_id: Uuid,
        /// Current status.
        status: EntryStatus,
    },

    /// Posted entries cannot be voided; reverse them instead.
    #[error("Cannot void posted entry {0}")]
    CannotVoidPosted(Uuid),

    /// Entry is already void.
    #[error("Entry {0} is already void")]
    AlreadyVoided(Uuid),

    /// Void entries cannot be modified.
    #[error("Entry {0} is void and cannot be modified")]
    EntryVoided(Uuid),

    /// Posted entries cannot be deleted.
    #[error("Cannot delete posted entry {0}")]
    CannotDeletePosted(Uuid),

    /// The date of a posted entry is immutable.
    #[error("Cannot change the date of posted entry {0}")]
    PostedDateImmutable(Uuid),

    /// The status of a posted entry is immutable.
    #[error("Cannot change the status of posted entry {0}")]
    PostedStatusImmutable(Uuid),

    /// Only posted entries can be reversed.
    #[error("Entry {entry_id} is {status}, only posted entries can be reversed")]
    NotPosted {
        /// Entry ID.
        entry_id: Uuid,
        /// Current status.
        status: EntryStatus,
    },

    /// Entry already has a reversal.
    #[error("Entry {0} has already been reversed")]
    AlreadyReversed(Uuid),

    /// Reversal entries cannot be reversed again.
    #[error("Entry {0} is itself a reversal and cannot be reversed")]
    CannotReverseReversal(Uuid),

    // ========== Constraint Errors ==========
    /// Debits and credits differ.
    #[error("Entry is not balanced. Debit: {debit}, Credit: {credit}")]
    Unbalanced {
        /// Total debit.
        debit: Decimal,
        /// Total credit.
        credit: Decimal,
    },

    /// Entry has no items.
    #[error("Entry {0} has no items")]
    EmptyEntry(Uuid),

    /// Entry date lies inside a closed period.
    #[error("Date {date} falls in closed period {period}")]
    PeriodClosed {
        /// Entry date.
        date: NaiveDate,
        /// Name of the closed period.
        period: String,
    },

    /// Account does not accept postings.
    #[error("Account {0} is not postable")]
    AccountNotPostable(Uuid),

    /// Account is inactive.
    #[error("Account {0} is inactive")]
    AccountInactive(Uuid),

    /// Parent accounts must not be postable.
    #[error("Parent account {0} is postable")]
    ParentIsPostable(Uuid),

    /// Account has child accounts.
    #[error("Account {0} has child accounts")]
    AccountHasChildren(Uuid),

    /// Account is referenced by journal items.
    #[error("Account {0} is referenced by journal items")]
    AccountInUse(Uuid),

    /// Period overlaps an existing one.
    #[error("Period overlaps existing period {name}")]
    PeriodOverlap {
        /// Name of the overlapping period.
        name: String,
    },

    /// Period name already used in the ledger.
    #[error("Period name {0} already exists")]
    DuplicatePeriodName(String),

    /// Entry number already used in the ledger.
    #[error("Entry number {0} already exists")]
    DuplicateNumber(i64),

    /// Account code already used in the ledger.
    #[error("Account code {0} already exists")]
    DuplicateAccountCode(String),

    // ========== Not Found Errors ==========
    /// Ledger not found.
    #[error("Ledger not found: {0}")]
    LedgerNotFound(Uuid),

    /// Account not found.
    #[error("Account not found: {0}")]
    AccountNotFound(Uuid),

    /// Period not found.
    #[error("Period not found: {0}")]
    PeriodNotFound(Uuid),

    /// Entry not found.
    #[error("Journal entry not found: {0}")]
    EntryNotFound(Uuid),

    /// Item not found.
    #[error("Journal item not found: {0}")]
    ItemNotFound(Uuid),

    // ========== Database Errors ==========
    /// Database error.
    #[error("Database error: {0}")]
    Database(StorageFailure),
}

impl LedgerError {
    /// Wraps a storage failure.
    #[must_use]
    pub fn storage(failure: StorageFailure) -> Self {
        Self::Database(failure)
    }

    /// Returns the error code for this error.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidAmountShape { .. } => "INVALID_AMOUNT_SHAPE",
            Self::AccountLedgerMismatch { .. } => "ACCOUNT_LEDGER_MISMATCH",
            Self::ParentLedgerMismatch { .. } => "PARENT_LEDGER_MISMATCH",
            Self::InvalidAccountCode => "INVALID_ACCOUNT_CODE",
            Self::InvalidLedgerName => "INVALID_LEDGER_NAME",
            Self::InvalidDateRange { .. } => "INVALID_DATE_RANGE",
            Self::InvalidNumber(_) => "INVALID_NUMBER",
            Self::EntryNotDraft { .. } => "ENTRY_NOT_DRAFT",
            Self::NotDraft { .. } => "NOT_DRAFT",
            Self::CannotVoidPosted(_) => "CANNOT_VOID_POSTED",
            Self::AlreadyVoided(_) => "ALREADY_VOIDED",
            Self::EntryVoided(_) => "ENTRY_VOIDED",
            Self::CannotDeletePosted(_) => "CANNOT_DELETE_POSTED",
            Self::PostedDateImmutable(_) => "POSTED_DATE_IMMUTABLE",
            Self::PostedStatusImmutable(_) => "POSTED_STATUS_IMMUTABLE",
            Self::NotPosted { .. } => "NOT_POSTED",
            Self::AlreadyReversed(_) => "ALREADY_REVERSED",
            Self::CannotReverseReversal(_) => "CANNOT_REVERSE_REVERSAL",
            Self::Unbalanced { .. } => "UNBALANCED",
            Self::EmptyEntry(_) => "EMPTY_ENTRY",
            Self::PeriodClosed { .. } => "PERIOD_CLOSED",
            Self::AccountNotPostable(_) => "ACCOUNT_NOT_POSTABLE",
            Self::AccountInactive(_) => "ACCOUNT_INACTIVE",
            Self::ParentIsPostable(_) => "PARENT_IS_POSTABLE",
            Self::AccountHasChildren(_) => "ACCOUNT_HAS_CHILDREN",
            Self::AccountInUse(_) => "ACCOUNT_IN_USE",
            Self::PeriodOverlap { .. } => "PERIOD_OVERLAP",
            Self::DuplicatePeriodName(_) => "DUPLICATE_PERIOD_NAME",
            Self::DuplicateNumber(_) => "DUPLICATE_NUMBER",
            Self::DuplicateAccountCode(_) => "DUPLICATE_ACCOUNT_CODE",
            Self::LedgerNotFound(_) => "LEDGER_NOT_FOUND",
            Self::AccountNotFound(_) => "ACCOUNT_NOT_FOUND",
            Self::PeriodNotFound(_) => "PERIOD_NOT_FOUND",
            Self::EntryNotFound(_) => "ENTRY_NOT_FOUND",
            Self::ItemNotFound(_) => "ITEM_NOT_FOUND",
            Self::Database(_) => "DATABASE_ERROR",
        }
    }

    /// Returns the error kind.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidAmountShape { .. }
            | Self::AccountLedgerMismatch { .. }
            | Self::ParentLedgerMismatch { .. }
            | Self::InvalidAccountCode
            | Self::InvalidLedgerName
            | Self::InvalidDateRange { .. }
            | Self::InvalidNumber(_) => ErrorKind::Validation,

            Self::EntryNotDraft { .. }
            | Self::NotDraft { .. }
            | Self::CannotVoidPosted(_)
            | Self::AlreadyVoided(_)
            | Self::EntryVoided(_)
            | Self::CannotDeletePosted(_)
            | Self::PostedDateImmutable(_)
            | Self::PostedStatusImmutable(_)
            | Self::NotPosted { .. }
            | Self::AlreadyReversed(_)
            | Self::CannotReverseReversal(_) => ErrorKind::State,

            Self::Unbalanced { .. }
            | Self::EmptyEntry(_)
            | Self::PeriodClosed { .. }
            | Self::AccountNotPostable(_)
            | Self::AccountInactive(_)
            | Self::ParentIsPostable(_)
            | Self::AccountHasChildren(_)
            | Self::AccountInUse(_)
            | Self::PeriodOverlap { .. }
            | Self::DuplicatePeriodName(_)
            | Self::DuplicateNumber(_)
            | Self::DuplicateAccountCode(_) => ErrorKind::Constraint,

            Self::LedgerNotFound(_)
            | Self::AccountNotFound(_)
            | Self::PeriodNotFound(_)
            | Self::EntryNotFound(_)
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

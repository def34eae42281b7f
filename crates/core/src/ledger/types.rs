//! Journal domain types.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Journal entry status.
///
/// Entries start as drafts, become posted once validated, or are voided
/// while still drafts. Both `Posted` and `Void` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    /// Entry is being drafted and can be modified.
    Draft,
    /// Entry has been posted to the ledger (immutable).
    Posted,
    /// Entry was abandoned before posting.
    Void,
}

impl EntryStatus {
    /// Returns true if items can still be added or removed.
    #[must_use]
    pub fn is_editable(&self) -> bool {
        matches!(self, Self::Draft)
    }

    /// Returns true if no further status transition is possible.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Posted | Self::Void)
    }
}

impl std::fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Draft => f.write_str("DRAFT"),
            Self::Posted => f.write_str("POSTED"),
            Self::Void => f.write_str("VOID"),
        }
    }
}

/// Snapshot of an entry as loaded inside the mutating transaction.
#[derive(Debug, Clone)]
pub struct EntrySnapshot {
    /// Entry ID.
    pub id: Uuid,
    /// Ledger the entry belongs to.
    pub ledger_id: Uuid,
    /// Ledger-scoped number.
    pub number: i64,
    /// Accounting date.
    pub date: NaiveDate,
    /// Current status.
    pub status: EntryStatus,
    /// Whether this entry reverses another one.
    pub is_reversal: bool,
    /// Whether a reversal of this entry already exists.
    pub has_reversal: bool,
}

/// The mutable header fields of an entry, compared before and after an update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryState {
    /// Status.
    pub status: EntryStatus,
    /// Accounting date.
    pub date: NaiveDate,
    /// Free-text description.
    pub description: String,
}

/// One debit or credit line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemLine {
    /// Account posted to.
    pub account_id: Uuid,
    /// Debit amount (zero for credit lines).
    pub debit: Decimal,
    /// Credit amount (zero for debit lines).
    pub credit: Decimal,
    /// Optional line description.
    pub description: Option<String>,
}

impl ItemLine {
    /// Creates a debit line.
    #[must_use]
    pub fn debit(account_id: Uuid, amount: Decimal, description: Option<String>) -> Self {
        Self {
            account_id,
            debit: amount,
            credit: Decimal::ZERO,
            description,
        }
    }

    /// Creates a credit line.
    #[must_use]
    pub fn credit(account_id: Uuid, amount: Decimal, description: Option<String>) -> Self {
        Self {
            account_id,
            debit: Decimal::ZERO,
            credit: amount,
            description,
        }
    }
}

/// Debit and credit totals of an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EntryTotals {
    /// Sum of debits.
    pub debit: Decimal,
    /// Sum of credits.
    pub credit: Decimal,
}

impl EntryTotals {
    /// Returns true if debits equal credits exactly.
    #[must_use]
    pub fn is_balanced(&self) -> bool {
        self.debit == self.credit
    }

    /// Debits minus credits.
    #[must_use]
    pub fn difference(&self) -> Decimal {
        self.debit - self.credit
    }
}

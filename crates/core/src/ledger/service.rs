//! Journal service: ordered validation pipelines for every entry mutation.
//!
//! Storage loads the committed state inside its transaction, runs the
//! matching pipeline here, and only then applies the mutation.

use rust_decimal::Decimal;
use tally_shared::types::{MONEY_SCALE, fits_scale};
use uuid::Uuid;

use super::error::LedgerError;
use super::types::{EntrySnapshot, EntryState, EntryStatus, EntryTotals, ItemLine};
use crate::chart::{AccountInfo, AccountRules, PeriodInfo, PeriodRules};

/// Stateless service for journal entry validation.
pub struct JournalService;

impl JournalService {
    /// Next number for a ledger given the current maximum.
    #[must_use]
    pub fn next_entry_number(current_max: Option<i64>) -> i64 {
        current_max.map_or(1, |max| max + 1)
    }

    /// Validates a caller-supplied entry number.
    ///
    /// # Errors
    ///
    /// Returns `InvalidNumber` for zero or negative numbers.
    pub fn validate_number(number: i64) -> Result<(), LedgerError> {
        if number <= 0 {
            return Err(LedgerError::InvalidNumber(number));
        }
        Ok(())
    }

    /// Validates that exactly one side is strictly positive and the other is
    /// exactly zero, both at money scale.
    ///
    /// # Errors
    ///
    /// Returns `InvalidAmountShape` otherwise.
    pub fn validate_amount_shape(debit: Decimal, credit: Decimal) -> Result<(), LedgerError> {
        let one_sided = (debit > Decimal::ZERO && credit.is_zero())
            || (credit > Decimal::ZERO && debit.is_zero());
        let at_scale = fits_scale(debit, MONEY_SCALE) && fits_scale(credit, MONEY_SCALE);
        if !one_sided || !at_scale {
            return Err(LedgerError::InvalidAmountShape { debit, credit });
        }
        Ok(())
    }

    /// Pipeline for attaching an item to an entry.
    ///
    /// Order: entry is draft, account postable, same ledger, account active,
    /// amount shape.
    ///
    /// # Errors
    ///
    /// Returns the first failing check.
    pub fn validate_add_item(
        entry: &EntrySnapshot,
        account: &AccountInfo,
        debit: Decimal,
        credit: Decimal,
    ) -> Result<(), LedgerError> {
        Self::ensure_draft_for_items(entry)?;
        AccountRules::validate_for_posting(account, entry.ledger_id)?;
        Self::validate_amount_shape(debit, credit)
    }

    /// Pipeline for removing an item from an entry.
    ///
    /// # Errors
    ///
    /// Returns `EntryNotDraft` unless the entry is a draft.
    pub fn validate_remove_item(entry: &EntrySnapshot) -> Result<(), LedgerError> {
        Self::ensure_draft_for_items(entry)
    }

    fn ensure_draft_for_items(entry: &EntrySnapshot) -> Result<(), LedgerError> {
        if !entry.status.is_editable() {
            return Err(LedgerError::EntryNotDraft {
                entry_id: entry.id,
                status: entry.status,
            });
        }
        Ok(())
    }

    /// Sums debit and credit of the given lines.
    #[must_use]
    pub fn calculate_totals<'a, I>(items: I) -> EntryTotals
    where
        I: IntoIterator<Item = &'a ItemLine>,
    {
        items
            .into_iter()
            .fold(EntryTotals::default(), |mut totals, item| {
                totals.debit += item.debit;
                totals.credit += item.credit;
                totals
            })
    }

    /// Pipeline for posting.
    ///
    /// Order: draft, at least one item, balanced (exact, no rounding), date
    /// not in a closed period.
    ///
    /// # Errors
    ///
    /// Returns `NotDraft`, `EmptyEntry`, `Unbalanced` or `PeriodClosed`.
    pub fn validate_post(
        entry: &EntrySnapshot,
        items: &[ItemLine],
        periods: &[PeriodInfo],
    ) -> Result<EntryTotals, LedgerError> {
        if entry.status != EntryStatus::Draft {
            return Err(LedgerError::NotDraft {
                entry_id: entry.id,
                status: entry.status,
            });
        }

        if items.is_empty() {
            return Err(LedgerError::EmptyEntry(entry.id));
        }

        let totals = Self::calculate_totals(items);
        if !totals.is_balanced() {
            return Err(LedgerError::Unbalanced {
                debit: totals.debit,
                credit: totals.credit,
            });
        }

        PeriodRules::ensure_open(entry.date, periods)?;

        Ok(totals)
    }

    /// Pipeline for voiding.
    ///
    /// # Errors
    ///
    /// Returns `CannotVoidPosted` or `AlreadyVoided`.
    pub fn validate_void(entry: &EntrySnapshot) -> Result<(), LedgerError> {
        match entry.status {
            EntryStatus::Draft => Ok(()),
            EntryStatus::Posted => Err(LedgerError::CannotVoidPosted(entry.id)),
            EntryStatus::Void => Err(LedgerError::AlreadyVoided(entry.id)),
        }
    }

    /// Pipeline for deleting.
    ///
    /// # Errors
    ///
    /// Returns `CannotDeletePosted` for posted entries.
    pub fn validate_delete(entry: &EntrySnapshot) -> Result<(), LedgerError> {
        if entry.status == EntryStatus::Posted {
            return Err(LedgerError::CannotDeletePosted(entry.id));
        }
        Ok(())
    }

    /// Compares the committed header with the requested one.
    ///
    /// - Void entries accept no change at all.
    /// - Posted entries keep their status and date, and cannot be saved
    ///   while their date is in a closed period.
    /// - Drafts may change freely, except that status changes go through
    ///   posting or voiding.
    ///
    /// # Errors
    ///
    /// Returns `EntryVoided`, `PostedStatusImmutable`, `PostedDateImmutable`,
    /// `PeriodClosed` or `EntryNotDraft`.
    pub fn validate_update(
        entry_id: Uuid,
        before: &EntryState,
        after: &EntryState,
        periods: &[PeriodInfo],
    ) -> Result<(), LedgerError> {
        match before.status {
            EntryStatus::Void => Err(LedgerError::EntryVoided(entry_id)),
            EntryStatus::Posted => {
                if after.status != before.status {
                    return Err(LedgerError::PostedStatusImmutable(entry_id));
                }
                if after.date != before.date {
                    return Err(LedgerError::PostedDateImmutable(entry_id));
                }
                PeriodRules::ensure_open(after.date, periods)
            }
            EntryStatus::Draft => {
                if after.status != before.status {
                    return Err(LedgerError::EntryNotDraft {
                        entry_id,
                        status: after.status,
                    });
                }
                Ok(())
            }
        }
    }
}

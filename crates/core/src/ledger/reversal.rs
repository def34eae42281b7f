//! Reversal of posted journal entries.
//!
//! A reversal is a new entry in the same ledger with debit and credit
//! swapped on every line. It is posted through the normal posting pipeline.

use super::error::LedgerError;
use super::types::{EntrySnapshot, EntryStatus, ItemLine};

/// Prefix for reversed item descriptions.
pub const REVERSAL_ITEM_PREFIX: &str = "Reversal: ";

/// Lines and header text of a reversing entry.
#[derive(Debug, Clone)]
pub struct ReversalPlan {
    /// Description for the reversing entry.
    pub description: String,
    /// Mirrored lines.
    pub items: Vec<ItemLine>,
}

/// Stateless service for creating reversing entries.
pub struct ReversalService;

impl ReversalService {
    /// Checks that an entry may be reversed.
    ///
    /// # Errors
    ///
    /// - `NotPosted` unless the entry is posted
    /// - `AlreadyReversed` if a reversal exists
    /// - `CannotReverseReversal` if the entry is itself a reversal
    pub fn validate_can_reverse(entry: &EntrySnapshot) -> Result<(), LedgerError> {
        if entry.status != EntryStatus::Posted {
            return Err(LedgerError::NotPosted {
                entry_id: entry.id,
                status: entry.status,
            });
        }
        if entry.has_reversal {
            return Err(LedgerError::AlreadyReversed(entry.id));
        }
        if entry.is_reversal {
            return Err(LedgerError::CannotReverseReversal(entry.id));
        }
        Ok(())
    }

    /// Builds the mirrored lines for `entry_number`'s items.
    #[must_use]
    pub fn build(entry_number: i64, items: &[ItemLine]) -> ReversalPlan {
        let items = items
            .iter()
            .map(|item| ItemLine {
                account_id: item.account_id,
                debit: item.credit,
                credit: item.debit,
                description: Some(match item.description.as_deref() {
                    Some(text) if !text.is_empty() => format!("{REVERSAL_ITEM_PREFIX}{text}"),
                    _ => format!("{REVERSAL_ITEM_PREFIX}entry #{entry_number}"),
                }),
            })
            .collect();

        ReversalPlan {
            description: format!("Reversal of entry #{entry_number}"),
            items,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    use crate::ledger::service::JournalService;

    fn posted() -> EntrySnapshot {
        EntrySnapshot {
            id: Uuid::new_v4(),
            ledger_id: Uuid::new_v4(),
            number: 12,
            date: NaiveDate::from_ymd_opt(2026, 5, 1).unwrap(),
            status: EntryStatus::Posted,
            is_reversal: false,
            has_reversal: false,
        }
    }

    #[test]
    fn test_reversal_swaps_sides() {
        let cash = Uuid::new_v4();
        let revenue = Uuid::new_v4();
        let items = vec![
            ItemLine::debit(cash, dec!(100), Some("Till".to_string())),
            ItemLine::credit(revenue, dec!(100), None),
        ];

        let plan = ReversalService::build(12, &items);

        assert_eq!(plan.description, "Reversal of entry #12");
        assert_eq!(plan.items.len(), 2);
        assert_eq!(plan.items[0].account_id, cash);
        assert_eq!(plan.items[0].debit, dec!(0));
        assert_eq!(plan.items[0].credit, dec!(100));
        assert_eq!(plan.items[0].description.as_deref(), Some("Reversal: Till"));
        assert_eq!(plan.items[1].debit, dec!(100));
        assert_eq!(plan.items[1].credit, dec!(0));
        assert_eq!(
            plan.items[1].description.as_deref(),
            Some("Reversal: entry #12")
        );
    }

    #[test]
    fn test_reversal_totals_mirror_original() {
        let items = vec![
            ItemLine::debit(Uuid::new_v4(), dec!(70.50), None),
            ItemLine::debit(Uuid::new_v4(), dec!(29.50), None),
            ItemLine::credit(Uuid::new_v4(), dec!(100.00), None),
        ];
        let original = JournalService::calculate_totals(&items);
        let reversed = JournalService::calculate_totals(&ReversalService::build(1, &items).items);
        assert_eq!(original.debit, reversed.credit);
        assert_eq!(original.credit, reversed.debit);
    }

    #[test]
    fn test_can_reverse_posted() {
        assert!(ReversalService::validate_can_reverse(&posted()).is_ok());
    }

    #[test]
    fn test_cannot_reverse_draft() {
        let mut entry = posted();
        entry.status = EntryStatus::Draft;
        assert!(matches!(
            ReversalService::validate_can_reverse(&entry),
            Err(LedgerError::NotPosted { .. })
        ));
    }

    #[test]
    fn test_cannot_reverse_twice() {
        let mut entry = posted();
        entry.has_reversal = true;
        assert!(matches!(
            ReversalService::validate_can_reverse(&entry),
            Err(LedgerError::AlreadyReversed(_))
        ));
    }

    #[test]
    fn test_cannot_reverse_a_reversal() {
        let mut entry = posted();
        entry.is_reversal = true;
        assert!(matches!(
            ReversalService::validate_can_reverse(&entry),
            Err(LedgerError::CannotReverseReversal(_))
        ));
    }
}

//! Property-based tests for journal posting and reversal.
//!
//! - Balanced lines always pass the posting pipeline
//! - Any non-zero imbalance is rejected exactly, without rounding
//! - Reversal swaps totals and leaves the line count unchanged

use chrono::NaiveDate;
use proptest::prelude::*;
use rust_decimal::Decimal;
use uuid::Uuid;

use super::error::LedgerError;
use super::reversal::ReversalService;
use super::service::JournalService;
use super::types::{EntrySnapshot, EntryStatus, ItemLine};

/// Strategy to generate positive money amounts (0.01 to 10,000.00).
fn positive_amount() -> impl Strategy<Value = Decimal> {
    (1i64..1_000_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

fn draft() -> EntrySnapshot {
    EntrySnapshot {
        id: Uuid::new_v4(),
        ledger_id: Uuid::new_v4(),
        number: 1,
        date: NaiveDate::from_ymd_opt(2026, 6, 1).unwrap(),
        status: EntryStatus::Draft,
        is_reversal: false,
        has_reversal: false,
    }
}

/// Splits the sum of `debits` into credit lines of the same amounts.
fn balanced_lines(debits: &[Decimal]) -> Vec<ItemLine> {
    let mut lines: Vec<ItemLine> = debits
        .iter()
        .map(|amount| ItemLine::debit(Uuid::new_v4(), *amount, None))
        .collect();
    let total: Decimal = debits.iter().copied().sum();
    lines.push(ItemLine::credit(Uuid::new_v4(), total, None));
    lines
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn prop_balanced_entries_post(debits in prop::collection::vec(positive_amount(), 1..10)) {
        let lines = balanced_lines(&debits);
        let totals = JournalService::validate_post(&draft(), &lines, &[]).unwrap();
        prop_assert_eq!(totals.debit, totals.credit);
        prop_assert!(totals.difference().is_zero());
    }

    #[test]
    fn prop_imbalance_is_rejected(
        debits in prop::collection::vec(positive_amount(), 1..10),
        skew in 1i64..1000i64,
    ) {
        let mut lines = balanced_lines(&debits);
        lines.push(ItemLine::debit(Uuid::new_v4(), Decimal::new(skew, 2), None));
        let result = JournalService::validate_post(&draft(), &lines, &[]);
        let is_unbalanced = matches!(result, Err(LedgerError::Unbalanced { .. }));
        prop_assert!(is_unbalanced);
    }

    #[test]
    fn prop_reversal_mirrors_totals(debits in prop::collection::vec(positive_amount(), 1..10)) {
        let lines = balanced_lines(&debits);
        let plan = ReversalService::build(7, &lines);
        let original = JournalService::calculate_totals(&lines);
        let reversed = JournalService::calculate_totals(&plan.items);
        prop_assert_eq!(plan.items.len(), lines.len());
        prop_assert_eq!(original.debit, reversed.credit);
        prop_assert_eq!(original.credit, reversed.debit);
        for (before, after) in lines.iter().zip(plan.items.iter()) {
            prop_assert_eq!(before.account_id, after.account_id);
            prop_assert!(JournalService::validate_amount_shape(after.debit, after.credit).is_ok());
        }
    }

    #[test]
    fn prop_next_number_is_strictly_greater(max in 1i64..1_000_000i64) {
        let next = JournalService::next_entry_number(Some(max));
        prop_assert!(next > max);
        prop_assert!(JournalService::validate_number(next).is_ok());
    }
}

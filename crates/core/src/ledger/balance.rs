//! Account balances and the trial balance.
//!
//! Balances are aggregated from posted items only. Each account's net
//! balance is signed by its normal side.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::chart::NormalSide;

/// Account header needed to render a trial balance row.
#[derive(Debug, Clone)]
pub struct AccountSummary {
    /// Account ID.
    pub id: Uuid,
    /// Account code.
    pub code: String,
    /// Account name.
    pub name: String,
    /// Normal side.
    pub normal_side: NormalSide,
}

/// Posted amounts against one account.
#[derive(Debug, Clone, Copy)]
pub struct Posting {
    /// Account posted to.
    pub account_id: Uuid,
    /// Debit amount.
    pub debit: Decimal,
    /// Credit amount.
    pub credit: Decimal,
}

/// Account balance at a point in time.
#[derive(Debug, Clone, Serialize)]
pub struct AccountBalance {
    /// The account ID.
    pub account_id: Uuid,
    /// Total debit amount.
    pub debit_total: Decimal,
    /// Total credit amount.
    pub credit_total: Decimal,
    /// Net balance signed by the normal side.
    pub balance: Decimal,
}

impl AccountBalance {
    /// Aggregates postings for a single account.
    #[must_use]
    pub fn from_postings<I>(account_id: Uuid, normal_side: NormalSide, postings: I) -> Self
    where
        I: IntoIterator<Item = Posting>,
    {
        let (debit_total, credit_total) = postings
            .into_iter()
            .filter(|p| p.account_id == account_id)
            .fold((Decimal::ZERO, Decimal::ZERO), |(d, c), p| {
                (d + p.debit, c + p.credit)
            });
        Self {
            account_id,
            debit_total,
            credit_total,
            balance: normal_side.balance(debit_total, credit_total),
        }
    }
}

/// One row of a trial balance.
#[derive(Debug, Clone, Serialize)]
pub struct TrialBalanceRow {
    /// Account ID.
    pub account_id: Uuid,
    /// Account code.
    pub code: String,
    /// Account name.
    pub name: String,
    /// Total debits in range.
    pub debit: Decimal,
    /// Total credits in range.
    pub credit: Decimal,
    /// Net balance signed by the normal side.
    pub balance: Decimal,
}

/// Trial balance for a date range.
#[derive(Debug, Clone, Serialize)]
pub struct TrialBalance {
    /// Rows ordered by account code, only accounts with activity.
    pub rows: Vec<TrialBalanceRow>,
    /// Sum of all debits.
    pub total_debit: Decimal,
    /// Sum of all credits.
    pub total_credit: Decimal,
    /// `total_debit - total_credit`; zero for a consistent ledger.
    pub difference: Decimal,
}

impl TrialBalance {
    /// Builds a trial balance from account headers and posted amounts.
    ///
    /// Postings against accounts missing from `accounts` are still counted
    /// in the totals so a difference can never hide.
    #[must_use]
    pub fn build<I>(accounts: &[AccountSummary], postings: I) -> Self
    where
        I: IntoIterator<Item = Posting>,
    {
        let mut sums: HashMap<Uuid, (Decimal, Decimal)> = HashMap::new();
        let mut total_debit = Decimal::ZERO;
        let mut total_credit = Decimal::ZERO;

        for posting in postings {
            let entry = sums
                .entry(posting.account_id)
                .or_insert((Decimal::ZERO, Decimal::ZERO));
            entry.0 += posting.debit;
            entry.1 += posting.credit;
            total_debit += posting.debit;
            total_credit += posting.credit;
        }

        let mut rows: Vec<TrialBalanceRow> = accounts
            .iter()
            .filter_map(|account| {
                sums.get(&account.id).map(|&(debit, credit)| TrialBalanceRow {
                    account_id: account.id,
                    code: account.code.clone(),
                    name: account.name.clone(),
                    debit,
                    credit,
                    balance: account.normal_side.balance(debit, credit),
                })
            })
            .collect();
        rows.sort_by(|a, b| a.code.cmp(&b.code));

        Self {
            rows,
            total_debit,
            total_credit,
            difference: total_debit - total_credit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn summary(code: &str, side: NormalSide) -> AccountSummary {
        AccountSummary {
            id: Uuid::new_v4(),
            code: code.to_string(),
            name: format!("Account {code}"),
            normal_side: side,
        }
    }

    fn posting(account: &AccountSummary, debit: Decimal, credit: Decimal) -> Posting {
        Posting {
            account_id: account.id,
            debit,
            credit,
        }
    }

    #[test]
    fn test_trial_balance_rows_and_totals() {
        let cash = summary("1000", NormalSide::Debit);
        let revenue = summary("6000", NormalSide::Credit);
        let vat = summary("2400", NormalSide::Credit);
        let idle = summary("9999", NormalSide::Debit);
        let accounts = vec![revenue.clone(), cash.clone(), vat.clone(), idle];

        let postings = vec![
            posting(&cash, dec!(125.00), dec!(0)),
            posting(&revenue, dec!(0), dec!(100.00)),
            posting(&vat, dec!(0), dec!(25.00)),
        ];

        let tb = TrialBalance::build(&accounts, postings);

        assert_eq!(tb.rows.len(), 3);
        assert_eq!(tb.rows[0].code, "1000");
        assert_eq!(tb.rows[1].code, "2400");
        assert_eq!(tb.rows[2].code, "6000");
        assert_eq!(tb.rows[0].balance, dec!(125.00));
        assert_eq!(tb.rows[2].balance, dec!(100.00));
        assert_eq!(tb.total_debit, dec!(125.00));
        assert_eq!(tb.total_credit, dec!(125.00));
        assert_eq!(tb.difference, dec!(0));
    }

    #[test]
    fn test_trial_balance_keeps_unknown_accounts_in_totals() {
        let cash = summary("1000", NormalSide::Debit);
        let postings = vec![
            posting(&cash, dec!(10), dec!(0)),
            Posting {
                account_id: Uuid::new_v4(),
                debit: dec!(0),
                credit: dec!(4),
            },
        ];
        let tb = TrialBalance::build(&[cash], postings);
        assert_eq!(tb.rows.len(), 1);
        assert_eq!(tb.difference, dec!(6));
    }

    #[test]
    fn test_account_balance_credit_normal() {
        let revenue = summary("6000", NormalSide::Credit);
        let postings = vec![
            posting(&revenue, dec!(0), dec!(80)),
            posting(&revenue, dec!(20), dec!(0)),
            Posting {
                account_id: Uuid::new_v4(),
                debit: dec!(999),
                credit: dec!(0),
            },
        ];
        let balance = AccountBalance::from_postings(revenue.id, revenue.normal_side, postings);
        assert_eq!(balance.debit_total, dec!(20));
        assert_eq!(balance.credit_total, dec!(80));
        assert_eq!(balance.balance, dec!(60));
    }
}

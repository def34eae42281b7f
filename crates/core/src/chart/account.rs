//! Account tree rules.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ledger::error::LedgerError;

/// Account classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    /// Asset account.
    Asset,
    /// Liability account.
    Liability,
    /// Equity account.
    Equity,
    /// Income account.
    Income,
    /// Expense account.
    Expense,
}

impl AccountType {
    /// The side on which increases of this account type are usually recorded.
    #[must_use]
    pub const fn default_normal_side(self) -> NormalSide {
        match self {
            Self::Asset | Self::Expense => NormalSide::Debit,
            Self::Liability | Self::Equity | Self::Income => NormalSide::Credit,
        }
    }
}

/// Side on which an account's increases are recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NormalSide {
    /// Increases are debits.
    Debit,
    /// Increases are credits.
    Credit,
}

impl NormalSide {
    /// Net balance of the given totals, positive when the account has grown.
    ///
    /// - Debit-normal: `debit - credit`
    /// - Credit-normal: `credit - debit`
    #[must_use]
    pub fn balance(self, debit: Decimal, credit: Decimal) -> Decimal {
        match self {
            Self::Debit => debit - credit,
            Self::Credit => credit - debit,
        }
    }
}

/// Snapshot of an account as seen by posting rules.
#[derive(Debug, Clone)]
pub struct AccountInfo {
    /// Account ID.
    pub id: Uuid,
    /// Ledger the account belongs to.
    pub ledger_id: Uuid,
    /// Whether journal items may reference this account.
    pub is_postable: bool,
    /// Whether the account is active.
    pub is_active: bool,
}

/// Input for creating an account.
#[derive(Debug, Clone)]
pub struct NewAccount {
    /// Ledger the account belongs to.
    pub ledger_id: Uuid,
    /// Account code, unique per ledger (e.g. "1310").
    pub code: String,
    /// Display name.
    pub name: String,
    /// Classification.
    pub account_type: AccountType,
    /// Normal side; defaults from the type when absent.
    pub normal_side: Option<NormalSide>,
    /// Whether journal items may reference this account.
    pub is_postable: bool,
    /// Optional parent in the same ledger.
    pub parent_id: Option<Uuid>,
}

impl NewAccount {
    /// Normal side to store: the explicit one, or the type's default.
    #[must_use]
    pub fn resolved_normal_side(&self) -> NormalSide {
        self.normal_side
            .unwrap_or_else(|| self.account_type.default_normal_side())
    }
}

/// Snapshot of a prospective parent account.
#[derive(Debug, Clone)]
pub struct ParentInfo {
    /// Parent account ID.
    pub id: Uuid,
    /// Ledger the parent belongs to.
    pub ledger_id: Uuid,
    /// Whether the parent is postable.
    pub is_postable: bool,
}

/// Stateless rules for the account tree.
pub struct AccountRules;

impl AccountRules {
    /// Validates a new account against its parent.
    ///
    /// # Errors
    ///
    /// - `InvalidAccountCode` if the code is blank
    /// - `ParentLedgerMismatch` if the parent lives in another ledger
    /// - `ParentIsPostable` if the parent still accepts postings
    pub fn validate_new(input: &NewAccount, parent: Option<&ParentInfo>) -> Result<(), LedgerError> {
        if input.code.trim().is_empty() {
            return Err(LedgerError::InvalidAccountCode);
        }

        if let Some(parent) = parent {
            if parent.ledger_id != input.ledger_id {
                return Err(LedgerError::ParentLedgerMismatch {
                    parent_id: parent.id,
                });
            }
            if parent.is_postable {
                return Err(LedgerError::ParentIsPostable(parent.id));
            }
        }

        Ok(())
    }

    /// Validates toggling `is_postable` on an existing account.
    ///
    /// # Errors
    ///
    /// Returns `AccountHasChildren` when making a parent postable.
    pub fn validate_postable_change(
        account_id: Uuid,
        is_postable: bool,
        child_count: u64,
    ) -> Result<(), LedgerError> {
        if is_postable && child_count > 0 {
            return Err(LedgerError::AccountHasChildren(account_id));
        }
        Ok(())
    }

    /// Validates deleting an account.
    ///
    /// # Errors
    ///
    /// Returns `AccountHasChildren` or `AccountInUse`.
    pub fn validate_delete(
        account_id: Uuid,
        child_count: u64,
        item_count: u64,
    ) -> Result<(), LedgerError> {
        if child_count > 0 {
            return Err(LedgerError::AccountHasChildren(account_id));
        }
        if item_count > 0 {
            return Err(LedgerError::AccountInUse(account_id));
        }
        Ok(())
    }

    /// Validates that an account may receive a journal item in `entry_ledger`.
    ///
    /// Checks run in order: postable, same ledger, active.
    ///
    /// # Errors
    ///
    /// Returns `AccountNotPostable`, `AccountLedgerMismatch` or `AccountInactive`.
    pub fn validate_for_posting(account: &AccountInfo, entry_ledger: Uuid) -> Result<(), LedgerError> {
        if !account.is_postable {
            return Err(LedgerError::AccountNotPostable(account.id));
        }
        if account.ledger_id != entry_ledger {
            return Err(LedgerError::AccountLedgerMismatch {
                account_id: account.id,
                account_ledger: account.ledger_id,
                entry_ledger,
            });
        }
        if !account.is_active {
            return Err(LedgerError::AccountInactive(account.id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    fn new_account(ledger_id: Uuid, parent_id: Option<Uuid>) -> NewAccount {
        NewAccount {
            ledger_id,
            code: "1310".to_string(),
            name: "Inventory".to_string(),
            account_type: AccountType::Asset,
            normal_side: None,
            is_postable: true,
            parent_id,
        }
    }

    #[rstest]
    #[case(AccountType::Asset, NormalSide::Debit)]
    #[case(AccountType::Expense, NormalSide::Debit)]
    #[case(AccountType::Liability, NormalSide::Credit)]
    #[case(AccountType::Equity, NormalSide::Credit)]
    #[case(AccountType::Income, NormalSide::Credit)]
    fn test_default_normal_side(#[case] account_type: AccountType, #[case] side: NormalSide) {
        assert_eq!(account_type.default_normal_side(), side);
    }

    #[test]
    fn test_explicit_normal_side_wins() {
        let mut input = new_account(Uuid::new_v4(), None);
        input.normal_side = Some(NormalSide::Credit);
        assert_eq!(input.resolved_normal_side(), NormalSide::Credit);
    }

    #[test]
    fn test_normal_side_balance() {
        assert_eq!(NormalSide::Debit.balance(dec!(100), dec!(30)), dec!(70));
        assert_eq!(NormalSide::Credit.balance(dec!(100), dec!(30)), dec!(-70));
    }

    #[test]
    fn test_validate_new_without_parent() {
        assert!(AccountRules::validate_new(&new_account(Uuid::new_v4(), None), None).is_ok());
    }

    #[test]
    fn test_validate_new_blank_code() {
        let mut input = new_account(Uuid::new_v4(), None);
        input.code = "  ".to_string();
        assert!(matches!(
            AccountRules::validate_new(&input, None),
            Err(LedgerError::InvalidAccountCode)
        ));
    }

    #[test]
    fn test_validate_new_parent_in_other_ledger() {
        let parent = ParentInfo {
            id: Uuid::new_v4(),
            ledger_id: Uuid::new_v4(),
            is_postable: false,
        };
        let input = new_account(Uuid::new_v4(), Some(parent.id));
        assert!(matches!(
            AccountRules::validate_new(&input, Some(&parent)),
            Err(LedgerError::ParentLedgerMismatch { .. })
        ));
    }

    #[test]
    fn test_validate_new_postable_parent() {
        let ledger_id = Uuid::new_v4();
        let parent = ParentInfo {
            id: Uuid::new_v4(),
            ledger_id,
            is_postable: true,
        };
        let input = new_account(ledger_id, Some(parent.id));
        assert!(matches!(
            AccountRules::validate_new(&input, Some(&parent)),
            Err(LedgerError::ParentIsPostable(id)) if id == parent.id
        ));
    }

    #[test]
    fn test_postable_change_with_children() {
        let id = Uuid::new_v4();
        assert!(AccountRules::validate_postable_change(id, false, 3).is_ok());
        assert!(AccountRules::validate_postable_change(id, true, 0).is_ok());
        assert!(matches!(
            AccountRules::validate_postable_change(id, true, 1),
            Err(LedgerError::AccountHasChildren(_))
        ));
    }

    #[test]
    fn test_validate_delete() {
        let id = Uuid::new_v4();
        assert!(AccountRules::validate_delete(id, 0, 0).is_ok());
        assert!(matches!(
            AccountRules::validate_delete(id, 1, 0),
            Err(LedgerError::AccountHasChildren(_))
        ));
        assert!(matches!(
            AccountRules::validate_delete(id, 0, 2),
            Err(LedgerError::AccountInUse(_))
        ));
    }

    #[test]
    fn test_validate_for_posting_order() {
        let entry_ledger = Uuid::new_v4();
        let account = AccountInfo {
            id: Uuid::new_v4(),
            ledger_id: Uuid::new_v4(),
            is_postable: false,
            is_active: false,
        };
        // Postability is reported before ledger or activity problems.
        assert!(matches!(
            AccountRules::validate_for_posting(&account, entry_ledger),
            Err(LedgerError::AccountNotPostable(_))
        ));

        let account = AccountInfo {
            is_postable: true,
            ..account
        };
        assert!(matches!(
            AccountRules::validate_for_posting(&account, entry_ledger),
            Err(LedgerError::AccountLedgerMismatch { .. })
        ));

        let account = AccountInfo {
            ledger_id: entry_ledger,
            ..account
        };
        assert!(matches!(
            AccountRules::validate_for_posting(&account, entry_ledger),
            Err(LedgerError::AccountInactive(_))
        ));

        let account = AccountInfo {
            is_active: true,
            ..account
        };
        assert!(AccountRules::validate_for_posting(&account, entry_ledger).is_ok());
    }
}

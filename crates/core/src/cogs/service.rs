//! Builders for COGS and sales journal entries.

use rust_decimal::Decimal;
use tally_shared::types::{MONEY_SCALE, fits_scale, round_money};
use uuid::Uuid;

use super::error::CogsError;
use crate::chart::{AccountInfo, AccountRules};
use crate::ledger::ItemLine;
use crate::stock::MoveType;

/// Header text and lines of an entry to create.
#[derive(Debug, Clone)]
pub struct EntryPlan {
    /// Entry description.
    pub description: String,
    /// Balanced lines.
    pub items: Vec<ItemLine>,
}

/// Amounts of a cash sale.
#[derive(Debug, Clone, Copy)]
pub struct SaleAmounts {
    /// Net revenue.
    pub net: Decimal,
    /// Output VAT.
    pub vat: Decimal,
}

impl SaleAmounts {
    /// Gross amount received.
    #[must_use]
    pub fn gross(&self) -> Decimal {
        self.net + self.vat
    }
}

/// Accounts a sale is booked against.
#[derive(Debug, Clone, Copy)]
pub struct SaleAccounts {
    /// Debited with the gross amount.
    pub cash: Uuid,
    /// Credited with the net amount.
    pub revenue: Uuid,
    /// Credited with the VAT amount.
    pub vat: Uuid,
}

/// Stateless COGS bridge rules.
pub struct CogsService;

impl CogsService {
    /// Checks that a move may receive a COGS entry.
    ///
    /// # Errors
    ///
    /// Returns `NotAnOutMove` or `AlreadyPosted`.
    pub fn validate_move(
        move_id: Uuid,
        move_type: MoveType,
        journal_entry_id: Option<Uuid>,
    ) -> Result<(), CogsError> {
        if move_type != MoveType::Out {
            return Err(CogsError::NotAnOutMove { move_id, move_type });
        }
        if journal_entry_id.is_some() {
            return Err(CogsError::AlreadyPosted(move_id));
        }
        Ok(())
    }

    /// Both accounts must accept postings.
    ///
    /// # Errors
    ///
    /// Returns `AccountNotPostable`, `AccountLedgerMismatch` or
    /// `AccountInactive` wrapped in `CogsError::Ledger`.
    pub fn validate_accounts(cogs: &AccountInfo, inventory: &AccountInfo) -> Result<(), CogsError> {
        AccountRules::validate_for_posting(cogs, cogs.ledger_id)?;
        AccountRules::validate_for_posting(inventory, cogs.ledger_id)?;
        Ok(())
    }

    /// `Σ qty × unit_cost`, rounded half-up to money scale.
    #[must_use]
    pub fn total_cost<I>(allocations: I) -> Decimal
    where
        I: IntoIterator<Item = (Decimal, Decimal)>,
    {
        round_money(
            allocations
                .into_iter()
                .map(|(qty, unit_cost)| qty * unit_cost)
                .sum(),
        )
    }

    /// Builds the COGS entry: debit COGS, credit Inventory.
    ///
    /// # Errors
    ///
    /// Returns `ZeroCost` unless `total` is strictly positive.
    pub fn build_cogs_entry(
        move_id: Uuid,
        reference: Option<&str>,
        total: Decimal,
        cogs_account: Uuid,
        inventory_account: Uuid,
    ) -> Result<EntryPlan, CogsError> {
        if total <= Decimal::ZERO {
            return Err(CogsError::ZeroCost(move_id));
        }
        let label = reference
            .filter(|r| !r.is_empty())
            .map_or_else(|| move_id.to_string(), str::to_string);
        let description = format!("COGS for stock move {label}");
        Ok(EntryPlan {
            items: vec![
                ItemLine::debit(cogs_account, total, Some(description.clone())),
                ItemLine::credit(inventory_account, total, Some(description.clone())),
            ],
            description,
        })
    }

    /// Builds a cash sale entry: debit cash gross, credit revenue net,
    /// credit VAT when positive.
    ///
    /// # Errors
    ///
    /// Returns `InvalidSaleAmount` for negative amounts, amounts beyond money
    /// scale, or a zero gross.
    pub fn build_sale_entry(
        reference: &str,
        amounts: SaleAmounts,
        accounts: SaleAccounts,
    ) -> Result<EntryPlan, CogsError> {
        let SaleAmounts { net, vat } = amounts;
        let valid = net >= Decimal::ZERO
            && vat >= Decimal::ZERO
            && amounts.gross() > Decimal::ZERO
            && fits_scale(net, MONEY_SCALE)
            && fits_scale(vat, MONEY_SCALE);
        if !valid {
            return Err(CogsError::InvalidSaleAmount { net, vat });
        }

        let description = if reference.is_empty() {
            "Sale".to_string()
        } else {
            format!("Sale {reference}")
        };

        let mut items = vec![ItemLine::debit(
            accounts.cash,
            amounts.gross(),
            Some(description.clone()),
        )];
        if net > Decimal::ZERO {
            items.push(ItemLine::credit(accounts.revenue, net, Some(description.clone())));
        }
        if vat > Decimal::ZERO {
            items.push(ItemLine::credit(accounts.vat, vat, Some(description.clone())));
        }

        Ok(EntryPlan { description, items })
    }

    /// Quantity to move into the sale warehouse before a sale.
    #[must_use]
    pub fn replenish_quantity(requested: Decimal, available: Decimal) -> Decimal {
        (requested - available.max(Decimal::ZERO)).max(Decimal::ZERO)
    }
}

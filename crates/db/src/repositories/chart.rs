//! Chart of accounts repository: ledgers, accounts and periods.

use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use tracing::info;
use uuid::Uuid;

use tally_core::chart::{AccountRules, NewAccount, ParentInfo, PeriodInfo, PeriodRules};
use tally_core::ledger::LedgerError;

use super::pg;
use crate::entities::{accounts, journal_items, ledgers, periods};

/// Input for creating a period.
#[derive(Debug, Clone)]
pub struct CreatePeriodInput {
    /// Ledger the period belongs to.
    pub ledger_id: Uuid,
    /// Name, unique per ledger.
    pub name: String,
    /// First day (inclusive).
    pub start_date: NaiveDate,
    /// Last day (inclusive).
    pub end_date: NaiveDate,
}

/// Repository for ledgers, the account tree and periods.
#[derive(Debug, Clone)]
pub struct ChartRepository {
    db: DatabaseConnection,
}

impl ChartRepository {
    /// Creates a new chart repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    // ========================================================================
    // Ledgers
    // ========================================================================

    /// Creates a ledger.
    pub async fn create_ledger(
        &self,
        name: &str,
        tax_id: Option<String>,
    ) -> Result<ledgers::Model, LedgerError> {
        self.create_ledger_with_id(Uuid::now_v7(), name, tax_id).await
    }

    /// Creates a ledger with a caller-chosen id (the configured ledger).
    pub async fn create_ledger_with_id(
        &self,
        id: Uuid,
        name: &str,
        tax_id: Option<String>,
    ) -> Result<ledgers::Model, LedgerError> {
        if name.trim().is_empty() {
            return Err(LedgerError::InvalidLedgerName);
        }

        let now = Utc::now().into();
        let ledger = ledgers::ActiveModel {
            id: Set(id),
            name: Set(name.trim().to_string()),
            tax_id: Set(tax_id),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&self.db)
        .await
        .map_err(pg::ledger_error)?;

        info!(ledger_id = %ledger.id, name = %ledger.name, "Ledger created");
        Ok(ledger)
    }

    /// Gets a ledger by ID.
    pub async fn get_ledger(&self, ledger_id: Uuid) -> Result<ledgers::Model, LedgerError> {
        ledgers::Entity::find_by_id(ledger_id)
            .one(&self.db)
            .await
            .map_err(pg::ledger_error)?
            .ok_or(LedgerError::LedgerNotFound(ledger_id))
    }

    // ========================================================================
    // Accounts
    // ========================================================================

    /// Creates an account in the chart.
    ///
    /// The parent row is locked so it cannot become postable concurrently.
    pub async fn create_account(&self, input: NewAccount) -> Result<accounts::Model, LedgerError> {
        let txn = self.db.begin().await.map_err(pg::ledger_error)?;

        ledgers::Entity::find_by_id(input.ledger_id)
            .one(&txn)
            .await
            .map_err(pg::ledger_error)?
            .ok_or(LedgerError::LedgerNotFound(input.ledger_id))?;

        let parent = match input.parent_id {
            Some(parent_id) => {
                let parent = accounts::Entity::find_by_id(parent_id)
                    .lock_exclusive()
                    .one(&txn)
                    .await
                    .map_err(pg::ledger_error)?
                    .ok_or(LedgerError::AccountNotFound(parent_id))?;
                Some(ParentInfo {
                    id: parent.id,
                    ledger_id: parent.ledger_id,
                    is_postable: parent.is_postable,
                })
            }
            None => None,
        };

        AccountRules::validate_new(&input, parent.as_ref())?;

        let code = input.code.trim().to_string();
        let taken = accounts::Entity::find()
            .filter(accounts::Column::LedgerId.eq(input.ledger_id))
            .filter(accounts::Column::Code.eq(code.as_str()))
            .count(&txn)
            .await
            .map_err(pg::ledger_error)?;
        if taken > 0 {
            return Err(LedgerError::DuplicateAccountCode(code));
        }

        let now = Utc::now().into();
        let account = accounts::ActiveModel {
            id: Set(Uuid::now_v7()),
            ledger_id: Set(input.ledger_id),
            code: Set(code.clone()),
            name: Set(input.name.clone()),
            account_type: Set(input.account_type.into()),
            normal_side: Set(input.resolved_normal_side().into()),
            is_postable: Set(input.is_postable),
            is_active: Set(true),
            parent_id: Set(input.parent_id),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await
        .map_err(|e| {
            if pg::violates(&e, pg::UQ_ACCOUNTS_LEDGER_CODE) {
                LedgerError::DuplicateAccountCode(code.clone())
            } else {
                pg::ledger_error(e)
            }
        })?;

        txn.commit().await.map_err(pg::ledger_error)?;

        info!(
            account_id = %account.id,
            ledger_id = %account.ledger_id,
            code = %account.code,
            "Account created"
        );
        Ok(account)
    }

    /// Gets an account by ID.
    pub async fn get_account(&self, account_id: Uuid) -> Result<accounts::Model, LedgerError> {
        accounts::Entity::find_by_id(account_id)
            .one(&self.db)
            .await
            .map_err(pg::ledger_error)?
            .ok_or(LedgerError::AccountNotFound(account_id))
    }

    /// Lists the accounts of a ledger ordered by code.
    pub async fn list_accounts(&self, ledger_id: Uuid) -> Result<Vec<accounts::Model>, LedgerError> {
        accounts::Entity::find()
            .filter(accounts::Column::LedgerId.eq(ledger_id))
            .order_by_asc(accounts::Column::Code)
            .all(&self.db)
            .await
            .map_err(pg::ledger_error)
    }

    /// Activates or deactivates an account.
    pub async fn set_account_active(
        &self,
        account_id: Uuid,
        is_active: bool,
    ) -> Result<accounts::Model, LedgerError> {
        let txn = self.db.begin().await.map_err(pg::ledger_error)?;
        let account = lock_account(&txn, account_id).await?;

        let mut active: accounts::ActiveModel = account.into();
        active.is_active = Set(is_active);
        active.updated_at = Set(Utc::now().into());
        let account = active.update(&txn).await.map_err(pg::ledger_error)?;

        txn.commit().await.map_err(pg::ledger_error)?;

        info!(account_id = %account_id, is_active, "Account activation changed");
        Ok(account)
    }

    /// Toggles whether an account accepts postings.
    ///
    /// Accounts with children can never become postable.
    pub async fn set_account_postable(
        &self,
        account_id: Uuid,
        is_postable: bool,
    ) -> Result<accounts::Model, LedgerError> {
        let txn = self.db.begin().await.map_err(pg::ledger_error)?;
        let account = lock_account(&txn, account_id).await?;

        let child_count = count_children(&txn, account_id).await?;
        AccountRules::validate_postable_change(account_id, is_postable, child_count)?;

        let mut active: accounts::ActiveModel = account.into();
        active.is_postable = Set(is_postable);
        active.updated_at = Set(Utc::now().into());
        let account = active.update(&txn).await.map_err(pg::ledger_error)?;

        txn.commit().await.map_err(pg::ledger_error)?;

        info!(account_id = %account_id, is_postable, "Account postability changed");
        Ok(account)
    }

    /// Deletes an account that has no children and no journal items.
    pub async fn delete_account(&self, account_id: Uuid) -> Result<(), LedgerError> {
        let txn = self.db.begin().await.map_err(pg::ledger_error)?;
        let account = lock_account(&txn, account_id).await?;

        let child_count = count_children(&txn, account_id).await?;
        let item_count = journal_items::Entity::find()
            .filter(journal_items::Column::AccountId.eq(account_id))
            .count(&txn)
            .await
            .map_err(pg::ledger_error)?;
        AccountRules::validate_delete(account_id, child_count, item_count)?;

        accounts::Entity::delete_by_id(account.id)
            .exec(&txn)
            .await
            .map_err(pg::ledger_error)?;

        txn.commit().await.map_err(pg::ledger_error)?;

        info!(account_id = %account_id, "Account deleted");
        Ok(())
    }

    // ========================================================================
    // Periods
    // ========================================================================

    /// Creates a period.
    ///
    /// The ledger row is locked so concurrent creations see each other.
    pub async fn create_period(
        &self,
        input: CreatePeriodInput,
    ) -> Result<periods::Model, LedgerError> {
        let txn = self.db.begin().await.map_err(pg::ledger_error)?;

        ledgers::Entity::find_by_id(input.ledger_id)
            .lock_exclusive()
            .one(&txn)
            .await
            .map_err(pg::ledger_error)?
            .ok_or(LedgerError::LedgerNotFound(input.ledger_id))?;

        let existing: Vec<PeriodInfo> = periods::Entity::find()
            .filter(periods::Column::LedgerId.eq(input.ledger_id))
            .all(&txn)
            .await
            .map_err(pg::ledger_error)?
            .into_iter()
            .map(PeriodInfo::from)
            .collect();

        PeriodRules::validate_new(&input.name, input.start_date, input.end_date, &existing)?;

        let now = Utc::now().into();
        let period = periods::ActiveModel {
            id: Set(Uuid::now_v7()),
            ledger_id: Set(input.ledger_id),
            name: Set(input.name.clone()),
            start_date: Set(input.start_date),
            end_date: Set(input.end_date),
            is_closed: Set(false),
            closed_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await
        .map_err(|e| match pg::violated_constraint(&e) {
            Some(pg::UQ_PERIODS_LEDGER_NAME) => LedgerError::DuplicatePeriodName(input.name.clone()),
            Some(pg::EX_PERIODS_OVERLAP) => LedgerError::PeriodOverlap {
                name: input.name.clone(),
            },
            _ => pg::ledger_error(&e),
        })?;

        txn.commit().await.map_err(pg::ledger_error)?;

        info!(
            period_id = %period.id,
            ledger_id = %period.ledger_id,
            start = %period.start_date,
            end = %period.end_date,
            "Period created"
        );
        Ok(period)
    }

    /// Gets a period by ID.
    pub async fn get_period(&self, period_id: Uuid) -> Result<periods::Model, LedgerError> {
        periods::Entity::find_by_id(period_id)
            .one(&self.db)
            .await
            .map_err(pg::ledger_error)?
            .ok_or(LedgerError::PeriodNotFound(period_id))
    }

    /// Lists the periods of a ledger in date order.
    pub async fn list_periods(&self, ledger_id: Uuid) -> Result<Vec<periods::Model>, LedgerError> {
        periods::Entity::find()
            .filter(periods::Column::LedgerId.eq(ledger_id))
            .order_by_asc(periods::Column::StartDate)
            .all(&self.db)
            .await
            .map_err(pg::ledger_error)
    }

    /// Closes a period. Closing a closed period is a no-op.
    ///
    /// Takes `FOR UPDATE` on the period row; posting takes `FOR SHARE` on
    /// the same row, so a close and a post never interleave.
    pub async fn close_period(
        &self,
        period_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<periods::Model, LedgerError> {
        self.set_period_closed(period_id, Some(now)).await
    }

    /// Reopens a closed period. Reopening an open period is a no-op.
    pub async fn reopen_period(&self, period_id: Uuid) -> Result<periods::Model, LedgerError> {
        self.set_period_closed(period_id, None).await
    }

    async fn set_period_closed(
        &self,
        period_id: Uuid,
        closed_at: Option<DateTime<Utc>>,
    ) -> Result<periods::Model, LedgerError> {
        let txn = self.db.begin().await.map_err(pg::ledger_error)?;

        let period = periods::Entity::find_by_id(period_id)
            .lock_exclusive()
            .one(&txn)
            .await
            .map_err(pg::ledger_error)?
            .ok_or(LedgerError::PeriodNotFound(period_id))?;

        if period.is_closed == closed_at.is_some() {
            txn.commit().await.map_err(pg::ledger_error)?;
            return Ok(period);
        }

        let mut active: periods::ActiveModel = period.into();
        active.is_closed = Set(closed_at.is_some());
        active.closed_at = Set(closed_at.map(Into::into));
        active.updated_at = Set(Utc::now().into());
        let period = active.update(&txn).await.map_err(pg::ledger_error)?;

        txn.commit().await.map_err(pg::ledger_error)?;

        info!(period_id = %period_id, is_closed = period.is_closed, "Period status changed");
        Ok(period)
    }
}

async fn lock_account(
    txn: &DatabaseTransaction,
    account_id: Uuid,
) -> Result<accounts::Model, LedgerError> {
    accounts::Entity::find_by_id(account_id)
        .lock_exclusive()
        .one(txn)
        .await
        .map_err(pg::ledger_error)?
        .ok_or(LedgerError::AccountNotFound(account_id))
}

async fn count_children(txn: &DatabaseTransaction, account_id: Uuid) -> Result<u64, LedgerError> {
    accounts::Entity::find()
        .filter(accounts::Column::ParentId.eq(account_id))
        .count(txn)
        .await
        .map_err(pg::ledger_error)
}

/// Loads the periods covering `date` with `FOR SHARE`.
pub(crate) async fn periods_covering(
    txn: &DatabaseTransaction,
    ledger_id: Uuid,
    date: NaiveDate,
) -> Result<Vec<PeriodInfo>, LedgerError> {
    Ok(periods::Entity::find()
        .filter(periods::Column::LedgerId.eq(ledger_id))
        .filter(periods::Column::StartDate.lte(date))
        .filter(periods::Column::EndDate.gte(date))
        .lock_shared()
        .all(txn)
        .await
        .map_err(pg::ledger_error)?
        .into_iter()
        .map(PeriodInfo::from)
        .collect())
}

//! Journal repository: entries, items, posting and reversal.
//!
//! Each public operation loads the committed state inside its own database
//! transaction, runs the matching `JournalService` pipeline and only then
//! writes. The transaction-level helpers at the bottom of this file are
//! shared with the COGS bridge so stock moves and their entries commit
//! together.

use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use tally_core::chart::AccountInfo;
use tally_core::ledger::{
    AccountBalance, AccountSummary, EntrySnapshot, EntryState, ItemLine, JournalService,
    LedgerError, Posting, ReversalService, TrialBalance,
};

use super::chart::periods_covering;
use super::pg;
use crate::entities::{
    accounts, journal_entries, journal_items, ledgers, sea_orm_active_enums::EntryStatus,
};

/// Input for creating a draft entry.
#[derive(Debug, Clone)]
pub struct CreateEntryInput {
    /// Ledger the entry belongs to.
    pub ledger_id: Uuid,
    /// Caller-supplied number; `None` takes the next free number.
    pub number: Option<i64>,
    /// Entry date.
    pub date: NaiveDate,
    /// Description.
    pub description: String,
}

/// Changes to an entry header. `None` leaves the field as is.
#[derive(Debug, Clone, Default)]
pub struct UpdateEntryInput {
    /// New date.
    pub date: Option<NaiveDate>,
    /// New description.
    pub description: Option<String>,
}

/// Entry with its items.
#[derive(Debug, Clone)]
pub struct EntryWithItems {
    /// Entry header.
    pub entry: journal_entries::Model,
    /// Items in insertion order.
    pub items: Vec<journal_items::Model>,
}

/// Journal repository.
#[derive(Debug, Clone)]
pub struct JournalRepository {
    db: DatabaseConnection,
}

impl JournalRepository {
    /// Creates a new journal repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Creates a DRAFT entry.
    ///
    /// # Errors
    ///
    /// - `LedgerNotFound` if the ledger does not exist
    /// - `InvalidNumber` / `DuplicateNumber` for a bad caller-supplied number
    pub async fn create_draft(
        &self,
        input: CreateEntryInput,
    ) -> Result<journal_entries::Model, LedgerError> {
        let txn = self.db.begin().await.map_err(pg::ledger_error)?;
        let entry = insert_draft(&txn, &input, None).await?;
        txn.commit().await.map_err(pg::ledger_error)?;

        info!(
            entry_id = %entry.id,
            ledger_id = %entry.ledger_id,
            number = entry.number,
            "Draft entry created"
        );
        Ok(entry)
    }

    /// Adds an item to a DRAFT entry.
    ///
    /// # Errors
    ///
    /// Fails with `EntryNotDraft`, `AccountNotPostable`,
    /// `AccountLedgerMismatch`, `AccountInactive` or `InvalidAmountShape`,
    /// in that order.
    pub async fn add_item(
        &self,
        entry_id: Uuid,
        line: ItemLine,
    ) -> Result<journal_items::Model, LedgerError> {
        let txn = self.db.begin().await.map_err(pg::ledger_error)?;
        let (_, snapshot) = lock_entry(&txn, entry_id).await?;
        let item = insert_item(&txn, &snapshot, &line).await?;
        txn.commit().await.map_err(pg::ledger_error)?;

        debug!(entry_id = %entry_id, item_id = %item.id, "Item added");
        Ok(item)
    }

    /// Removes an item from a DRAFT entry.
    pub async fn remove_item(&self, item_id: Uuid) -> Result<(), LedgerError> {
        let txn = self.db.begin().await.map_err(pg::ledger_error)?;

        let item = journal_items::Entity::find_by_id(item_id)
            .one(&txn)
            .await
            .map_err(pg::ledger_error)?
            .ok_or(LedgerError::ItemNotFound(item_id))?;
        let (_, snapshot) = lock_entry(&txn, item.entry_id).await?;
        JournalService::validate_remove_item(&snapshot)?;

        journal_items::Entity::delete_by_id(item_id)
            .exec(&txn)
            .await
            .map_err(pg::ledger_error)?;
        txn.commit().await.map_err(pg::ledger_error)?;

        debug!(entry_id = %item.entry_id, item_id = %item_id, "Item removed");
        Ok(())
    }

    /// Changes the date and/or description of an entry.
    ///
    /// The committed state is compared with the requested one: VOID entries
    /// are frozen, POSTED entries may only change their description and only
    /// while their date is outside every closed period.
    pub async fn update_entry(
        &self,
        entry_id: Uuid,
        input: UpdateEntryInput,
    ) -> Result<journal_entries::Model, LedgerError> {
        let txn = self.db.begin().await.map_err(pg::ledger_error)?;
        let (entry, _) = lock_entry(&txn, entry_id).await?;

        let before = EntryState {
            status: entry.status.into(),
            date: entry.date,
            description: entry.description.clone(),
        };
        let after = EntryState {
            status: before.status,
            date: input.date.unwrap_or(before.date),
            description: input
                .description
                .clone()
                .unwrap_or_else(|| before.description.clone()),
        };
        let periods = periods_covering(&txn, entry.ledger_id, after.date).await?;
        JournalService::validate_update(entry_id, &before, &after, &periods)?;

        let mut active: journal_entries::ActiveModel = entry.into();
        active.date = Set(after.date);
        active.description = Set(after.description);
        active.updated_at = Set(Utc::now().into());
        let entry = active.update(&txn).await.map_err(pg::ledger_error)?;

        txn.commit().await.map_err(pg::ledger_error)?;

        info!(entry_id = %entry_id, "Entry updated");
        Ok(entry)
    }

    /// Posts a DRAFT entry.
    ///
    /// # Errors
    ///
    /// Fails with `NotDraft`, `EmptyEntry`, `Unbalanced` or `PeriodClosed`.
    pub async fn post(
        &self,
        entry_id: Uuid,
        actor: &str,
        now: DateTime<Utc>,
    ) -> Result<journal_entries::Model, LedgerError> {
        let txn = self.db.begin().await.map_err(pg::ledger_error)?;
        let entry = post_entry(&txn, entry_id, actor, now).await?;
        txn.commit().await.map_err(pg::ledger_error)?;

        info!(
            entry_id = %entry.id,
            number = entry.number,
            actor = %actor,
            "Entry posted"
        );
        Ok(entry)
    }

    /// Voids a DRAFT entry.
    ///
    /// # Errors
    ///
    /// `CannotVoidPosted` for posted entries, `AlreadyVoided` for void ones.
    pub async fn void(&self, entry_id: Uuid) -> Result<journal_entries::Model, LedgerError> {
        let txn = self.db.begin().await.map_err(pg::ledger_error)?;
        let (entry, snapshot) = lock_entry(&txn, entry_id).await?;
        JournalService::validate_void(&snapshot)?;

        let mut active: journal_entries::ActiveModel = entry.into();
        active.status = Set(EntryStatus::Void);
        active.updated_at = Set(Utc::now().into());
        let entry = active.update(&txn).await.map_err(pg::ledger_error)?;

        txn.commit().await.map_err(pg::ledger_error)?;

        info!(entry_id = %entry_id, "Entry voided");
        Ok(entry)
    }

    /// Deletes a DRAFT or VOID entry together with its items.
    ///
    /// # Errors
    ///
    /// `CannotDeletePosted` for posted entries.
    pub async fn delete(&self, entry_id: Uuid) -> Result<(), LedgerError> {
        let txn = self.db.begin().await.map_err(pg::ledger_error)?;
        let (_, snapshot) = lock_entry(&txn, entry_id).await?;
        JournalService::validate_delete(&snapshot)?;

        journal_entries::Entity::delete_by_id(entry_id)
            .exec(&txn)
            .await
            .map_err(pg::ledger_error)?;
        txn.commit().await.map_err(pg::ledger_error)?;

        info!(entry_id = %entry_id, "Entry deleted");
        Ok(())
    }

    /// Gets an entry with its items.
    pub async fn get_entry(&self, entry_id: Uuid) -> Result<EntryWithItems, LedgerError> {
        let entry = journal_entries::Entity::find_by_id(entry_id)
            .one(&self.db)
            .await
            .map_err(pg::ledger_error)?
            .ok_or(LedgerError::EntryNotFound(entry_id))?;

        let items = journal_items::Entity::find()
            .filter(journal_items::Column::EntryId.eq(entry_id))
            .order_by_asc(journal_items::Column::Id)
            .all(&self.db)
            .await
            .map_err(pg::ledger_error)?;

        Ok(EntryWithItems { entry, items })
    }

    /// Finds the reversal of an entry, if any.
    pub async fn find_reversal(
        &self,
        entry_id: Uuid,
    ) -> Result<Option<journal_entries::Model>, LedgerError> {
        journal_entries::Entity::find()
            .filter(journal_entries::Column::ReversedEntryId.eq(entry_id))
            .one(&self.db)
            .await
            .map_err(pg::ledger_error)
    }

    /// Reverses a POSTED entry, returning the new POSTED reversal entry.
    ///
    /// # Errors
    ///
    /// `NotPosted`, `AlreadyReversed` or `CannotReverseReversal`, plus every
    /// posting error for `reverse_date`.
    pub async fn reverse(
        &self,
        entry_id: Uuid,
        reverse_date: NaiveDate,
        actor: &str,
        now: DateTime<Utc>,
    ) -> Result<journal_entries::Model, LedgerError> {
        let txn = self.db.begin().await.map_err(pg::ledger_error)?;
        let reversal = reverse_entry(&txn, entry_id, reverse_date, actor, now).await?;
        txn.commit().await.map_err(pg::ledger_error)?;

        info!(
            entry_id = %entry_id,
            reversal_id = %reversal.id,
            number = reversal.number,
            "Entry reversed"
        );
        Ok(reversal)
    }

    /// Builds the trial balance of a ledger over POSTED entries dated in
    /// `[from, to]` (either bound optional).
    pub async fn trial_balance(
        &self,
        ledger_id: Uuid,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<TrialBalance, LedgerError> {
        let accounts: Vec<AccountSummary> = accounts::Entity::find()
            .filter(accounts::Column::LedgerId.eq(ledger_id))
            .all(&self.db)
            .await
            .map_err(pg::ledger_error)?
            .into_iter()
            .map(|a| AccountSummary {
                id: a.id,
                code: a.code,
                name: a.name,
                normal_side: a.normal_side.into(),
            })
            .collect();

        let mut query = journal_items::Entity::find()
            .inner_join(journal_entries::Entity)
            .filter(journal_entries::Column::LedgerId.eq(ledger_id))
            .filter(journal_entries::Column::Status.eq(EntryStatus::Posted));
        if let Some(from) = from {
            query = query.filter(journal_entries::Column::Date.gte(from));
        }
        if let Some(to) = to {
            query = query.filter(journal_entries::Column::Date.lte(to));
        }
        let postings = query
            .all(&self.db)
            .await
            .map_err(pg::ledger_error)?
            .into_iter()
            .map(posting);

        let trial_balance = TrialBalance::build(&accounts, postings);
        if !trial_balance.difference.is_zero() {
            warn!(
                ledger_id = %ledger_id,
                difference = %trial_balance.difference,
                "Trial balance does not balance"
            );
        }
        Ok(trial_balance)
    }

    /// Balance of one account over POSTED entries dated up to `as_of`.
    pub async fn account_balance(
        &self,
        account_id: Uuid,
        as_of: NaiveDate,
    ) -> Result<AccountBalance, LedgerError> {
        let account = accounts::Entity::find_by_id(account_id)
            .one(&self.db)
            .await
            .map_err(pg::ledger_error)?
            .ok_or(LedgerError::AccountNotFound(account_id))?;

        let postings = journal_items::Entity::find()
            .inner_join(journal_entries::Entity)
            .filter(journal_items::Column::AccountId.eq(account_id))
            .filter(journal_entries::Column::Status.eq(EntryStatus::Posted))
            .filter(journal_entries::Column::Date.lte(as_of))
            .all(&self.db)
            .await
            .map_err(pg::ledger_error)?
            .into_iter()
            .map(posting);

        Ok(AccountBalance::from_postings(
            account_id,
            account.normal_side.into(),
            postings,
        ))
    }
}

fn posting(item: journal_items::Model) -> Posting {
    Posting {
        account_id: item.account_id,
        debit: item.debit,
        credit: item.credit,
    }
}

// ============================================================================
// Transaction-level helpers
// ============================================================================

/// Locks an entry row and returns it with its pipeline snapshot.
pub(crate) async fn lock_entry(
    txn: &DatabaseTransaction,
    entry_id: Uuid,
) -> Result<(journal_entries::Model, EntrySnapshot), LedgerError> {
    let entry = journal_entries::Entity::find_by_id(entry_id)
        .lock_exclusive()
        .one(txn)
        .await
        .map_err(pg::ledger_error)?
        .ok_or(LedgerError::EntryNotFound(entry_id))?;

    let has_reversal = journal_entries::Entity::find()
        .filter(journal_entries::Column::ReversedEntryId.eq(entry_id))
        .count(txn)
        .await
        .map_err(pg::ledger_error)?
        > 0;

    let snapshot = entry.snapshot(has_reversal);
    Ok((entry, snapshot))
}

/// Inserts a DRAFT entry, numbering it under the ledger row lock.
pub(crate) async fn insert_draft(
    txn: &DatabaseTransaction,
    input: &CreateEntryInput,
    reversal_of: Option<Uuid>,
) -> Result<journal_entries::Model, LedgerError> {
    ledgers::Entity::find_by_id(input.ledger_id)
        .lock_exclusive()
        .one(txn)
        .await
        .map_err(pg::ledger_error)?
        .ok_or(LedgerError::LedgerNotFound(input.ledger_id))?;

    let number = match input.number {
        Some(number) => {
            JournalService::validate_number(number)?;
            let taken = journal_entries::Entity::find()
                .filter(journal_entries::Column::LedgerId.eq(input.ledger_id))
                .filter(journal_entries::Column::Number.eq(number))
                .count(txn)
                .await
                .map_err(pg::ledger_error)?;
            if taken > 0 {
                return Err(LedgerError::DuplicateNumber(number));
            }
            number
        }
        None => {
            let current_max = journal_entries::Entity::find()
                .select_only()
                .column_as(journal_entries::Column::Number.max(), "max_number")
                .filter(journal_entries::Column::LedgerId.eq(input.ledger_id))
                .into_tuple::<Option<i64>>()
                .one(txn)
                .await
                .map_err(pg::ledger_error)?
                .flatten();
            JournalService::next_entry_number(current_max)
        }
    };

    let now = Utc::now().into();
    journal_entries::ActiveModel {
        id: Set(Uuid::now_v7()),
        ledger_id: Set(input.ledger_id),
        number: Set(number),
        date: Set(input.date),
        description: Set(input.description.clone()),
        status: Set(EntryStatus::Draft),
        is_reversal: Set(reversal_of.is_some()),
        reversed_entry_id: Set(reversal_of),
        posted_at: Set(None),
        posted_by: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(txn)
    .await
    .map_err(|e| match (pg::violated_constraint(&e), reversal_of) {
        (Some(pg::UQ_JOURNAL_ENTRIES_LEDGER_NUMBER), _) => LedgerError::DuplicateNumber(number),
        (Some(pg::UQ_JOURNAL_ENTRIES_REVERSED_ENTRY), Some(original)) => {
            LedgerError::AlreadyReversed(original)
        }
        _ => pg::ledger_error(&e),
    })
}

/// Validates and inserts one item on a locked entry.
pub(crate) async fn insert_item(
    txn: &DatabaseTransaction,
    entry: &EntrySnapshot,
    line: &ItemLine,
) -> Result<journal_items::Model, LedgerError> {
    let account = load_account(txn, line.account_id).await?;
    JournalService::validate_add_item(entry, &account, line.debit, line.credit)?;

    journal_items::ActiveModel {
        id: Set(Uuid::now_v7()),
        entry_id: Set(entry.id),
        account_id: Set(line.account_id),
        debit: Set(line.debit),
        credit: Set(line.credit),
        description: Set(line.description.clone()),
        created_at: Set(Utc::now().into()),
    }
    .insert(txn)
    .await
    .map_err(pg::ledger_error)
}

/// Loads an account with `FOR SHARE` so it cannot be deactivated or made
/// non-postable while an item is written against it.
pub(crate) async fn load_account(
    txn: &DatabaseTransaction,
    account_id: Uuid,
) -> Result<AccountInfo, LedgerError> {
    Ok(accounts::Entity::find_by_id(account_id)
        .lock_shared()
        .one(txn)
        .await
        .map_err(pg::ledger_error)?
        .ok_or(LedgerError::AccountNotFound(account_id))?
        .info())
}

/// Posts a DRAFT entry inside `txn`.
pub(crate) async fn post_entry(
    txn: &DatabaseTransaction,
    entry_id: Uuid,
    actor: &str,
    now: DateTime<Utc>,
) -> Result<journal_entries::Model, LedgerError> {
    let (entry, snapshot) = lock_entry(txn, entry_id).await?;

    let items: Vec<ItemLine> = journal_items::Entity::find()
        .filter(journal_items::Column::EntryId.eq(entry_id))
        .all(txn)
        .await
        .map_err(pg::ledger_error)?
        .iter()
        .map(ItemLine::from)
        .collect();
    let periods = periods_covering(txn, entry.ledger_id, entry.date).await?;

    let totals = JournalService::validate_post(&snapshot, &items, &periods)?;

    let mut active: journal_entries::ActiveModel = entry.into();
    active.status = Set(EntryStatus::Posted);
    active.posted_at = Set(Some(now.into()));
    active.posted_by = Set(Some(actor.to_string()));
    active.updated_at = Set(Utc::now().into());
    let entry = active.update(txn).await.map_err(pg::ledger_error)?;

    debug!(entry_id = %entry_id, total = %totals.debit, "Entry balanced");
    Ok(entry)
}

/// Creates, fills and posts an entry in one go.
pub(crate) async fn create_posted_entry(
    txn: &DatabaseTransaction,
    input: &CreateEntryInput,
    items: &[ItemLine],
    reversal_of: Option<Uuid>,
    actor: &str,
    now: DateTime<Utc>,
) -> Result<journal_entries::Model, LedgerError> {
    let draft = insert_draft(txn, input, reversal_of).await?;
    let snapshot = draft.snapshot(false);
    for line in items {
        insert_item(txn, &snapshot, line).await?;
    }
    post_entry(txn, draft.id, actor, now).await
}

/// Reverses a POSTED entry inside `txn`.
pub(crate) async fn reverse_entry(
    txn: &DatabaseTransaction,
    entry_id: Uuid,
    reverse_date: NaiveDate,
    actor: &str,
    now: DateTime<Utc>,
) -> Result<journal_entries::Model, LedgerError> {
    let (original, snapshot) = lock_entry(txn, entry_id).await?;
    ReversalService::validate_can_reverse(&snapshot)?;

    let items: Vec<ItemLine> = journal_items::Entity::find()
        .filter(journal_items::Column::EntryId.eq(entry_id))
        .order_by_asc(journal_items::Column::Id)
        .all(txn)
        .await
        .map_err(pg::ledger_error)?
        .iter()
        .map(ItemLine::from)
        .collect();
    let plan = ReversalService::build(original.number, &items);

    let input = CreateEntryInput {
        ledger_id: original.ledger_id,
        number: None,
        date: reverse_date,
        description: plan.description,
    };
    create_posted_entry(txn, &input, &plan.items, Some(original.id), actor, now).await
}

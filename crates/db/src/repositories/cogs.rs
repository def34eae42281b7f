//! COGS repository: where stock moves turn into journal entries.
//!
//! The stock move and the entries it produces commit in one transaction,
//! so a sale never leaves lots drained without its COGS entry.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, DatabaseConnection, DatabaseTransaction, Set, TransactionTrait};
use tracing::{debug, info};
use uuid::Uuid;

use tally_core::cogs::{CogsError, CogsService, SaleAccounts, SaleAmounts};
use tally_core::stock::{LineRequest, MovePurpose, MoveRules, ReservationService, StockKey};
use tally_shared::StockAccountingConfig;

use super::journal::{CreateEntryInput, create_posted_entry, load_account, reverse_entry};
use super::pg;
use super::stock::{
    self, MoveDetail, StockOutInput, TransferInput, active_reservations, lock_move,
    lock_open_lots,
};
use crate::entities::{journal_entries, stock_moves};

/// A cash sale.
#[derive(Debug, Clone)]
pub struct SaleInput {
    /// Warehouse sold from; defaults to the configured sale warehouse.
    pub warehouse_id: Option<Uuid>,
    /// Items and quantities sold.
    pub lines: Vec<LineRequest>,
    /// Sale date.
    pub date: NaiveDate,
    /// Receipt or ticket reference.
    pub reference: String,
    /// Cash account; defaults to the configured cash account.
    pub cash_account: Option<Uuid>,
    /// Revenue account credited with the net amount.
    pub revenue_account: Uuid,
    /// VAT account credited with the VAT amount.
    pub vat_account: Uuid,
    /// Net amount.
    pub net: Decimal,
    /// VAT amount.
    pub vat: Decimal,
}

/// Result of a stock issue that may carry a COGS entry.
#[derive(Debug, Clone)]
pub struct StockOutOutcome {
    /// The OUT move.
    pub stock_move: MoveDetail,
    /// The COGS entry, when one was posted.
    pub cogs_entry: Option<journal_entries::Model>,
}

/// Result of a sale.
#[derive(Debug, Clone)]
pub struct SaleOutcome {
    /// Transfer that topped up the sale warehouse, if any.
    pub replenishment: Option<MoveDetail>,
    /// The OUT move.
    pub stock_move: MoveDetail,
    /// The COGS entry, when one was posted.
    pub cogs_entry: Option<journal_entries::Model>,
    /// The cash sale entry.
    pub sales_entry: journal_entries::Model,
}

/// Result of reversing a move together with its COGS entry.
#[derive(Debug, Clone)]
pub struct MoveReversalOutcome {
    /// The reversal move.
    pub stock_move: MoveDetail,
    /// Reversal of the original COGS entry, if the move had one.
    pub cogs_reversal: Option<journal_entries::Model>,
}

/// COGS repository.
#[derive(Debug, Clone)]
pub struct CogsRepository {
    db: DatabaseConnection,
    config: StockAccountingConfig,
}

impl CogsRepository {
    /// Creates a new COGS repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection, config: StockAccountingConfig) -> Self {
        Self { db, config }
    }

    /// Posts the COGS entry of an OUT move and links it to the move.
    ///
    /// # Errors
    ///
    /// - `NotAnOutMove` for any other move type
    /// - `AlreadyPosted` if the move already carries a COGS entry
    /// - `ZeroCost` if its allocations carry no cost
    /// - every posting error of the entry
    pub async fn post_cogs(
        &self,
        move_id: Uuid,
        cogs_account: Uuid,
        inventory_account: Uuid,
        actor: &str,
        now: DateTime<Utc>,
    ) -> Result<journal_entries::Model, CogsError> {
        let txn = self.db.begin().await.map_err(pg::cogs_error)?;
        let stock_move = lock_move(&txn, move_id).await?;
        let (entry, _) = post_cogs_in(
            &txn,
            stock_move,
            cogs_account,
            inventory_account,
            actor,
            now,
        )
        .await?;
        txn.commit().await.map_err(pg::cogs_error)?;

        info!(move_id = %move_id, entry_id = %entry.id, number = entry.number, "COGS posted");
        Ok(entry)
    }

    /// Issues stock and, for sales with `auto_cogs_on_sale` set, posts its
    /// COGS with the configured accounts.
    pub async fn post_stock_out(
        &self,
        input: StockOutInput,
        actor: &str,
        now: DateTime<Utc>,
    ) -> Result<StockOutOutcome, CogsError> {
        let auto_cogs = input.purpose == Some(MovePurpose::Sale) && self.config.auto_cogs_on_sale;
        let accounts = if auto_cogs {
            Some(self.configured_accounts()?)
        } else {
            None
        };

        let txn = self.db.begin().await.map_err(pg::cogs_error)?;
        let mut detail = stock::issue(&txn, &input, Some(actor)).await?;
        let cogs_entry = match accounts {
            Some((cogs_account, inventory_account)) => {
                let (entry, stock_move) = post_cogs_in(
                    &txn,
                    detail.stock_move.clone(),
                    cogs_account,
                    inventory_account,
                    actor,
                    now,
                )
                .await?;
                detail.stock_move = stock_move;
                Some(entry)
            }
            None => None,
        };
        txn.commit().await.map_err(pg::cogs_error)?;

        info!(
            move_id = %detail.stock_move.id,
            cogs_entry_id = ?cogs_entry.as_ref().map(|e| e.id),
            "Stock out posted"
        );
        Ok(StockOutOutcome {
            stock_move: detail,
            cogs_entry,
        })
    }

    /// Posts a cash sale: optional replenishment, the OUT move with its
    /// COGS, and the sales entry linked to the move.
    ///
    /// # Errors
    ///
    /// - `MissingSaleWarehouse` if no warehouse is given or configured
    /// - `MissingConfiguration` for an unset cash or COGS account
    /// - `InvalidSaleAmount` for negative amounts or a zero gross
    /// - `ReferenceTooLong` for a reference the move header cannot store
    /// - every stock and posting error of the steps
    pub async fn post_sale(
        &self,
        input: SaleInput,
        actor: &str,
        now: DateTime<Utc>,
    ) -> Result<SaleOutcome, CogsError> {
        MoveRules::validate_reference(Some(&input.reference))?;
        let warehouse_id = input
            .warehouse_id
            .or(self.config.default_sale_warehouse.map(Into::into))
            .ok_or(CogsError::MissingSaleWarehouse)?;
        let cash = input
            .cash_account
            .or(self.config.default_cash_account.map(Into::into))
            .ok_or(CogsError::MissingConfiguration("default_cash_account"))?;
        let sale_plan = CogsService::build_sale_entry(
            &input.reference,
            SaleAmounts {
                net: input.net,
                vat: input.vat,
            },
            SaleAccounts {
                cash,
                revenue: input.revenue_account,
                vat: input.vat_account,
            },
        )?;
        let accounts = if self.config.auto_cogs_on_sale {
            Some(self.configured_accounts()?)
        } else {
            None
        };

        let txn = self.db.begin().await.map_err(pg::cogs_error)?;

        let replenishment = if self.config.auto_replenish_on_sale {
            let from = self
                .config
                .default_replenish_from_warehouse
                .map(Uuid::from)
                .ok_or(CogsError::MissingReplenishWarehouse)?;
            replenish_shortfall(&txn, from, warehouse_id, &input.lines, input.date, &input.reference)
                .await?
        } else {
            None
        };

        let out = StockOutInput {
            warehouse_id,
            lines: input.lines.clone(),
            move_date: input.date,
            reference: Some(input.reference.clone()),
            purpose: Some(MovePurpose::Sale),
            reservation_id: None,
        };
        let mut detail = stock::issue(&txn, &out, Some(actor)).await?;

        let cogs_entry = match accounts {
            Some((cogs_account, inventory_account)) => {
                let (entry, stock_move) = post_cogs_in(
                    &txn,
                    detail.stock_move.clone(),
                    cogs_account,
                    inventory_account,
                    actor,
                    now,
                )
                .await?;
                detail.stock_move = stock_move;
                Some(entry)
            }
            None => None,
        };

        let revenue = load_account(&txn, input.revenue_account).await?;
        let sales_entry = create_posted_entry(
            &txn,
            &CreateEntryInput {
                ledger_id: revenue.ledger_id,
                number: None,
                date: input.date,
                description: sale_plan.description,
            },
            &sale_plan.items,
            None,
            actor,
            now,
        )
        .await?;

        let mut active: stock_moves::ActiveModel = detail.stock_move.into();
        active.sales_journal_entry_id = Set(Some(sales_entry.id));
        detail.stock_move = active.update(&txn).await.map_err(pg::cogs_error)?;

        txn.commit().await.map_err(pg::cogs_error)?;

        info!(
            move_id = %detail.stock_move.id,
            sales_entry_id = %sales_entry.id,
            cogs_entry_id = ?cogs_entry.as_ref().map(|e| e.id),
            replenished = replenishment.is_some(),
            "Sale posted"
        );
        Ok(SaleOutcome {
            replenishment,
            stock_move: detail,
            cogs_entry,
            sales_entry,
        })
    }

    /// Transfers stock from the replenish warehouse to the sale warehouse.
    ///
    /// # Errors
    ///
    /// `MissingReplenishWarehouse` or `MissingSaleWarehouse` when the
    /// warehouses are not configured, plus every transfer error.
    pub async fn replenish_to_sale_warehouse(
        &self,
        lines: Vec<LineRequest>,
        move_date: NaiveDate,
        reference: Option<String>,
    ) -> Result<MoveDetail, CogsError> {
        let from = self
            .config
            .default_replenish_from_warehouse
            .map(Uuid::from)
            .ok_or(CogsError::MissingReplenishWarehouse)?;
        let to = self
            .config
            .default_sale_warehouse
            .map(Uuid::from)
            .ok_or(CogsError::MissingSaleWarehouse)?;

        let txn = self.db.begin().await.map_err(pg::cogs_error)?;
        let detail = stock::transfer(
            &txn,
            &TransferInput {
                from_warehouse_id: from,
                to_warehouse_id: to,
                lines,
                move_date,
                reference,
            },
        )
        .await?;
        txn.commit().await.map_err(pg::cogs_error)?;
        Ok(detail)
    }

    /// Reverses a move and, when it carried a COGS entry, that entry too.
    /// The entry reversal is linked to the reversal move.
    pub async fn reverse_move_with_cogs(
        &self,
        move_id: Uuid,
        reverse_date: NaiveDate,
        actor: &str,
        now: DateTime<Utc>,
    ) -> Result<MoveReversalOutcome, CogsError> {
        let txn = self.db.begin().await.map_err(pg::cogs_error)?;
        let original = lock_move(&txn, move_id).await?;
        let mut detail = stock::reverse(&txn, move_id, reverse_date, Some(actor)).await?;

        let cogs_reversal = match original.journal_entry_id {
            Some(entry_id) => {
                let reversal = reverse_entry(&txn, entry_id, reverse_date, actor, now).await?;
                let mut active: stock_moves::ActiveModel = detail.stock_move.into();
                active.journal_entry_id = Set(Some(reversal.id));
                detail.stock_move = active.update(&txn).await.map_err(pg::cogs_error)?;
                Some(reversal)
            }
            None => None,
        };
        txn.commit().await.map_err(pg::cogs_error)?;

        info!(
            move_id = %move_id,
            reversal_id = %detail.stock_move.id,
            cogs_reversal_id = ?cogs_reversal.as_ref().map(|e| e.id),
            "Stock move reversed with COGS"
        );
        Ok(MoveReversalOutcome {
            stock_move: detail,
            cogs_reversal,
        })
    }

    fn configured_accounts(&self) -> Result<(Uuid, Uuid), CogsError> {
        let cogs = self
            .config
            .cogs_account
            .ok_or(CogsError::MissingConfiguration("cogs_account"))?;
        let inventory = self
            .config
            .inventory_account
            .ok_or(CogsError::MissingConfiguration("inventory_account"))?;
        Ok((cogs.into(), inventory.into()))
    }
}

/// Posts COGS for a locked move inside `txn`; returns the entry and the
/// updated move.
async fn post_cogs_in(
    txn: &DatabaseTransaction,
    stock_move: stock_moves::Model,
    cogs_account: Uuid,
    inventory_account: Uuid,
    actor: &str,
    now: DateTime<Utc>,
) -> Result<(journal_entries::Model, stock_moves::Model), CogsError> {
    let move_id = stock_move.id;
    CogsService::validate_move(
        move_id,
        stock_move.move_type.into(),
        stock_move.journal_entry_id,
    )?;

    let cogs = load_account(txn, cogs_account).await?;
    let inventory = load_account(txn, inventory_account).await?;
    CogsService::validate_accounts(&cogs, &inventory)?;

    let detail = stock::load_detail(txn, stock_move).await?;
    let total = CogsService::total_cost(detail.allocation_costs());
    debug!(move_id = %move_id, total = %total, "COGS computed");

    let plan = CogsService::build_cogs_entry(
        move_id,
        detail.stock_move.reference.as_deref(),
        total,
        cogs_account,
        inventory_account,
    )?;

    let entry = create_posted_entry(
        txn,
        &CreateEntryInput {
            ledger_id: cogs.ledger_id,
            number: None,
            date: detail.stock_move.move_date,
            description: plan.description,
        },
        &plan.items,
        None,
        actor,
        now,
    )
    .await?;

    let mut active: stock_moves::ActiveModel = detail.stock_move.into();
    active.journal_entry_id = Set(Some(entry.id));
    let stock_move = active.update(txn).await.map_err(|e| {
        if pg::violates(&e, pg::UQ_STOCK_MOVES_JOURNAL_ENTRY) {
            CogsError::AlreadyPosted(move_id)
        } else {
            pg::cogs_error(e)
        }
    })?;

    Ok((entry, stock_move))
}

/// Transfers whatever the sale warehouse lacks for `lines` from `from`.
///
/// Locks the open lots of both warehouses for every item in key order
/// before reading availability.
async fn replenish_shortfall(
    txn: &DatabaseTransaction,
    from: Uuid,
    sale_warehouse: Uuid,
    lines: &[LineRequest],
    move_date: NaiveDate,
    reference: &str,
) -> Result<Option<MoveDetail>, CogsError> {
    MoveRules::validate_transfer(from, sale_warehouse)?;
    MoveRules::validate_lines(lines)?;

    let requested = MoveRules::requested_by_key(sale_warehouse, lines);
    let mut keys: BTreeMap<StockKey, Decimal> = requested.clone();
    for key in requested.keys() {
        keys.insert(StockKey::new(from, key.item_id), Decimal::ZERO);
    }
    let lots = lock_open_lots(txn, &keys).await?;

    let mut missing = Vec::new();
    for (key, quantity) in &requested {
        let reservations = active_reservations(txn, *key).await?;
        let key_lots = lots.get(key).map_or(&[][..], Vec::as_slice);
        let availability = ReservationService::availability(key_lots, &reservations, None);
        let shortfall = CogsService::replenish_quantity(*quantity, availability.available);
        if shortfall > Decimal::ZERO {
            missing.push(LineRequest {
                item_id: key.item_id,
                quantity: shortfall,
            });
        }
    }

    if missing.is_empty() {
        return Ok(None);
    }

    let detail = stock::transfer(
        txn,
        &TransferInput {
            from_warehouse_id: from,
            to_warehouse_id: sale_warehouse,
            lines: missing,
            move_date,
            reference: Some(MoveRules::derived_reference("Replenish for ", reference)),
        },
    )
    .await?;

    info!(
        move_id = %detail.stock_move.id,
        from = %from,
        to = %sale_warehouse,
        "Sale warehouse replenished"
    );
    Ok(Some(detail))
}

//! Stock repository: catalog, FIFO lots, moves, allocations and reversal.
//!
//! Every operation that drains lots locks the open lots of each affected
//! (warehouse, item) key with `FOR UPDATE`, in key order, before it reads
//! reservations or computes availability. Receipts only insert lots and
//! take no key locks.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Unchanged, ColumnTrait, DatabaseConnection,
    DatabaseTransaction, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
    TransactionTrait,
};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use tally_core::stock::{
    Availability, ConsumptionPlan, FifoPlanner, LineRequest, LineSnapshot, LotSnapshot,
    MovePurpose, MoveReversalService, MoveRules, MoveType, PlannedAllocation, ReservationService,
    ReservationSnapshot, RestoredLot, ReversalLine, StockError, StockKey, StockValuation,
    value_lots,
};

use super::pg;
use crate::entities::{
    items, stock_allocations, stock_lots, stock_move_lines, stock_moves, stock_reservations,
    warehouses,
};

// ============================================================================
// Inputs & outputs
// ============================================================================

/// Single-lot receipt.
#[derive(Debug, Clone)]
pub struct PostInInput {
    /// Receiving warehouse.
    pub warehouse_id: Uuid,
    /// Item received.
    pub item_id: Uuid,
    /// Quantity received.
    pub quantity: Decimal,
    /// Cost per unit.
    pub unit_cost: Decimal,
    /// Receipt time; orders the lot in FIFO.
    pub received_at: DateTime<Utc>,
    /// Source document reference.
    pub reference: Option<String>,
}

/// One line of a receipt.
#[derive(Debug, Clone, Copy)]
pub struct ReceiptLine {
    /// Item received.
    pub item_id: Uuid,
    /// Quantity received.
    pub quantity: Decimal,
    /// Cost per unit.
    pub unit_cost: Decimal,
}

/// Multi-line receipt; one lot per line.
#[derive(Debug, Clone)]
pub struct ReceiptInput {
    /// Receiving warehouse.
    pub warehouse_id: Uuid,
    /// Receipt time shared by all lots.
    pub received_at: DateTime<Utc>,
    /// Source document reference.
    pub reference: Option<String>,
    /// Lines.
    pub lines: Vec<ReceiptLine>,
}

/// Stock issue.
#[derive(Debug, Clone)]
pub struct StockOutInput {
    /// Issuing warehouse.
    pub warehouse_id: Uuid,
    /// Items and quantities.
    pub lines: Vec<LineRequest>,
    /// Move date.
    pub move_date: NaiveDate,
    /// Source document reference.
    pub reference: Option<String>,
    /// Why the stock leaves.
    pub purpose: Option<MovePurpose>,
    /// Reservation consumed and released by this issue.
    pub reservation_id: Option<Uuid>,
}

/// Transfer between two warehouses.
#[derive(Debug, Clone)]
pub struct TransferInput {
    /// Source warehouse.
    pub from_warehouse_id: Uuid,
    /// Destination warehouse.
    pub to_warehouse_id: Uuid,
    /// Items and quantities.
    pub lines: Vec<LineRequest>,
    /// Move date.
    pub move_date: NaiveDate,
    /// Source document reference.
    pub reference: Option<String>,
}

/// Inventory count correction.
#[derive(Debug, Clone)]
pub struct AdjustmentInput {
    /// Warehouse counted.
    pub warehouse_id: Uuid,
    /// Item counted.
    pub item_id: Uuid,
    /// Signed quantity change.
    pub delta: Decimal,
    /// Cost of found units; required when `delta` is positive.
    pub unit_cost: Option<Decimal>,
    /// Move date.
    pub move_date: NaiveDate,
    /// Free-text note, stored as the move reference.
    pub note: Option<String>,
}

/// A move line with its FIFO trail.
#[derive(Debug, Clone)]
pub struct LineDetail {
    /// The line.
    pub line: stock_move_lines::Model,
    /// Lots the line drew from.
    pub allocations: Vec<stock_allocations::Model>,
    /// Lots the line created.
    pub lots_created: Vec<stock_lots::Model>,
}

/// A move with its lines.
#[derive(Debug, Clone)]
pub struct MoveDetail {
    /// Move header.
    pub stock_move: stock_moves::Model,
    /// Lines in insertion order.
    pub lines: Vec<LineDetail>,
}

impl MoveDetail {
    /// Iterates over `(qty, unit_cost)` of every allocation of the move.
    pub fn allocation_costs(&self) -> impl Iterator<Item = (Decimal, Decimal)> + '_ {
        self.lines
            .iter()
            .flat_map(|l| l.allocations.iter().map(|a| (a.qty, a.unit_cost)))
    }
}

// ============================================================================
// Repository
// ============================================================================

/// Stock repository.
#[derive(Debug, Clone)]
pub struct StockRepository {
    db: DatabaseConnection,
}

impl StockRepository {
    /// Creates a new stock repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Creates a warehouse.
    pub async fn create_warehouse(
        &self,
        code: &str,
        name: &str,
    ) -> Result<warehouses::Model, StockError> {
        let code = code.trim();
        if code.is_empty() {
            return Err(StockError::InvalidCode);
        }

        let warehouse = warehouses::ActiveModel {
            id: Set(Uuid::now_v7()),
            code: Set(code.to_string()),
            name: Set(name.to_string()),
            created_at: Set(Utc::now().into()),
        }
        .insert(&self.db)
        .await
        .map_err(|e| {
            if pg::violates(&e, pg::UQ_WAREHOUSES_CODE) {
                StockError::DuplicateWarehouseCode(code.to_string())
            } else {
                pg::stock_error(e)
            }
        })?;

        info!(warehouse_id = %warehouse.id, code = %warehouse.code, "Warehouse created");
        Ok(warehouse)
    }

    /// Creates a stock item.
    pub async fn create_item(&self, code: &str, name: &str) -> Result<items::Model, StockError> {
        let code = code.trim();
        if code.is_empty() {
            return Err(StockError::InvalidCode);
        }

        let item = items::ActiveModel {
            id: Set(Uuid::now_v7()),
            code: Set(code.to_string()),
            name: Set(name.to_string()),
            created_at: Set(Utc::now().into()),
        }
        .insert(&self.db)
        .await
        .map_err(|e| {
            if pg::violates(&e, pg::UQ_ITEMS_CODE) {
                StockError::DuplicateItemCode(code.to_string())
            } else {
                pg::stock_error(e)
            }
        })?;

        info!(item_id = %item.id, code = %item.code, "Item created");
        Ok(item)
    }

    /// Gets a warehouse by ID.
    pub async fn get_warehouse(&self, warehouse_id: Uuid) -> Result<warehouses::Model, StockError> {
        warehouses::Entity::find_by_id(warehouse_id)
            .one(&self.db)
            .await
            .map_err(pg::stock_error)?
            .ok_or(StockError::WarehouseNotFound(warehouse_id))
    }

    /// Receives one quantity of one item as a new lot.
    ///
    /// # Errors
    ///
    /// `InvalidQuantity` / `InvalidCost` for non-positive or over-precise
    /// values.
    pub async fn post_in(&self, input: PostInInput) -> Result<stock_lots::Model, StockError> {
        let receipt = ReceiptInput {
            warehouse_id: input.warehouse_id,
            received_at: input.received_at,
            reference: input.reference,
            lines: vec![ReceiptLine {
                item_id: input.item_id,
                quantity: input.quantity,
                unit_cost: input.unit_cost,
            }],
        };

        let txn = self.db.begin().await.map_err(pg::stock_error)?;
        let (_, mut lots) = receive(&txn, &receipt).await?;
        txn.commit().await.map_err(pg::stock_error)?;

        lots.pop().ok_or(StockError::EmptyMove)
    }

    /// Receives several lines as one IN move.
    pub async fn post_receipt(&self, input: ReceiptInput) -> Result<MoveDetail, StockError> {
        let txn = self.db.begin().await.map_err(pg::stock_error)?;
        let (detail, _) = receive(&txn, &input).await?;
        txn.commit().await.map_err(pg::stock_error)?;
        Ok(detail)
    }

    /// Issues stock FIFO.
    ///
    /// # Errors
    ///
    /// - `InsufficientStock` if `on_hand - reserved` (excluding the supplied
    ///   reservation) is below the requested quantity for any key
    /// - `ReservationMismatch`, `ReservationReleased`, `ReservationTooSmall`
    ///   for an unusable reservation
    /// - `AllocationShortfall` if the lots run out after the check passed
    pub async fn post_out(&self, input: StockOutInput) -> Result<MoveDetail, StockError> {
        let txn = self.db.begin().await.map_err(pg::stock_error)?;
        let detail = issue(&txn, &input, None).await?;
        txn.commit().await.map_err(pg::stock_error)?;
        Ok(detail)
    }

    /// Moves stock between warehouses, preserving each consumed lot's cost.
    pub async fn post_transfer(&self, input: TransferInput) -> Result<MoveDetail, StockError> {
        let txn = self.db.begin().await.map_err(pg::stock_error)?;
        let detail = transfer(&txn, &input).await?;
        txn.commit().await.map_err(pg::stock_error)?;
        Ok(detail)
    }

    /// Applies a signed count correction as an ADJUST move.
    ///
    /// A positive delta creates a lot at `unit_cost`; a negative delta drains
    /// lots FIFO.
    pub async fn post_adjustment(&self, input: AdjustmentInput) -> Result<MoveDetail, StockError> {
        let txn = self.db.begin().await.map_err(pg::stock_error)?;
        let detail = adjust(&txn, &input).await?;
        txn.commit().await.map_err(pg::stock_error)?;
        Ok(detail)
    }

    /// Reverses a move, returning the reversal move.
    ///
    /// Moves linked to a COGS or sales entry are reversed through
    /// `CogsRepository::reverse_move_with_cogs` instead, so stock and the
    /// ledger stay in step.
    ///
    /// # Errors
    ///
    /// `HasJournalEntries`, `AlreadyReversed`, `CannotReverseReversal`, and
    /// for reversals that drain lots every `post_out` error.
    pub async fn reverse_move(
        &self,
        move_id: Uuid,
        move_date: NaiveDate,
    ) -> Result<MoveDetail, StockError> {
        let txn = self.db.begin().await.map_err(pg::stock_error)?;
        let original = lock_move(&txn, move_id).await?;
        if original.journal_entry_id.is_some() || original.sales_journal_entry_id.is_some() {
            warn!(move_id = %move_id, "Stock-only reversal refused for a move with journal entries");
            return Err(StockError::HasJournalEntries(move_id));
        }
        let detail = reverse(&txn, move_id, move_date, None).await?;
        txn.commit().await.map_err(pg::stock_error)?;
        Ok(detail)
    }

    /// Gets a move with its lines, allocations and created lots.
    pub async fn get_move(&self, move_id: Uuid) -> Result<MoveDetail, StockError> {
        let txn = self.db.begin().await.map_err(pg::stock_error)?;
        let stock_move = stock_moves::Entity::find_by_id(move_id)
            .one(&txn)
            .await
            .map_err(pg::stock_error)?
            .ok_or(StockError::MoveNotFound(move_id))?;
        let detail = load_detail(&txn, stock_move).await?;
        txn.commit().await.map_err(pg::stock_error)?;
        Ok(detail)
    }

    /// Lists every lot of a key in FIFO order, drained ones included.
    pub async fn lots(
        &self,
        warehouse_id: Uuid,
        item_id: Uuid,
    ) -> Result<Vec<stock_lots::Model>, StockError> {
        stock_lots::Entity::find()
            .filter(stock_lots::Column::WarehouseId.eq(warehouse_id))
            .filter(stock_lots::Column::ItemId.eq(item_id))
            .order_by_asc(stock_lots::Column::ReceivedAt)
            .order_by_asc(stock_lots::Column::Id)
            .all(&self.db)
            .await
            .map_err(pg::stock_error)
    }

    /// Physical quantity on hand.
    pub async fn on_hand(&self, warehouse_id: Uuid, item_id: Uuid) -> Result<Decimal, StockError> {
        let lots: Vec<LotSnapshot> = self
            .lots(warehouse_id, item_id)
            .await?
            .iter()
            .map(LotSnapshot::from)
            .collect();
        Ok(FifoPlanner::on_hand(&lots))
    }

    /// On hand, reserved and available quantities of a key.
    pub async fn available(
        &self,
        warehouse_id: Uuid,
        item_id: Uuid,
    ) -> Result<Availability, StockError> {
        let key = StockKey::new(warehouse_id, item_id);
        let lots: Vec<LotSnapshot> = self
            .lots(warehouse_id, item_id)
            .await?
            .iter()
            .map(LotSnapshot::from)
            .collect();
        let reservations = active_reservations(&self.db, key).await?;
        Ok(ReservationService::availability(&lots, &reservations, None))
    }

    /// Values the open lots of an item, in one warehouse or across all.
    ///
    /// Returns `None` when nothing is on hand.
    pub async fn valuation(
        &self,
        warehouse_id: Option<Uuid>,
        item_id: Uuid,
    ) -> Result<Option<StockValuation>, StockError> {
        let mut query = stock_lots::Entity::find()
            .filter(stock_lots::Column::ItemId.eq(item_id))
            .filter(stock_lots::Column::QtyRemaining.gt(Decimal::ZERO));
        if let Some(warehouse_id) = warehouse_id {
            query = query.filter(stock_lots::Column::WarehouseId.eq(warehouse_id));
        }
        let lots: Vec<LotSnapshot> = query
            .all(&self.db)
            .await
            .map_err(pg::stock_error)?
            .iter()
            .map(LotSnapshot::from)
            .collect();
        Ok(value_lots(&lots))
    }
}

// ============================================================================
// Transaction-level operations
// ============================================================================

struct MoveHeader<'a> {
    move_type: MoveType,
    purpose: Option<MovePurpose>,
    move_date: NaiveDate,
    reference: Option<&'a str>,
    from_warehouse_id: Option<Uuid>,
    to_warehouse_id: Option<Uuid>,
    reversed_move_id: Option<Uuid>,
    created_by: Option<&'a str>,
}

/// Posts an IN move with one new lot per line.
pub(crate) async fn receive(
    txn: &DatabaseTransaction,
    input: &ReceiptInput,
) -> Result<(MoveDetail, Vec<stock_lots::Model>), StockError> {
    if input.lines.is_empty() {
        return Err(StockError::EmptyMove);
    }
    MoveRules::validate_reference(input.reference.as_deref())?;
    for line in &input.lines {
        FifoPlanner::validate_quantity(line.quantity)?;
        FifoPlanner::validate_unit_cost(line.unit_cost)?;
    }
    ensure_warehouse(txn, input.warehouse_id).await?;
    ensure_items(txn, input.lines.iter().map(|l| l.item_id).collect::<Vec<_>>()).await?;

    let stock_move = insert_move(
        txn,
        &MoveHeader {
            move_type: MoveType::In,
            purpose: None,
            move_date: input.received_at.date_naive(),
            reference: input.reference.as_deref(),
            from_warehouse_id: None,
            to_warehouse_id: Some(input.warehouse_id),
            reversed_move_id: None,
            created_by: None,
        },
    )
    .await?;

    let mut lines = Vec::with_capacity(input.lines.len());
    let mut lots = Vec::with_capacity(input.lines.len());
    for line in &input.lines {
        let key = StockKey::new(input.warehouse_id, line.item_id);
        let model = insert_line(txn, stock_move.id, key, line.quantity, Some(line.unit_cost)).await?;
        let lot = insert_lot(
            txn,
            key,
            line.unit_cost,
            line.quantity,
            input.received_at,
            model.id,
        )
        .await?;
        lots.push(lot.clone());
        lines.push(LineDetail {
            line: model,
            allocations: Vec::new(),
            lots_created: vec![lot],
        });
    }

    info!(
        move_id = %stock_move.id,
        warehouse_id = %input.warehouse_id,
        lines = lines.len(),
        "Stock received"
    );
    Ok((MoveDetail { stock_move, lines }, lots))
}

/// Posts an OUT move, consuming lots FIFO and optionally a reservation.
pub(crate) async fn issue(
    txn: &DatabaseTransaction,
    input: &StockOutInput,
    created_by: Option<&str>,
) -> Result<MoveDetail, StockError> {
    MoveRules::validate_lines(&input.lines)?;
    MoveRules::validate_purpose(MoveType::Out, input.purpose)?;
    MoveRules::validate_reference(input.reference.as_deref())?;
    ensure_warehouse(txn, input.warehouse_id).await?;
    ensure_items(txn, input.lines.iter().map(|l| l.item_id).collect::<Vec<_>>()).await?;

    let requested = MoveRules::requested_by_key(input.warehouse_id, &input.lines);
    let mut lots = lock_open_lots(txn, &requested).await?;

    let reservation = match input.reservation_id {
        Some(reservation_id) => {
            let reservation = lock_reservation(txn, reservation_id).await?;
            let snapshot = ReservationSnapshot::from(&reservation);
            ReservationService::validate_use(&snapshot, requested.get(&snapshot.key).copied())?;
            Some(reservation)
        }
        None => None,
    };

    ensure_available(txn, &requested, &lots, input.reservation_id).await?;

    let stock_move = insert_move(
        txn,
        &MoveHeader {
            move_type: MoveType::Out,
            purpose: input.purpose,
            move_date: input.move_date,
            reference: input.reference.as_deref(),
            from_warehouse_id: Some(input.warehouse_id),
            to_warehouse_id: None,
            reversed_move_id: None,
            created_by,
        },
    )
    .await?;

    let mut lines = Vec::with_capacity(input.lines.len());
    for line in &input.lines {
        let key = StockKey::new(input.warehouse_id, line.item_id);
        let key_lots = lots.entry(key).or_default();
        let (detail, _) = consume_line(txn, stock_move.id, key, line.quantity, key_lots).await?;
        lines.push(detail);
    }

    if let Some(reservation) = reservation {
        release_locked(txn, reservation).await?;
    }

    info!(
        move_id = %stock_move.id,
        warehouse_id = %input.warehouse_id,
        lines = lines.len(),
        reservation_id = ?input.reservation_id,
        "Stock issued"
    );
    Ok(MoveDetail { stock_move, lines })
}

/// Posts a TRANSFER: FIFO out of the source, one new lot per allocation at
/// the destination with the allocation's cost and receipt time.
pub(crate) async fn transfer(
    txn: &DatabaseTransaction,
    input: &TransferInput,
) -> Result<MoveDetail, StockError> {
    MoveRules::validate_transfer(input.from_warehouse_id, input.to_warehouse_id)?;
    MoveRules::validate_lines(&input.lines)?;
    MoveRules::validate_reference(input.reference.as_deref())?;
    ensure_warehouse(txn, input.from_warehouse_id).await?;
    ensure_warehouse(txn, input.to_warehouse_id).await?;
    ensure_items(txn, input.lines.iter().map(|l| l.item_id).collect::<Vec<_>>()).await?;

    let requested = MoveRules::requested_by_key(input.from_warehouse_id, &input.lines);
    let mut lots = lock_open_lots(txn, &requested).await?;
    ensure_available(txn, &requested, &lots, None).await?;

    let stock_move = insert_move(
        txn,
        &MoveHeader {
            move_type: MoveType::Transfer,
            purpose: None,
            move_date: input.move_date,
            reference: input.reference.as_deref(),
            from_warehouse_id: Some(input.from_warehouse_id),
            to_warehouse_id: Some(input.to_warehouse_id),
            reversed_move_id: None,
            created_by: None,
        },
    )
    .await?;

    let mut lines = Vec::with_capacity(input.lines.len());
    for line in &input.lines {
        let key = StockKey::new(input.from_warehouse_id, line.item_id);
        let key_lots = lots.entry(key).or_default();
        let detail =
            transfer_line(txn, stock_move.id, key, input.to_warehouse_id, line.quantity, key_lots)
                .await?;
        lines.push(detail);
    }

    info!(
        move_id = %stock_move.id,
        from = %input.from_warehouse_id,
        to = %input.to_warehouse_id,
        lines = lines.len(),
        "Stock transferred"
    );
    Ok(MoveDetail { stock_move, lines })
}

async fn adjust(
    txn: &DatabaseTransaction,
    input: &AdjustmentInput,
) -> Result<MoveDetail, StockError> {
    FifoPlanner::validate_quantity(input.delta.abs())?;
    MoveRules::validate_reference(input.note.as_deref())?;
    ensure_warehouse(txn, input.warehouse_id).await?;
    ensure_items(txn, [input.item_id]).await?;

    let key = StockKey::new(input.warehouse_id, input.item_id);
    let quantity = input.delta.abs();
    let gain = input.delta > Decimal::ZERO;

    let detail = if gain {
        let unit_cost = input.unit_cost.unwrap_or(Decimal::ZERO);
        FifoPlanner::validate_unit_cost(unit_cost)?;

        let stock_move = insert_move(
            txn,
            &MoveHeader {
                move_type: MoveType::Adjust,
                purpose: Some(MovePurpose::Adjustment),
                move_date: input.move_date,
                reference: input.note.as_deref(),
                from_warehouse_id: None,
                to_warehouse_id: Some(input.warehouse_id),
                reversed_move_id: None,
                created_by: None,
            },
        )
        .await?;
        let line = insert_line(txn, stock_move.id, key, quantity, Some(unit_cost)).await?;
        // Found units join FIFO at the start of the adjustment date.
        let received_at = input.move_date.and_time(NaiveTime::MIN).and_utc();
        let lot = insert_lot(txn, key, unit_cost, quantity, received_at, line.id).await?;
        MoveDetail {
            stock_move,
            lines: vec![LineDetail {
                line,
                allocations: Vec::new(),
                lots_created: vec![lot],
            }],
        }
    } else {
        let requested = BTreeMap::from([(key, quantity)]);
        let mut lots = lock_open_lots(txn, &requested).await?;
        ensure_available(txn, &requested, &lots, None).await?;

        let stock_move = insert_move(
            txn,
            &MoveHeader {
                move_type: MoveType::Adjust,
                purpose: Some(MovePurpose::Adjustment),
                move_date: input.move_date,
                reference: input.note.as_deref(),
                from_warehouse_id: Some(input.warehouse_id),
                to_warehouse_id: None,
                reversed_move_id: None,
                created_by: None,
            },
        )
        .await?;
        let key_lots = lots.entry(key).or_default();
        let (line, _) = consume_line(txn, stock_move.id, key, quantity, key_lots).await?;
        MoveDetail {
            stock_move,
            lines: vec![line],
        }
    };

    info!(
        move_id = %detail.stock_move.id,
        key = %key,
        delta = %input.delta,
        "Stock adjusted"
    );
    Ok(detail)
}

/// Locks a move row for reading or linking.
pub(crate) async fn lock_move(
    txn: &DatabaseTransaction,
    move_id: Uuid,
) -> Result<stock_moves::Model, StockError> {
    stock_moves::Entity::find_by_id(move_id)
        .lock_exclusive()
        .one(txn)
        .await
        .map_err(pg::stock_error)?
        .ok_or(StockError::MoveNotFound(move_id))
}

/// Reverses a move inside `txn`.
pub(crate) async fn reverse(
    txn: &DatabaseTransaction,
    move_id: Uuid,
    move_date: NaiveDate,
    created_by: Option<&str>,
) -> Result<MoveDetail, StockError> {
    let original = lock_move(txn, move_id).await?;
    let has_reversal = stock_moves::Entity::find()
        .filter(stock_moves::Column::ReversedMoveId.eq(move_id))
        .count(txn)
        .await
        .map_err(pg::stock_error)?
        > 0;
    let snapshot = original.snapshot(has_reversal);
    MoveReversalService::validate_can_reverse(&snapshot)?;

    let line_snapshots = load_line_snapshots(txn, move_id).await?;
    let plan = MoveReversalService::plan(&snapshot, &line_snapshots)?;

    let mut requested: BTreeMap<StockKey, Decimal> = BTreeMap::new();
    for line in &plan.lines {
        if let ReversalLine::Consume { key, quantity } = line {
            *requested.entry(*key).or_insert(Decimal::ZERO) += *quantity;
        }
    }
    let mut lots = lock_open_lots(txn, &requested).await?;
    ensure_available(txn, &requested, &lots, None).await?;

    let purpose = match plan.move_type {
        MoveType::Adjust => original.purpose.map(Into::into),
        _ => None,
    };
    let reference = original
        .reference
        .as_deref()
        .map(|r| MoveRules::derived_reference("Reversal of ", r));
    let from_warehouse_id = plan.from_warehouse_id.or(original.to_warehouse_id);
    let to_warehouse_id = plan.to_warehouse_id.or(original.from_warehouse_id);

    let stock_move = insert_move(
        txn,
        &MoveHeader {
            move_type: plan.move_type,
            purpose,
            move_date,
            reference: reference.as_deref(),
            from_warehouse_id,
            to_warehouse_id,
            reversed_move_id: Some(original.id),
            created_by,
        },
    )
    .await?;

    let mut lines = Vec::with_capacity(plan.lines.len());
    for line in &plan.lines {
        let detail = match line {
            ReversalLine::Consume { key, quantity } => {
                let key_lots = lots.entry(*key).or_default();
                if plan.move_type == MoveType::Transfer {
                    let to = to_warehouse_id.ok_or(StockError::MissingWarehouse(original.id))?;
                    transfer_line(txn, stock_move.id, *key, to, *quantity, key_lots).await?
                } else {
                    consume_line(txn, stock_move.id, *key, *quantity, key_lots)
                        .await?
                        .0
                }
            }
            ReversalLine::Restore {
                key,
                quantity,
                unit_cost,
                lots: restored,
            } => restore_line(txn, stock_move.id, *key, *quantity, *unit_cost, restored).await?,
        };
        lines.push(detail);
    }

    info!(
        move_id = %original.id,
        reversal_id = %stock_move.id,
        move_type = %plan.move_type,
        "Stock move reversed"
    );
    Ok(MoveDetail { stock_move, lines })
}

// ============================================================================
// Building blocks
// ============================================================================

async fn ensure_warehouse(txn: &DatabaseTransaction, warehouse_id: Uuid) -> Result<(), StockError> {
    warehouses::Entity::find_by_id(warehouse_id)
        .one(txn)
        .await
        .map_err(pg::stock_error)?
        .ok_or(StockError::WarehouseNotFound(warehouse_id))?;
    Ok(())
}

async fn ensure_items<I>(txn: &DatabaseTransaction, item_ids: I) -> Result<(), StockError>
where
    I: IntoIterator<Item = Uuid>,
{
    for item_id in item_ids {
        items::Entity::find_by_id(item_id)
            .one(txn)
            .await
            .map_err(pg::stock_error)?
            .ok_or(StockError::ItemNotFound(item_id))?;
    }
    Ok(())
}

/// Locks the open lots of every requested key, in key order.
pub(crate) async fn lock_open_lots(
    txn: &DatabaseTransaction,
    requested: &BTreeMap<StockKey, Decimal>,
) -> Result<BTreeMap<StockKey, Vec<LotSnapshot>>, StockError> {
    let mut locked = BTreeMap::new();
    for key in requested.keys() {
        let lots = stock_lots::Entity::find()
            .filter(stock_lots::Column::WarehouseId.eq(key.warehouse_id))
            .filter(stock_lots::Column::ItemId.eq(key.item_id))
            .filter(stock_lots::Column::QtyRemaining.gt(Decimal::ZERO))
            .order_by_asc(stock_lots::Column::ReceivedAt)
            .order_by_asc(stock_lots::Column::Id)
            .lock_exclusive()
            .all(txn)
            .await
            .map_err(pg::stock_error)?;
        locked.insert(*key, lots.iter().map(LotSnapshot::from).collect());
    }
    Ok(locked)
}

/// Active reservations of a key.
pub(crate) async fn active_reservations<C>(
    conn: &C,
    key: StockKey,
) -> Result<Vec<ReservationSnapshot>, StockError>
where
    C: sea_orm::ConnectionTrait,
{
    Ok(stock_reservations::Entity::find()
        .filter(stock_reservations::Column::WarehouseId.eq(key.warehouse_id))
        .filter(stock_reservations::Column::ItemId.eq(key.item_id))
        .filter(stock_reservations::Column::ReleasedAt.is_null())
        .all(conn)
        .await
        .map_err(pg::stock_error)?
        .iter()
        .map(ReservationSnapshot::from)
        .collect())
}

/// Fails with `InsufficientStock` unless every key covers its request.
async fn ensure_available(
    txn: &DatabaseTransaction,
    requested: &BTreeMap<StockKey, Decimal>,
    lots: &BTreeMap<StockKey, Vec<LotSnapshot>>,
    excluding: Option<Uuid>,
) -> Result<(), StockError> {
    for (key, quantity) in requested {
        let reservations = active_reservations(txn, *key).await?;
        let key_lots = lots.get(key).map_or(&[][..], Vec::as_slice);
        let availability = ReservationService::availability(key_lots, &reservations, excluding);
        if let Err(e) = ReservationService::ensure_available(*key, *quantity, &availability) {
            warn!(
                key = %key,
                requested = %quantity,
                available = %availability.available,
                "Insufficient stock"
            );
            return Err(e);
        }
    }
    Ok(())
}

pub(crate) async fn lock_reservation(
    txn: &DatabaseTransaction,
    reservation_id: Uuid,
) -> Result<stock_reservations::Model, StockError> {
    stock_reservations::Entity::find_by_id(reservation_id)
        .lock_exclusive()
        .one(txn)
        .await
        .map_err(pg::stock_error)?
        .ok_or(StockError::ReservationNotFound(reservation_id))
}

/// Marks a locked reservation released; released ones are left untouched.
pub(crate) async fn release_locked(
    txn: &DatabaseTransaction,
    reservation: stock_reservations::Model,
) -> Result<stock_reservations::Model, StockError> {
    if reservation.released_at.is_some() {
        return Ok(reservation);
    }
    let mut active: stock_reservations::ActiveModel = reservation.into();
    active.released_at = Set(Some(Utc::now().into()));
    active.update(txn).await.map_err(pg::stock_error)
}

async fn insert_move(
    txn: &DatabaseTransaction,
    header: &MoveHeader<'_>,
) -> Result<stock_moves::Model, StockError> {
    MoveRules::validate_purpose(header.move_type, header.purpose)?;

    stock_moves::ActiveModel {
        id: Set(Uuid::now_v7()),
        move_type: Set(header.move_type.into()),
        purpose: Set(header.purpose.map(Into::into)),
        move_date: Set(header.move_date),
        reference: Set(header.reference.map(str::to_string)),
        from_warehouse_id: Set(header.from_warehouse_id),
        to_warehouse_id: Set(header.to_warehouse_id),
        is_reversal: Set(header.reversed_move_id.is_some()),
        reversed_move_id: Set(header.reversed_move_id),
        journal_entry_id: Set(None),
        sales_journal_entry_id: Set(None),
        created_by: Set(header.created_by.map(str::to_string)),
        created_at: Set(Utc::now().into()),
    }
    .insert(txn)
    .await
    .map_err(|e| match header.reversed_move_id {
        Some(original) if pg::violates(&e, pg::UQ_STOCK_MOVES_REVERSED_MOVE) => {
            StockError::AlreadyReversed(original)
        }
        _ => pg::stock_error(&e),
    })
}

async fn insert_line(
    txn: &DatabaseTransaction,
    move_id: Uuid,
    key: StockKey,
    quantity: Decimal,
    unit_cost: Option<Decimal>,
) -> Result<stock_move_lines::Model, StockError> {
    stock_move_lines::ActiveModel {
        id: Set(Uuid::now_v7()),
        move_id: Set(move_id),
        warehouse_id: Set(key.warehouse_id),
        item_id: Set(key.item_id),
        quantity: Set(quantity),
        unit_cost: Set(unit_cost),
        created_at: Set(Utc::now().into()),
    }
    .insert(txn)
    .await
    .map_err(pg::stock_error)
}

async fn insert_lot(
    txn: &DatabaseTransaction,
    key: StockKey,
    unit_cost: Decimal,
    quantity: Decimal,
    received_at: DateTime<Utc>,
    source_line_id: Uuid,
) -> Result<stock_lots::Model, StockError> {
    stock_lots::ActiveModel {
        id: Set(Uuid::now_v7()),
        warehouse_id: Set(key.warehouse_id),
        item_id: Set(key.item_id),
        unit_cost: Set(unit_cost),
        qty_in: Set(quantity),
        qty_remaining: Set(quantity),
        received_at: Set(received_at.into()),
        source_line_id: Set(Some(source_line_id)),
        created_at: Set(Utc::now().into()),
    }
    .insert(txn)
    .await
    .map_err(pg::stock_error)
}

/// Drains `quantity` from the locked `lots` of `key` and records the line
/// and its allocations.
async fn consume_line(
    txn: &DatabaseTransaction,
    move_id: Uuid,
    key: StockKey,
    quantity: Decimal,
    lots: &mut [LotSnapshot],
) -> Result<(LineDetail, ConsumptionPlan), StockError> {
    let plan = FifoPlanner::consume(lots, quantity).map_err(|e| {
        if matches!(e, StockError::AllocationShortfall { .. }) {
            error!(key = %key, move_id = %move_id, error = %e, "FIFO allocation shortfall");
        }
        e
    })?;

    let line = insert_line(txn, move_id, key, quantity, Some(plan.unit_cost)).await?;

    let remaining: HashMap<Uuid, Decimal> =
        lots.iter().map(|lot| (lot.id, lot.qty_remaining)).collect();
    let mut allocations = Vec::with_capacity(plan.allocations.len());
    for allocation in &plan.allocations {
        let qty_remaining = remaining
            .get(&allocation.lot_id)
            .copied()
            .ok_or(StockError::LotNotFound(allocation.lot_id))?;
        stock_lots::ActiveModel {
            id: Unchanged(allocation.lot_id),
            qty_remaining: Set(qty_remaining),
            ..Default::default()
        }
        .update(txn)
        .await
        .map_err(pg::stock_error)?;

        let model = stock_allocations::ActiveModel {
            id: Set(Uuid::now_v7()),
            line_id: Set(line.id),
            lot_id: Set(allocation.lot_id),
            qty: Set(allocation.qty),
            unit_cost: Set(allocation.unit_cost),
            created_at: Set(Utc::now().into()),
        }
        .insert(txn)
        .await
        .map_err(pg::stock_error)?;

        debug!(
            line_id = %line.id,
            lot_id = %allocation.lot_id,
            qty = %allocation.qty,
            unit_cost = %allocation.unit_cost,
            "Lot allocated"
        );
        allocations.push(model);
    }

    Ok((
        LineDetail {
            line,
            allocations,
            lots_created: Vec::new(),
        },
        plan,
    ))
}

async fn transfer_line(
    txn: &DatabaseTransaction,
    move_id: Uuid,
    key: StockKey,
    to_warehouse_id: Uuid,
    quantity: Decimal,
    lots: &mut [LotSnapshot],
) -> Result<LineDetail, StockError> {
    let (mut detail, plan) = consume_line(txn, move_id, key, quantity, lots).await?;
    let destination = StockKey::new(to_warehouse_id, key.item_id);
    for allocation in &plan.allocations {
        let lot = insert_lot(
            txn,
            destination,
            allocation.unit_cost,
            allocation.qty,
            allocation.received_at,
            detail.line.id,
        )
        .await?;
        detail.lots_created.push(lot);
    }
    Ok(detail)
}

async fn restore_line(
    txn: &DatabaseTransaction,
    move_id: Uuid,
    key: StockKey,
    quantity: Decimal,
    unit_cost: Option<Decimal>,
    restored: &[RestoredLot],
) -> Result<LineDetail, StockError> {
    let line = insert_line(txn, move_id, key, quantity, unit_cost).await?;
    let mut lots_created = Vec::with_capacity(restored.len());
    for lot in restored {
        lots_created
            .push(insert_lot(txn, key, lot.unit_cost, lot.qty, lot.received_at, line.id).await?);
    }
    Ok(LineDetail {
        line,
        allocations: Vec::new(),
        lots_created,
    })
}

async fn load_line_snapshots(
    txn: &DatabaseTransaction,
    move_id: Uuid,
) -> Result<Vec<LineSnapshot>, StockError> {
    let lines = stock_move_lines::Entity::find()
        .filter(stock_move_lines::Column::MoveId.eq(move_id))
        .order_by_asc(stock_move_lines::Column::Id)
        .all(txn)
        .await
        .map_err(pg::stock_error)?;

    let allocations = stock_allocations::Entity::find()
        .filter(stock_allocations::Column::LineId.is_in(lines.iter().map(|l| l.id)))
        .order_by_asc(stock_allocations::Column::Id)
        .all(txn)
        .await
        .map_err(pg::stock_error)?;

    let received: HashMap<Uuid, DateTime<Utc>> = stock_lots::Entity::find()
        .filter(stock_lots::Column::Id.is_in(allocations.iter().map(|a| a.lot_id)))
        .all(txn)
        .await
        .map_err(pg::stock_error)?
        .into_iter()
        .map(|lot| (lot.id, lot.received_at.with_timezone(&Utc)))
        .collect();

    lines
        .into_iter()
        .map(|line| {
            let planned = allocations
                .iter()
                .filter(|a| a.line_id == line.id)
                .map(|a| {
                    let received_at = received
                        .get(&a.lot_id)
                        .copied()
                        .ok_or(StockError::LotNotFound(a.lot_id))?;
                    Ok(PlannedAllocation {
                        lot_id: a.lot_id,
                        received_at,
                        qty: a.qty,
                        unit_cost: a.unit_cost,
                    })
                })
                .collect::<Result<Vec<_>, StockError>>()?;
            Ok(LineSnapshot {
                key: StockKey::new(line.warehouse_id, line.item_id),
                quantity: line.quantity,
                unit_cost: line.unit_cost,
                allocations: planned,
            })
        })
        .collect()
}

/// Loads the lines, allocations and created lots of a move.
pub(crate) async fn load_detail(
    txn: &DatabaseTransaction,
    stock_move: stock_moves::Model,
) -> Result<MoveDetail, StockError> {
    let lines = stock_move_lines::Entity::find()
        .filter(stock_move_lines::Column::MoveId.eq(stock_move.id))
        .order_by_asc(stock_move_lines::Column::Id)
        .all(txn)
        .await
        .map_err(pg::stock_error)?;
    let line_ids: Vec<Uuid> = lines.iter().map(|l| l.id).collect();

    let mut allocations = stock_allocations::Entity::find()
        .filter(stock_allocations::Column::LineId.is_in(line_ids.clone()))
        .order_by_asc(stock_allocations::Column::Id)
        .all(txn)
        .await
        .map_err(pg::stock_error)?;
    let mut created = stock_lots::Entity::find()
        .filter(stock_lots::Column::SourceLineId.is_in(line_ids))
        .order_by_asc(stock_lots::Column::Id)
        .all(txn)
        .await
        .map_err(pg::stock_error)?;

    let lines = lines
        .into_iter()
        .map(|line| {
            let (mine, rest): (Vec<_>, Vec<_>) =
                allocations.drain(..).partition(|a| a.line_id == line.id);
            allocations = rest;
            let (lots_created, rest): (Vec<_>, Vec<_>) = created
                .drain(..)
                .partition(|lot| lot.source_line_id == Some(line.id));
            created = rest;
            LineDetail {
                line,
                allocations: mine,
                lots_created,
            }
        })
        .collect();

    Ok(MoveDetail { stock_move, lines })
}

//! Stock schema: catalog, FIFO lots, moves, allocations and reservations.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        // ============================================================
        // PART 1: ENUMS
        // ============================================================
        db.execute_unprepared(ENUMS_SQL).await?;

        // ============================================================
        // PART 2: CATALOG
        // ============================================================
        db.execute_unprepared(CATALOG_SQL).await?;

        // ============================================================
        // PART 3: MOVES, LOTS & ALLOCATIONS
        // ============================================================
        db.execute_unprepared(STOCK_MOVES_SQL).await?;
        db.execute_unprepared(STOCK_MOVE_LINES_SQL).await?;
        db.execute_unprepared(STOCK_LOTS_SQL).await?;
        db.execute_unprepared(STOCK_ALLOCATIONS_SQL).await?;

        // ============================================================
        // PART 4: RESERVATIONS
        // ============================================================
        db.execute_unprepared(STOCK_RESERVATIONS_SQL).await?;

        // ============================================================
        // PART 5: TRIGGERS
        // ============================================================
        db.execute_unprepared(STOCK_TRIGGERS_SQL).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(DROP_ALL_SQL).await?;
        Ok(())
    }
}

// ============================================================
// SQL CONSTANTS
// ============================================================

const ENUMS_SQL: &str = r"
CREATE TYPE move_type AS ENUM ('IN', 'OUT', 'TRANSFER', 'ADJUST');

CREATE TYPE move_purpose AS ENUM ('sale', 'consumption', 'waste', 'adjustment');
";

const CATALOG_SQL: &str = r"
CREATE TABLE warehouses (
    id UUID PRIMARY KEY,
    code VARCHAR(50) NOT NULL CHECK (length(trim(code)) > 0),
    name VARCHAR(200) NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),

    CONSTRAINT uq_warehouses_code UNIQUE (code)
);

CREATE TABLE items (
    id UUID PRIMARY KEY,
    code VARCHAR(50) NOT NULL CHECK (length(trim(code)) > 0),
    name VARCHAR(200) NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),

    CONSTRAINT uq_items_code UNIQUE (code)
);
";

const STOCK_MOVES_SQL: &str = r"
CREATE TABLE stock_moves (
    id UUID PRIMARY KEY,
    move_type move_type NOT NULL,
    purpose move_purpose,
    move_date DATE NOT NULL,
    reference VARCHAR(100),
    from_warehouse_id UUID REFERENCES warehouses(id) ON DELETE RESTRICT,
    to_warehouse_id UUID REFERENCES warehouses(id) ON DELETE RESTRICT,
    is_reversal BOOLEAN NOT NULL DEFAULT false,
    reversed_move_id UUID REFERENCES stock_moves(id) ON DELETE RESTRICT,
    journal_entry_id UUID REFERENCES journal_entries(id) ON DELETE RESTRICT,
    sales_journal_entry_id UUID REFERENCES journal_entries(id) ON DELETE RESTRICT,
    created_by VARCHAR(100),
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),

    CONSTRAINT uq_stock_moves_reversed_move UNIQUE (reversed_move_id),
    CONSTRAINT uq_stock_moves_journal_entry UNIQUE (journal_entry_id),
    CONSTRAINT uq_stock_moves_sales_journal_entry UNIQUE (sales_journal_entry_id),
    CONSTRAINT chk_stock_moves_reversal_flag CHECK (is_reversal = (reversed_move_id IS NOT NULL)),
    CONSTRAINT chk_stock_moves_transfer CHECK (
        move_type <> 'TRANSFER'
        OR (from_warehouse_id IS NOT NULL
            AND to_warehouse_id IS NOT NULL
            AND from_warehouse_id <> to_warehouse_id)
    ),
    CONSTRAINT chk_stock_moves_purpose CHECK (purpose IS NULL OR move_type IN ('OUT', 'ADJUST'))
);

CREATE INDEX idx_stock_moves_date ON stock_moves(move_date);
";

const STOCK_MOVE_LINES_SQL: &str = r"
CREATE TABLE stock_move_lines (
    id UUID PRIMARY KEY,
    move_id UUID NOT NULL REFERENCES stock_moves(id) ON DELETE RESTRICT,
    warehouse_id UUID NOT NULL REFERENCES warehouses(id) ON DELETE RESTRICT,
    item_id UUID NOT NULL REFERENCES items(id) ON DELETE RESTRICT,
    quantity NUMERIC(14, 4) NOT NULL CHECK (quantity > 0),
    unit_cost NUMERIC(14, 4) CHECK (unit_cost IS NULL OR unit_cost >= 0),
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE INDEX idx_stock_move_lines_move ON stock_move_lines(move_id);
";

const STOCK_LOTS_SQL: &str = r"
CREATE TABLE stock_lots (
    id UUID PRIMARY KEY,
    warehouse_id UUID NOT NULL REFERENCES warehouses(id) ON DELETE RESTRICT,
    item_id UUID NOT NULL REFERENCES items(id) ON DELETE RESTRICT,
    unit_cost NUMERIC(14, 4) NOT NULL CHECK (unit_cost > 0),
    qty_in NUMERIC(14, 4) NOT NULL CHECK (qty_in > 0),
    qty_remaining NUMERIC(14, 4) NOT NULL,
    received_at TIMESTAMPTZ NOT NULL,
    source_line_id UUID REFERENCES stock_move_lines(id) ON DELETE RESTRICT,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),

    CONSTRAINT chk_stock_lots_remaining CHECK (qty_remaining >= 0 AND qty_remaining <= qty_in)
);

-- FIFO scan: open lots of one key, oldest first
CREATE INDEX idx_stock_lots_fifo ON stock_lots(warehouse_id, item_id, received_at, id)
    WHERE qty_remaining > 0;
";

const STOCK_ALLOCATIONS_SQL: &str = r"
CREATE TABLE stock_allocations (
    id UUID PRIMARY KEY,
    line_id UUID NOT NULL REFERENCES stock_move_lines(id) ON DELETE RESTRICT,
    lot_id UUID NOT NULL REFERENCES stock_lots(id) ON DELETE RESTRICT,
    qty NUMERIC(14, 4) NOT NULL CHECK (qty > 0),
    unit_cost NUMERIC(14, 4) NOT NULL CHECK (unit_cost > 0),
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE INDEX idx_stock_allocations_line ON stock_allocations(line_id);
CREATE INDEX idx_stock_allocations_lot ON stock_allocations(lot_id);
";

const STOCK_RESERVATIONS_SQL: &str = r"
CREATE TABLE stock_reservations (
    id UUID PRIMARY KEY,
    warehouse_id UUID NOT NULL REFERENCES warehouses(id) ON DELETE RESTRICT,
    item_id UUID NOT NULL REFERENCES items(id) ON DELETE RESTRICT,
    quantity NUMERIC(14, 4) NOT NULL CHECK (quantity > 0),
    source_type VARCHAR(50),
    source_id VARCHAR(100),
    released_at TIMESTAMPTZ,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE INDEX idx_stock_reservations_active ON stock_reservations(warehouse_id, item_id)
    WHERE released_at IS NULL;
";

const STOCK_TRIGGERS_SQL: &str = r"
-- ============================================================
-- FUNCTION: guard_stock_lot
-- Lots are cost layers: never deleted, only drained
-- ============================================================
CREATE OR REPLACE FUNCTION guard_stock_lot()
RETURNS TRIGGER AS $$
BEGIN
    IF TG_OP = 'DELETE' THEN
        RAISE EXCEPTION 'STOCK_LOT_UNDELETABLE: lot % cannot be deleted', OLD.id;
    END IF;

    IF NEW.qty_in <> OLD.qty_in
        OR NEW.unit_cost <> OLD.unit_cost
        OR NEW.received_at <> OLD.received_at
        OR NEW.warehouse_id <> OLD.warehouse_id
        OR NEW.item_id <> OLD.item_id THEN
        RAISE EXCEPTION 'STOCK_LOT_IMMUTABLE: lot % can only be drained', OLD.id;
    END IF;

    IF NEW.qty_remaining > OLD.qty_remaining THEN
        RAISE EXCEPTION 'STOCK_LOT_REFILLED: lot % remaining % -> %',
            OLD.id, OLD.qty_remaining, NEW.qty_remaining;
    END IF;

    RETURN NEW;
END;
$$ LANGUAGE plpgsql;

CREATE TRIGGER trg_guard_stock_lot
BEFORE UPDATE OR DELETE ON stock_lots
FOR EACH ROW
EXECUTE FUNCTION guard_stock_lot();

-- ============================================================
-- FUNCTION: guard_stock_allocation
-- The allocation trail is append-only
-- ============================================================
CREATE OR REPLACE FUNCTION guard_stock_allocation()
RETURNS TRIGGER AS $$
BEGIN
    RAISE EXCEPTION 'STOCK_ALLOCATION_IMMUTABLE: allocation % cannot change', OLD.id;
END;
$$ LANGUAGE plpgsql;

CREATE TRIGGER trg_guard_stock_allocation
BEFORE UPDATE OR DELETE ON stock_allocations
FOR EACH ROW
EXECUTE FUNCTION guard_stock_allocation();

-- ============================================================
-- FUNCTION: check_allocation_total
-- Allocations of a line add up to exactly the line quantity
-- ============================================================
CREATE OR REPLACE FUNCTION check_allocation_total()
RETURNS TRIGGER AS $$
DECLARE
    line_qty NUMERIC(14, 4);
    allocated NUMERIC(14, 4);
BEGIN
    SELECT quantity INTO line_qty FROM stock_move_lines WHERE id = NEW.line_id;

    SELECT COALESCE(SUM(qty), 0) INTO allocated
    FROM stock_allocations
    WHERE line_id = NEW.line_id;

    IF allocated <> line_qty THEN
        RAISE EXCEPTION 'ALLOCATION_MISMATCH: line % quantity % allocated %',
            NEW.line_id, line_qty, allocated;
    END IF;

    RETURN NEW;
END;
$$ LANGUAGE plpgsql;

CREATE CONSTRAINT TRIGGER trg_check_allocation_total
AFTER INSERT ON stock_allocations
DEFERRABLE INITIALLY DEFERRED
FOR EACH ROW
EXECUTE FUNCTION check_allocation_total();
";

const DROP_ALL_SQL: &str = r"
-- ============================================================
-- DROP ALL: Rollback migration
-- ============================================================

DROP TRIGGER IF EXISTS trg_check_allocation_total ON stock_allocations;
DROP TRIGGER IF EXISTS trg_guard_stock_allocation ON stock_allocations;
DROP TRIGGER IF EXISTS trg_guard_stock_lot ON stock_lots;

DROP FUNCTION IF EXISTS check_allocation_total();
DROP FUNCTION IF EXISTS guard_stock_allocation();
DROP FUNCTION IF EXISTS guard_stock_lot();

DROP TABLE IF EXISTS stock_reservations CASCADE;
DROP TABLE IF EXISTS stock_allocations CASCADE;
DROP TABLE IF EXISTS stock_lots CASCADE;
DROP TABLE IF EXISTS stock_move_lines CASCADE;
DROP TABLE IF EXISTS stock_moves CASCADE;
DROP TABLE IF EXISTS items CASCADE;
DROP TABLE IF EXISTS warehouses CASCADE;

DROP TYPE IF EXISTS move_purpose;
DROP TYPE IF EXISTS move_type;
";

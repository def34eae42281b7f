//! Ledger schema: ledgers, chart of accounts, periods and the journal.
//!
//! Every journal invariant that application code checks is also enforced
//! here, so a buggy or foreign writer cannot corrupt posted state.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        // ============================================================
        // PART 1: EXTENSIONS & ENUMS
        // ============================================================
        db.execute_unprepared(EXTENSIONS_SQL).await?;
        db.execute_unprepared(ENUMS_SQL).await?;

        // ============================================================
        // PART 2: CHART OF ACCOUNTS
        // ============================================================
        db.execute_unprepared(LEDGERS_SQL).await?;
        db.execute_unprepared(ACCOUNTS_SQL).await?;
        db.execute_unprepared(PERIODS_SQL).await?;

        // ============================================================
        // PART 3: JOURNAL
        // ============================================================
        db.execute_unprepared(JOURNAL_ENTRIES_SQL).await?;
        db.execute_unprepared(JOURNAL_ITEMS_SQL).await?;

        // ============================================================
        // PART 4: TRIGGERS
        // ============================================================
        db.execute_unprepared(ACCOUNT_TRIGGERS_SQL).await?;
        db.execute_unprepared(JOURNAL_TRIGGERS_SQL).await?;

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

const EXTENSIONS_SQL: &str = r"
-- Needed for the period overlap exclusion constraint (uuid equality in GiST)
CREATE EXTENSION IF NOT EXISTS btree_gist;
";

const ENUMS_SQL: &str = r"
CREATE TYPE account_type AS ENUM (
    'asset',
    'liability',
    'equity',
    'income',
    'expense'
);

CREATE TYPE normal_side AS ENUM ('debit', 'credit');

-- Journal entry lifecycle: DRAFT -> POSTED, or DRAFT -> VOID
CREATE TYPE entry_status AS ENUM ('DRAFT', 'POSTED', 'VOID');
";

const LEDGERS_SQL: &str = r"
CREATE TABLE ledgers (
    id UUID PRIMARY KEY,
    name VARCHAR(200) NOT NULL CHECK (length(trim(name)) > 0),
    tax_id VARCHAR(50),
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
);
";

const ACCOUNTS_SQL: &str = r"
CREATE TABLE accounts (
    id UUID PRIMARY KEY,
    ledger_id UUID NOT NULL REFERENCES ledgers(id) ON DELETE RESTRICT,
    code VARCHAR(50) NOT NULL CHECK (length(trim(code)) > 0),
    name VARCHAR(200) NOT NULL,
    account_type account_type NOT NULL,
    normal_side normal_side NOT NULL,
    is_postable BOOLEAN NOT NULL DEFAULT true,
    is_active BOOLEAN NOT NULL DEFAULT true,
    parent_id UUID REFERENCES accounts(id) ON DELETE RESTRICT,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),

    CONSTRAINT uq_accounts_ledger_code UNIQUE (ledger_id, code),
    CONSTRAINT chk_accounts_not_own_parent CHECK (parent_id IS NULL OR parent_id <> id)
);

CREATE INDEX idx_accounts_ledger ON accounts(ledger_id);
CREATE INDEX idx_accounts_parent ON accounts(parent_id) WHERE parent_id IS NOT NULL;
";

const PERIODS_SQL: &str = r"
CREATE TABLE periods (
    id UUID PRIMARY KEY,
    ledger_id UUID NOT NULL REFERENCES ledgers(id) ON DELETE RESTRICT,
    name VARCHAR(100) NOT NULL,
    start_date DATE NOT NULL,
    end_date DATE NOT NULL,
    is_closed BOOLEAN NOT NULL DEFAULT false,
    closed_at TIMESTAMPTZ,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),

    CONSTRAINT uq_periods_ledger_name UNIQUE (ledger_id, name),
    CONSTRAINT chk_periods_date_range CHECK (start_date <= end_date),
    CONSTRAINT chk_periods_closed_at CHECK (is_closed = (closed_at IS NOT NULL)),
    CONSTRAINT ex_periods_overlap EXCLUDE USING gist (
        ledger_id WITH =,
        daterange(start_date, end_date, '[]') WITH &&
    )
);
";

const JOURNAL_ENTRIES_SQL: &str = r"
CREATE TABLE journal_entries (
    id UUID PRIMARY KEY,
    ledger_id UUID NOT NULL REFERENCES ledgers(id) ON DELETE RESTRICT,
    number BIGINT NOT NULL CHECK (number > 0),
    date DATE NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    status entry_status NOT NULL DEFAULT 'DRAFT',
    is_reversal BOOLEAN NOT NULL DEFAULT false,
    reversed_entry_id UUID REFERENCES journal_entries(id) ON DELETE RESTRICT,
    posted_at TIMESTAMPTZ,
    posted_by VARCHAR(100),
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),

    CONSTRAINT uq_journal_entries_ledger_number UNIQUE (ledger_id, number),
    -- At most one reversal per entry
    CONSTRAINT uq_journal_entries_reversed_entry UNIQUE (reversed_entry_id),
    CONSTRAINT chk_journal_entries_reversal_flag CHECK (is_reversal = (reversed_entry_id IS NOT NULL)),
    CONSTRAINT chk_journal_entries_posted_at CHECK (status <> 'POSTED' OR posted_at IS NOT NULL)
);

CREATE INDEX idx_journal_entries_ledger_date ON journal_entries(ledger_id, date);
CREATE INDEX idx_journal_entries_status ON journal_entries(ledger_id, status);
";

const JOURNAL_ITEMS_SQL: &str = r"
CREATE TABLE journal_items (
    id UUID PRIMARY KEY,
    entry_id UUID NOT NULL REFERENCES journal_entries(id) ON DELETE CASCADE,
    account_id UUID NOT NULL REFERENCES accounts(id) ON DELETE RESTRICT,
    debit NUMERIC(18, 2) NOT NULL DEFAULT 0,
    credit NUMERIC(18, 2) NOT NULL DEFAULT 0,
    description TEXT,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),

    -- Exactly one side strictly positive, the other exactly zero
    CONSTRAINT chk_journal_items_one_sided CHECK (
        (debit > 0 AND credit = 0) OR (credit > 0 AND debit = 0)
    )
);

CREATE INDEX idx_journal_items_entry ON journal_items(entry_id);
CREATE INDEX idx_journal_items_account ON journal_items(account_id);
";

const ACCOUNT_TRIGGERS_SQL: &str = r"
-- ============================================================
-- FUNCTION: check_account_tree
-- Parents live in the same ledger and are never postable
-- ============================================================
CREATE OR REPLACE FUNCTION check_account_tree()
RETURNS TRIGGER AS $$
DECLARE
    parent_ledger UUID;
    parent_postable BOOLEAN;
BEGIN
    IF NEW.parent_id IS NOT NULL THEN
        SELECT ledger_id, is_postable INTO parent_ledger, parent_postable
        FROM accounts
        WHERE id = NEW.parent_id;

        IF parent_ledger <> NEW.ledger_id THEN
            RAISE EXCEPTION 'ACCOUNT_PARENT_LEDGER_MISMATCH: parent % belongs to another ledger',
                NEW.parent_id;
        END IF;

        IF parent_postable THEN
            RAISE EXCEPTION 'ACCOUNT_PARENT_POSTABLE: parent % is postable', NEW.parent_id;
        END IF;
    END IF;

    IF NEW.is_postable AND EXISTS (SELECT 1 FROM accounts WHERE parent_id = NEW.id) THEN
        RAISE EXCEPTION 'ACCOUNT_HAS_CHILDREN: account % has children and cannot be postable',
            NEW.id;
    END IF;

    RETURN NEW;
END;
$$ LANGUAGE plpgsql;

CREATE TRIGGER trg_check_account_tree
BEFORE INSERT OR UPDATE OF parent_id, is_postable, ledger_id ON accounts
FOR EACH ROW
EXECUTE FUNCTION check_account_tree();
";

const JOURNAL_TRIGGERS_SQL: &str = r"
-- ============================================================
-- FUNCTION: guard_journal_entry_update
-- POSTED status and date are immutable, VOID is terminal, and no entry
-- dated inside a closed period may become or stay POSTED
-- ============================================================
CREATE OR REPLACE FUNCTION guard_journal_entry_update()
RETURNS TRIGGER AS $$
BEGIN
    IF TG_OP = 'UPDATE' THEN
        IF OLD.status = 'VOID' THEN
            RAISE EXCEPTION 'ENTRY_VOID: entry % is void', OLD.id;
        END IF;

        IF OLD.status = 'POSTED' AND (
            NEW.status <> OLD.status
            OR NEW.date <> OLD.date
            OR NEW.ledger_id <> OLD.ledger_id
            OR NEW.number <> OLD.number
        ) THEN
            RAISE EXCEPTION 'POSTED_ENTRY_IMMUTABLE: entry % is posted', OLD.id;
        END IF;
    END IF;

    IF NEW.status = 'POSTED' AND EXISTS (
        SELECT 1 FROM periods p
        WHERE p.ledger_id = NEW.ledger_id
          AND p.is_closed
          AND NEW.date BETWEEN p.start_date AND p.end_date
    ) THEN
        RAISE EXCEPTION 'PERIOD_CLOSED: date % falls in a closed period', NEW.date;
    END IF;

    RETURN NEW;
END;
$$ LANGUAGE plpgsql;

CREATE TRIGGER trg_guard_journal_entry_update
BEFORE INSERT OR UPDATE ON journal_entries
FOR EACH ROW
EXECUTE FUNCTION guard_journal_entry_update();

-- ============================================================
-- FUNCTION: guard_journal_entry_delete
-- ============================================================
CREATE OR REPLACE FUNCTION guard_journal_entry_delete()
RETURNS TRIGGER AS $$
BEGIN
    IF OLD.status = 'POSTED' THEN
        RAISE EXCEPTION 'POSTED_ENTRY_UNDELETABLE: entry % is posted', OLD.id;
    END IF;
    RETURN OLD;
END;
$$ LANGUAGE plpgsql;

CREATE TRIGGER trg_guard_journal_entry_delete
BEFORE DELETE ON journal_entries
FOR EACH ROW
EXECUTE FUNCTION guard_journal_entry_delete();

-- ============================================================
-- FUNCTION: check_entry_balance
-- Posted entries have at least one item and sum(debit) = sum(credit).
-- Deferred to commit so items and status can change in any order.
-- ============================================================
CREATE OR REPLACE FUNCTION check_entry_balance()
RETURNS TRIGGER AS $$
DECLARE
    total_debit NUMERIC(18, 2);
    total_credit NUMERIC(18, 2);
    item_count BIGINT;
BEGIN
    IF NEW.status = 'POSTED' THEN
        SELECT COALESCE(SUM(debit), 0), COALESCE(SUM(credit), 0), COUNT(*)
        INTO total_debit, total_credit, item_count
        FROM journal_items
        WHERE entry_id = NEW.id;

        IF item_count = 0 THEN
            RAISE EXCEPTION 'ENTRY_EMPTY: entry % has no items', NEW.id;
        END IF;

        IF total_debit <> total_credit THEN
            RAISE EXCEPTION 'ENTRY_UNBALANCED: entry % debit % credit %',
                NEW.id, total_debit, total_credit;
        END IF;
    END IF;

    RETURN NEW;
END;
$$ LANGUAGE plpgsql;

CREATE CONSTRAINT TRIGGER trg_check_entry_balance
AFTER INSERT OR UPDATE ON journal_entries
DEFERRABLE INITIALLY DEFERRED
FOR EACH ROW
EXECUTE FUNCTION check_entry_balance();

-- ============================================================
-- FUNCTION: guard_journal_item_change
-- Items change only on DRAFT entries and post only to postable accounts
-- of the entry's ledger. Items of POSTED entries are never deleted.
-- ============================================================
CREATE OR REPLACE FUNCTION guard_journal_item_change()
RETURNS TRIGGER AS $$
DECLARE
    parent_status entry_status;
BEGIN
    IF TG_OP IN ('UPDATE', 'DELETE') THEN
        SELECT status INTO parent_status FROM journal_entries WHERE id = OLD.entry_id;

        IF parent_status = 'POSTED' THEN
            RAISE EXCEPTION 'POSTED_ITEM_IMMUTABLE: entry % is posted', OLD.entry_id;
        END IF;

        IF TG_OP = 'DELETE' THEN
            RETURN OLD;
        END IF;
    END IF;

    SELECT status INTO parent_status FROM journal_entries WHERE id = NEW.entry_id;

    IF parent_status IS DISTINCT FROM 'DRAFT' THEN
        RAISE EXCEPTION 'ENTRY_NOT_DRAFT: entry % is %', NEW.entry_id, parent_status;
    END IF;

    IF NOT EXISTS (
        SELECT 1
        FROM accounts a
        JOIN journal_entries e ON e.ledger_id = a.ledger_id
        WHERE a.id = NEW.account_id
          AND e.id = NEW.entry_id
          AND a.is_postable
    ) THEN
        RAISE EXCEPTION 'ITEM_ACCOUNT_INVALID: account % cannot take items of entry %',
            NEW.account_id, NEW.entry_id;
    END IF;

    RETURN NEW;
END;
$$ LANGUAGE plpgsql;

CREATE TRIGGER trg_guard_journal_item_change
BEFORE INSERT OR UPDATE OR DELETE ON journal_items
FOR EACH ROW
EXECUTE FUNCTION guard_journal_item_change();
";

const DROP_ALL_SQL: &str = r"
-- ============================================================
-- DROP ALL: Rollback migration
-- Order matters due to foreign key constraints
-- ============================================================

-- Drop triggers
DROP TRIGGER IF EXISTS trg_guard_journal_item_change ON journal_items;
DROP TRIGGER IF EXISTS trg_check_entry_balance ON journal_entries;
DROP TRIGGER IF EXISTS trg_guard_journal_entry_delete ON journal_entries;
DROP TRIGGER IF EXISTS trg_guard_journal_entry_update ON journal_entries;
DROP TRIGGER IF EXISTS trg_check_account_tree ON accounts;

-- Drop functions
DROP FUNCTION IF EXISTS guard_journal_item_change();
DROP FUNCTION IF EXISTS check_entry_balance();
DROP FUNCTION IF EXISTS guard_journal_entry_delete();
DROP FUNCTION IF EXISTS guard_journal_entry_update();
DROP FUNCTION IF EXISTS check_account_tree();

-- Drop tables
DROP TABLE IF EXISTS journal_items CASCADE;
DROP TABLE IF EXISTS journal_entries CASCADE;
DROP TABLE IF EXISTS periods CASCADE;
DROP TABLE IF EXISTS accounts CASCADE;
DROP TABLE IF EXISTS ledgers CASCADE;

-- Drop enums
DROP TYPE IF EXISTS entry_status;
DROP TYPE IF EXISTS normal_side;
DROP TYPE IF EXISTS account_type;
";

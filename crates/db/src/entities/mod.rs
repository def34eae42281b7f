//! `SeaORM` entities, one module per table.

pub mod accounts;
pub mod items;
pub mod journal_entries;
pub mod journal_items;
pub mod ledgers;
pub mod periods;
pub mod sea_orm_active_enums;
pub mod stock_allocations;
pub mod stock_lots;
pub mod stock_move_lines;
pub mod stock_moves;
pub mod stock_reservations;
pub mod warehouses;

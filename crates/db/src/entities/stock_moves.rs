//! `SeaORM` Entity for stock_moves table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::sea_orm_active_enums::{MovePurpose, MoveType};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "stock_moves")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub move_type: MoveType,
    pub purpose: Option<MovePurpose>,
    pub move_date: Date,
    pub reference: Option<String>,
    pub from_warehouse_id: Option<Uuid>,
    pub to_warehouse_id: Option<Uuid>,
    pub is_reversal: bool,
    #[sea_orm(unique)]
    pub reversed_move_id: Option<Uuid>,
    #[sea_orm(unique)]
    pub journal_entry_id: Option<Uuid>,
    #[sea_orm(unique)]
    pub sales_journal_entry_id: Option<Uuid>,
    pub created_by: Option<String>,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "Entity",
        from = "Column::ReversedMoveId",
        to = "Column::Id"
    )]
    ReversedMove,
    #[sea_orm(
        belongs_to = "super::journal_entries::Entity",
        from = "Column::JournalEntryId",
        to = "super::journal_entries::Column::Id"
    )]
    JournalEntry,
    #[sea_orm(
        belongs_to = "super::journal_entries::Entity",
        from = "Column::SalesJournalEntryId",
        to = "super::journal_entries::Column::Id"
    )]
    SalesJournalEntry,
    #[sea_orm(has_many = "super::stock_move_lines::Entity")]
    StockMoveLines,
}

impl Related<super::stock_move_lines::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StockMoveLines.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Converts the row into the snapshot used by reversal planning.
    #[must_use]
    pub fn snapshot(&self, has_reversal: bool) -> tally_core::stock::MoveSnapshot {
        tally_core::stock::MoveSnapshot {
            id: self.id,
            move_type: self.move_type.into(),
            from_warehouse_id: self.from_warehouse_id,
            to_warehouse_id: self.to_warehouse_id,
            is_reversal: self.is_reversal,
            has_reversal,
        }
    }
}

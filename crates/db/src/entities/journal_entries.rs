//! `SeaORM` Entity for journal_entries table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::sea_orm_active_enums::EntryStatus;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "journal_entries")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub ledger_id: Uuid,
    pub number: i64,
    pub date: Date,
    #[sea_orm(column_type = "Text")]
    pub description: String,
    pub status: EntryStatus,
    pub is_reversal: bool,
    #[sea_orm(unique)]
    pub reversed_entry_id: Option<Uuid>,
    pub posted_at: Option<DateTimeWithTimeZone>,
    pub posted_by: Option<String>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::ledgers::Entity",
        from = "Column::LedgerId",
        to = "super::ledgers::Column::Id"
    )]
    Ledgers,
    #[sea_orm(
        belongs_to = "Entity",
        from = "Column::ReversedEntryId",
        to = "Column::Id"
    )]
    ReversedEntry,
    #[sea_orm(has_many = "super::journal_items::Entity")]
    JournalItems,
}

impl Related<super::ledgers::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Ledgers.def()
    }
}

impl Related<super::journal_items::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::JournalItems.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Converts the row into the snapshot used by the journal pipelines.
    ///
    /// `has_reversal` is not stored on the row; callers look it up.
    #[must_use]
    pub fn snapshot(&self, has_reversal: bool) -> tally_core::ledger::EntrySnapshot {
        tally_core::ledger::EntrySnapshot {
            id: self.id,
            ledger_id: self.ledger_id,
            number: self.number,
            date: self.date,
            status: self.status.into(),
            is_reversal: self.is_reversal,
            has_reversal,
        }
    }
}

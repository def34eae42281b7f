//! `SeaORM` Entity for stock_allocations table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "stock_allocations")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub line_id: Uuid,
    pub lot_id: Uuid,
    #[sea_orm(column_type = "Decimal(Some((14, 4)))")]
    pub qty: Decimal,
    #[sea_orm(column_type = "Decimal(Some((14, 4)))")]
    pub unit_cost: Decimal,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::stock_move_lines::Entity",
        from = "Column::LineId",
        to = "super::stock_move_lines::Column::Id"
    )]
    StockMoveLines,
    #[sea_orm(
        belongs_to = "super::stock_lots::Entity",
        from = "Column::LotId",
        to = "super::stock_lots::Column::Id"
    )]
    StockLots,
}

impl Related<super::stock_move_lines::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StockMoveLines.def()
    }
}

impl Related<super::stock_lots::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StockLots.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

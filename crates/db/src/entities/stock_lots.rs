//! `SeaORM` Entity for stock_lots table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "stock_lots")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub warehouse_id: Uuid,
    pub item_id: Uuid,
    #[sea_orm(column_type = "Decimal(Some((14, 4)))")]
    pub unit_cost: Decimal,
    #[sea_orm(column_type = "Decimal(Some((14, 4)))")]
    pub qty_in: Decimal,
    #[sea_orm(column_type = "Decimal(Some((14, 4)))")]
    pub qty_remaining: Decimal,
    pub received_at: DateTimeWithTimeZone,
    pub source_line_id: Option<Uuid>,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::warehouses::Entity",
        from = "Column::WarehouseId",
        to = "super::warehouses::Column::Id"
    )]
    Warehouses,
    #[sea_orm(
        belongs_to = "super::items::Entity",
        from = "Column::ItemId",
        to = "super::items::Column::Id"
    )]
    Items,
    #[sea_orm(
        belongs_to = "super::stock_move_lines::Entity",
        from = "Column::SourceLineId",
        to = "super::stock_move_lines::Column::Id"
    )]
    SourceLine,
    #[sea_orm(has_many = "super::stock_allocations::Entity")]
    StockAllocations,
}

impl Related<super::warehouses::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Warehouses.def()
    }
}

impl Related<super::items::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Items.def()
    }
}

impl Related<super::stock_allocations::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StockAllocations.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Model> for tally_core::stock::LotSnapshot {
    fn from(model: &Model) -> Self {
        Self {
            id: model.id,
            received_at: model.received_at.with_timezone(&chrono::Utc),
            unit_cost: model.unit_cost,
            qty_remaining: model.qty_remaining,
        }
    }
}

//! `SeaORM` active enums mapped onto the PostgreSQL enum types.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use tally_core::chart;
use tally_core::ledger;
use tally_core::stock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "account_type")]
pub enum AccountType {
    #[sea_orm(string_value = "asset")]
    Asset,
    #[sea_orm(string_value = "liability")]
    Liability,
    #[sea_orm(string_value = "equity")]
    Equity,
    #[sea_orm(string_value = "income")]
    Income,
    #[sea_orm(string_value = "expense")]
    Expense,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "normal_side")]
pub enum NormalSide {
    #[sea_orm(string_value = "debit")]
    Debit,
    #[sea_orm(string_value = "credit")]
    Credit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "entry_status")]
pub enum EntryStatus {
    #[sea_orm(string_value = "DRAFT")]
    Draft,
    #[sea_orm(string_value = "POSTED")]
    Posted,
    #[sea_orm(string_value = "VOID")]
    Void,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "move_type")]
pub enum MoveType {
    #[sea_orm(string_value = "IN")]
    In,
    #[sea_orm(string_value = "OUT")]
    Out,
    #[sea_orm(string_value = "TRANSFER")]
    Transfer,
    #[sea_orm(string_value = "ADJUST")]
    Adjust,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "move_purpose")]
pub enum MovePurpose {
    #[sea_orm(string_value = "sale")]
    Sale,
    #[sea_orm(string_value = "consumption")]
    Consumption,
    #[sea_orm(string_value = "waste")]
    Waste,
    #[sea_orm(string_value = "adjustment")]
    Adjustment,
}

impl From<chart::AccountType> for AccountType {
    fn from(value: chart::AccountType) -> Self {
        match value {
            chart::AccountType::Asset => Self::Asset,
            chart::AccountType::Liability => Self::Liability,
            chart::AccountType::Equity => Self::Equity,
            chart::AccountType::Income => Self::Income,
            chart::AccountType::Expense => Self::Expense,
        }
    }
}

impl From<AccountType> for chart::AccountType {
    fn from(value: AccountType) -> Self {
        match value {
            AccountType::Asset => Self::Asset,
            AccountType::Liability => Self::Liability,
            AccountType::Equity => Self::Equity,
            AccountType::Income => Self::Income,
            AccountType::Expense => Self::Expense,
        }
    }
}

impl From<chart::NormalSide> for NormalSide {
    fn from(value: chart::NormalSide) -> Self {
        match value {
            chart::NormalSide::Debit => Self::Debit,
            chart::NormalSide::Credit => Self::Credit,
        }
    }
}

impl From<NormalSide> for chart::NormalSide {
    fn from(value: NormalSide) -> Self {
        match value {
            NormalSide::Debit => Self::Debit,
            NormalSide::Credit => Self::Credit,
        }
    }
}

impl From<ledger::EntryStatus> for EntryStatus {
    fn from(value: ledger::EntryStatus) -> Self {
        match value {
            ledger::EntryStatus::Draft => Self::Draft,
            ledger::EntryStatus::Posted => Self::Posted,
            ledger::EntryStatus::Void => Self::Void,
        }
    }
}

impl From<EntryStatus> for ledger::EntryStatus {
    fn from(value: EntryStatus) -> Self {
        match value {
            EntryStatus::Draft => Self::Draft,
            EntryStatus::Posted => Self::Posted,
            EntryStatus::Void => Self::Void,
        }
    }
}

impl From<stock::MoveType> for MoveType {
    fn from(value: stock::MoveType) -> Self {
        match value {
            stock::MoveType::In => Self::In,
            stock::MoveType::Out => Self::Out,
            stock::MoveType::Transfer => Self::Transfer,
            stock::MoveType::Adjust => Self::Adjust,
        }
    }
}

impl From<MoveType> for stock::MoveType {
    fn from(value: MoveType) -> Self {
        match value {
            MoveType::In => Self::In,
            MoveType::Out => Self::Out,
            MoveType::Transfer => Self::Transfer,
            MoveType::Adjust => Self::Adjust,
        }
    }
}

impl From<stock::MovePurpose> for MovePurpose {
    fn from(value: stock::MovePurpose) -> Self {
        match value {
            stock::MovePurpose::Sale => Self::Sale,
            stock::MovePurpose::Consumption => Self::Consumption,
            stock::MovePurpose::Waste => Self::Waste,
            stock::MovePurpose::Adjustment => Self::Adjustment,
        }
    }
}

impl From<MovePurpose> for stock::MovePurpose {
    fn from(value: MovePurpose) -> Self {
        match value {
            MovePurpose::Sale => Self::Sale,
            MovePurpose::Consumption => Self::Consumption,
            MovePurpose::Waste => Self::Waste,
            MovePurpose::Adjustment => Self::Adjustment,
        }
    }
}

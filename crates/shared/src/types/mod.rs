//! Common types used across the application.

pub mod id;
pub mod precision;

pub use id::*;
pub use precision::{
    MONEY_SCALE, QUANTITY_SCALE, UNIT_COST_SCALE, fits_scale, round_money, round_unit_cost,
};

//! Shared types, errors, and configuration for Tally.
//!
//! This crate provides common types used across all other crates:
//! - Typed IDs for configuration-level entity references
//! - Decimal precision rules for money, quantities and unit costs
//! - The error-kind taxonomy every domain error maps into
//! - Configuration management

pub mod config;
pub mod error;
pub mod types;

pub use config::{AppConfig, ConfigError, StockAccountingConfig};
pub use error::{ErrorKind, StorageFailure};

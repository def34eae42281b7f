//! Application configuration management.
//!
//! The single ledger and the stock accounting settings are plain typed values
//! loaded once at process start and handed to the repositories that need them.

use serde::Deserialize;
use thiserror::Error;

use crate::types::{AccountId, LedgerId, WarehouseId};

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration sources could not be read or deserialized.
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    /// Auto-replenish is enabled but no sale warehouse is configured.
    #[error("Auto-replenish on sale requires a default sale warehouse")]
    MissingSaleWarehouse,

    /// Auto-replenish is enabled but no replenish warehouse is configured.
    #[error("Auto-replenish on sale requires a default replenish-from warehouse")]
    MissingReplenishWarehouse,

    /// The replenish warehouse is the sale warehouse itself.
    #[error("Replenish-from warehouse must differ from the sale warehouse")]
    ReplenishFromSaleWarehouse,
}

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Database configuration.
    pub database: DatabaseConfig,
    /// The ledger this process books into.
    pub ledger: LedgerConfig,
    /// Stock accounting settings.
    #[serde(default)]
    pub stock: StockAccountingConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Database connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

/// The ledger booked into by this deployment.
#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    /// Ledger identifier.
    pub ledger_id: LedgerId,
    /// Display name used when the ledger is first created.
    #[serde(default = "default_ledger_name")]
    pub name: String,
}

fn default_ledger_name() -> String {
    "Main ledger".to_string()
}

/// Stock accounting settings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StockAccountingConfig {
    /// Inventory (asset) account credited by COGS postings.
    pub inventory_account: Option<AccountId>,
    /// Cost of goods sold (expense) account debited by COGS postings.
    pub cogs_account: Option<AccountId>,
    /// Cash account debited by sales when the caller names none.
    pub default_cash_account: Option<AccountId>,
    /// Warehouse sales are taken from when the caller names none.
    pub default_sale_warehouse: Option<WarehouseId>,
    /// Warehouse receipts go to when the caller names none.
    pub default_purchase_warehouse: Option<WarehouseId>,
    /// Warehouse used to top up the sale warehouse.
    pub default_replenish_from_warehouse: Option<WarehouseId>,
    /// Post COGS automatically for stock-outs with purpose `sale`.
    #[serde(default = "default_true")]
    pub auto_cogs_on_sale: bool,
    /// Transfer missing quantity from the replenish warehouse before a sale.
    #[serde(default)]
    pub auto_replenish_on_sale: bool,
}

fn default_true() -> bool {
    true
}

impl StockAccountingConfig {
    /// Validates cross-field rules.
    ///
    /// # Errors
    ///
    /// Returns an error if auto-replenish is enabled without both warehouses,
    /// or if both warehouses are the same.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.auto_replenish_on_sale {
            return Ok(());
        }
        let sale = self
            .default_sale_warehouse
            .ok_or(ConfigError::MissingSaleWarehouse)?;
        let replenish = self
            .default_replenish_from_warehouse
            .ok_or(ConfigError::MissingReplenishWarehouse)?;
        if sale == replenish {
            return Err(ConfigError::ReplenishFromSaleWarehouse);
        }
        Ok(())
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Default `EnvFilter` directive, overridden by `RUST_LOG`.
    #[serde(default = "default_log_filter")]
    pub filter: String,
    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
            json: false,
        }
    }
}

fn default_log_filter() -> String {
    "info,sqlx=warn,sea_orm=warn".to_string()
}

impl AppConfig {
    /// Loads configuration from environment and config files.
    ///
    /// Sources, later ones overriding earlier ones: `config/default`,
    /// `config/{RUN_MODE}`, then `TALLY__*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded or fails validation.
    pub fn load() -> Result<Self, ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(config::Environment::with_prefix("TALLY").separator("__"))
            .build()?;

        let app: Self = config.try_deserialize()?;
        app.stock.validate()?;
        Ok(app)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn warehouse() -> Option<WarehouseId> {
        Some(WarehouseId::new())
    }

    #[test]
    fn test_stock_config_defaults() {
        let cfg = StockAccountingConfig::default();
        assert!(cfg.validate().is_ok());
        assert!(!cfg.auto_replenish_on_sale);
    }

    #[test]
    fn test_auto_replenish_requires_sale_warehouse() {
        let cfg = StockAccountingConfig {
            auto_replenish_on_sale: true,
            default_replenish_from_warehouse: warehouse(),
            ..Default::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::MissingSaleWarehouse)
        ));
    }

    #[test]
    fn test_auto_replenish_requires_replenish_warehouse() {
        let cfg = StockAccountingConfig {
            auto_replenish_on_sale: true,
            default_sale_warehouse: warehouse(),
            ..Default::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::MissingReplenishWarehouse)
        ));
    }

    #[test]
    fn test_auto_replenish_rejects_same_warehouse() {
        let wh = warehouse();
        let cfg = StockAccountingConfig {
            auto_replenish_on_sale: true,
            default_sale_warehouse: wh,
            default_replenish_from_warehouse: wh,
            ..Default::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::ReplenishFromSaleWarehouse)
        ));
    }

    #[test]
    fn test_load_from_environment() {
        let ledger_id = Uuid::now_v7();
        let cogs = Uuid::now_v7();
        let ledger_str = ledger_id.to_string();
        let cogs_str = cogs.to_string();
        temp_env::with_vars(
            [
                ("TALLY__DATABASE__URL", Some("postgres://localhost/tally_test")),
                ("TALLY__LEDGER__LEDGER_ID", Some(ledger_str.as_str())),
                ("TALLY__STOCK__COGS_ACCOUNT", Some(cogs_str.as_str())),
                ("TALLY__LOGGING__JSON", Some("true")),
                ("RUN_MODE", Some("test-nonexistent")),
            ],
            || {
                let cfg = AppConfig::load().unwrap();
                assert_eq!(cfg.database.url, "postgres://localhost/tally_test");
                assert_eq!(cfg.database.max_connections, 10);
                assert_eq!(cfg.ledger.ledger_id.into_inner(), ledger_id);
                assert_eq!(cfg.ledger.name, "Main ledger");
                assert_eq!(cfg.stock.cogs_account.map(AccountId::into_inner), Some(cogs));
                assert!(cfg.stock.auto_cogs_on_sale);
                assert!(cfg.logging.json);
            },
        );
    }
}

//! Database seeder for Tally development and testing.
//!
//! Seeds the configured ledger, a small retail chart of accounts, an open
//! period for the current year and two warehouses. Running it twice leaves
//! existing rows alone.
//!
//! Usage: cargo run --bin seeder

use anyhow::Context;
use chrono::{Datelike, NaiveDate, Utc};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use tally_core::chart::{AccountType, NewAccount};
use tally_core::ledger::LedgerError;
use tally_core::stock::StockError;
use tally_db::repositories::CreatePeriodInput;
use tally_db::{ChartRepository, StockRepository};
use tally_shared::AppConfig;
use tally_shared::config::LoggingConfig;

/// (code, name, type, postable, parent code)
const CHART: &[(&str, &str, AccountType, bool, Option<&str>)] = &[
    ("1", "Assets", AccountType::Asset, false, None),
    ("1000", "Cash", AccountType::Asset, true, Some("1")),
    ("1100", "Bank", AccountType::Asset, true, Some("1")),
    ("1310", "Inventory", AccountType::Asset, true, Some("1")),
    ("2", "Liabilities", AccountType::Liability, false, None),
    ("2400", "VAT payable", AccountType::Liability, true, Some("2")),
    ("3000", "Owner's equity", AccountType::Equity, true, None),
    ("5000", "Cost of goods sold", AccountType::Expense, true, None),
    ("6000", "Sales revenue", AccountType::Income, true, None),
];

const WAREHOUSES: &[(&str, &str)] = &[("MAIN", "Main storage"), ("STORE", "Shop floor")];

fn init_tracing(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| logging.filter.as_str().into());
    let registry = tracing_subscriber::registry().with(filter);
    if logging.json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load().context("failed to load configuration")?;
    init_tracing(&config.logging);

    let db = tally_db::connect_with(&config.database)
        .await
        .context("failed to connect to database")?;
    info!("Connected to database");

    let chart = ChartRepository::new(db.clone());
    let stock = StockRepository::new(db);
    let ledger_id: Uuid = config.ledger.ledger_id.into();

    seed_ledger(&chart, ledger_id, &config.ledger.name).await?;
    seed_accounts(&chart, ledger_id).await?;
    seed_period(&chart, ledger_id).await?;
    seed_warehouses(&stock).await?;

    info!("Seeding complete");
    Ok(())
}

async fn seed_ledger(chart: &ChartRepository, ledger_id: Uuid, name: &str) -> anyhow::Result<()> {
    match chart.get_ledger(ledger_id).await {
        Ok(_) => info!(ledger_id = %ledger_id, "Ledger already exists, skipping"),
        Err(LedgerError::LedgerNotFound(_)) => {
            chart.create_ledger_with_id(ledger_id, name, None).await?;
            info!(ledger_id = %ledger_id, "Ledger seeded");
        }
        Err(e) => return Err(e.into()),
    }
    Ok(())
}

async fn seed_accounts(chart: &ChartRepository, ledger_id: Uuid) -> anyhow::Result<()> {
    for &(code, name, account_type, is_postable, parent_code) in CHART {
        let existing = chart.list_accounts(ledger_id).await?;
        if existing.iter().any(|a| a.code == code) {
            continue;
        }
        let parent_id = parent_code.and_then(|parent| {
            existing
                .iter()
                .find(|a| a.code == parent)
                .map(|a| a.id)
        });

        let account = chart
            .create_account(NewAccount {
                ledger_id,
                code: code.to_string(),
                name: name.to_string(),
                account_type,
                normal_side: None,
                is_postable,
                parent_id,
            })
            .await?;
        info!(account_id = %account.id, code = %code, "Account seeded");
    }
    Ok(())
}

async fn seed_period(chart: &ChartRepository, ledger_id: Uuid) -> anyhow::Result<()> {
    let year = Utc::now().year();
    let (Some(start_date), Some(end_date)) = (
        NaiveDate::from_ymd_opt(year, 1, 1),
        NaiveDate::from_ymd_opt(year, 12, 31),
    ) else {
        anyhow::bail!("invalid calendar year {year}");
    };

    match chart
        .create_period(CreatePeriodInput {
            ledger_id,
            name: format!("FY {year}"),
            start_date,
            end_date,
        })
        .await
    {
        Ok(period) => info!(period_id = %period.id, year, "Period seeded"),
        Err(LedgerError::DuplicatePeriodName(_) | LedgerError::PeriodOverlap { .. }) => {
            info!(year, "Period already exists, skipping");
        }
        Err(e) => return Err(e.into()),
    }
    Ok(())
}

async fn seed_warehouses(stock: &StockRepository) -> anyhow::Result<()> {
    for &(code, name) in WAREHOUSES {
        match stock.create_warehouse(code, name).await {
            Ok(warehouse) => info!(warehouse_id = %warehouse.id, code = %code, "Warehouse seeded"),
            Err(StockError::DuplicateWarehouseCode(_)) => {
                info!(code = %code, "Warehouse already exists, skipping");
            }
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

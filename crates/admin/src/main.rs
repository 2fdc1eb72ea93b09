//! Back-office CLI for FreshCart pricing and inventory.
//!
//! Talks to Postgres directly; every command prints its result as JSON.

use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use mockable::DefaultClock;
use serde::Serialize;

use freshcart_core::{ProductId, UserId};
use freshcart_infra::{
    Config, InventoryLedger, NewStockTransaction, PostgresStore, PricingResolver,
};
use freshcart_inventory::TransactionType;
use freshcart_observability::LogFormat;

#[derive(Debug, Parser)]
#[command(
    name = "freshcart-admin",
    about = "Resolve customer prices and manage stock for the FreshCart storefront",
    version
)]
struct Cli {
    /// Database connection URL. Falls back to `DATABASE_URL` when omitted.
    #[arg(long, value_name = "url", global = true)]
    database_url: Option<String>,
    /// Log output format. Falls back to `FRESHCART_LOG_FORMAT`.
    #[arg(long, value_name = "json|compact", global = true)]
    log_format: Option<LogFormat>,
    /// Retry budget for concurrent stock updates.
    #[arg(long, value_name = "n", global = true)]
    max_conflict_retries: Option<u32>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Create or update the database schema.
    Migrate,
    /// Show the price a user pays for a product and where it comes from.
    Price {
        #[arg(long, value_name = "uuid")]
        user: UserId,
        #[arg(long, value_name = "uuid")]
        product: ProductId,
    },
    /// Show a product's inventory and stock status.
    Stock {
        #[arg(long, value_name = "uuid")]
        product: ProductId,
    },
    /// Apply a signed stock correction.
    Adjust {
        #[arg(long, value_name = "uuid")]
        product: ProductId,
        #[arg(long, allow_negative_numbers = true)]
        delta: i64,
        #[arg(long)]
        notes: Option<String>,
    },
    /// Record a typed stock movement (received, sold, adjusted, returned, damaged).
    Record {
        #[arg(long, value_name = "uuid")]
        product: ProductId,
        #[arg(long = "type", value_name = "type")]
        transaction_type: TransactionType,
        #[arg(long, allow_negative_numbers = true)]
        quantity: i64,
        #[arg(long)]
        notes: Option<String>,
        #[arg(long)]
        reference: Option<String>,
    },
    /// List products that are low on or out of stock.
    LowStock,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = Config::from_env()?;
    if let Some(url) = cli.database_url {
        config.database_url = Some(url);
    }
    if let Some(format) = cli.log_format {
        config.log_format = format;
    }
    if let Some(retries) = cli.max_conflict_retries {
        config.max_conflict_retries = retries;
    }

    freshcart_observability::init(config.log_format);

    let database_url = require_database_url(&config)?;
    let store = Arc::new(
        PostgresStore::connect(database_url, config.db_max_connections)
            .await
            .context("connect to database")?,
    );
    tracing::info!(command = ?cli.command, "connected to database");

    let command = cli.command;
    // Store traits are blocking; keep them off the async workers.
    tokio::task::spawn_blocking(move || run(command, store, &config)).await?
}

/// The admin tool only talks to Postgres; there is no in-memory fallback.
fn require_database_url(config: &Config) -> anyhow::Result<&str> {
    config
        .database_url
        .as_deref()
        .context("DATABASE_URL is not set (or pass --database-url)")
}

fn run(command: Command, store: Arc<PostgresStore>, config: &Config) -> anyhow::Result<()> {
    let clock = Arc::new(DefaultClock);
    let ledger = InventoryLedger::new(store.clone(), clock.clone())
        .with_max_conflict_retries(config.max_conflict_retries);

    match command {
        Command::Migrate => {
            tokio::runtime::Handle::current()
                .block_on(store.migrate())
                .context("apply schema")?;
            tracing::info!("schema applied");
        }
        Command::Price { user, product } => {
            let resolver = PricingResolver::new(store, clock);
            print_json(&resolver.quote_price(user, product)?)?;
        }
        Command::Stock { product } => {
            print_json(&ledger.inventory(product)?)?;
        }
        Command::Adjust {
            product,
            delta,
            notes,
        } => {
            let change = match notes {
                // A note needs a typed ledger entry; a bare delta goes through
                // the raw quantity update.
                Some(notes) => ledger.record_transaction(NewStockTransaction {
                    product_id: product,
                    transaction_type: TransactionType::Adjusted,
                    quantity: delta,
                    notes: Some(notes),
                    reference: None,
                    user_id: None,
                })?,
                None => ledger.update_stock_quantity(product, delta)?,
            };
            print_json(&change)?;
        }
        Command::Record {
            product,
            transaction_type,
            quantity,
            notes,
            reference,
        } => {
            let change = ledger.record_transaction(NewStockTransaction {
                product_id: product,
                transaction_type,
                quantity,
                notes,
                reference,
                user_id: None,
            })?;
            print_json(&change)?;
        }
        Command::LowStock => {
            print_json(&ledger.low_stock_report()?)?;
        }
    }

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

//! Infrastructure layer: storage backends, services and configuration.

pub mod config;
pub mod error;
pub mod ledger;
pub mod pricing;
pub mod store;

#[cfg(test)]
mod integration_tests;
#[cfg(test)]
mod test_support;

pub use config::{Config, ConfigError};
pub use error::{ServiceError, ServiceResult};
pub use ledger::{
    InventoryLedger, InventorySettings, InventoryView, NewInventory, NewStockTransaction,
    StockChange,
};
pub use pricing::{PricingAdmin, PricingResolver};
pub use store::{InMemoryStore, PostgresStore, StoreError};

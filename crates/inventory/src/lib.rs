//! Inventory domain module.
//!
//! One inventory record per product holds the current stock counter. Every
//! stock change is also written as an immutable [`StockTransaction`], and the
//! counter is what you get by folding those transactions with a floor of zero.
//! Pure domain logic: no IO, no storage.

pub mod inventory;
pub mod status;
pub mod transaction;

pub use inventory::{
    CreateInventory, Inventory, InventoryCommand, InventoryCreated, InventoryEvent,
    InventoryRecord, RecordTransaction, SettingsUpdated, StockTransactionRecorded,
    UpdateSettings, UpdateStockQuantity, INITIAL_SETUP_NOTE,
};
pub use status::StockStatus;
pub use transaction::{StockTransaction, TransactionType};

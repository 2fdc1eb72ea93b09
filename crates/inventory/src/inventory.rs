use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use freshcart_core::{
    Aggregate, AggregateRoot, DomainError, Event, InventoryId, ProductId, StockTransactionId,
    UserId,
};

use crate::status::StockStatus;
use crate::transaction::{StockTransaction, TransactionType};

/// Note attached to the `received` transaction emitted by inventory setup.
pub const INITIAL_SETUP_NOTE: &str = "Initial inventory setup";

/// Persisted inventory row for one product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryRecord {
    pub id: InventoryId,
    pub product_id: ProductId,
    pub stock_quantity: i64,
    pub min_stock_level: i64,
    pub max_stock_level: Option<i64>,
    pub reorder_point: i64,
    pub last_stock_update: DateTime<Utc>,
    pub location_code: Option<String>,
}

impl InventoryRecord {
    pub fn status(&self) -> StockStatus {
        StockStatus::classify(self.stock_quantity, self.reorder_point)
    }

    pub fn in_stock(&self) -> bool {
        self.stock_quantity > 0
    }
}

/// Aggregate root: the inventory of one product.
///
/// Keyed by product id since a product has at most one inventory record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inventory {
    product_id: ProductId,
    record: Option<InventoryRecord>,
    version: u64,
}

impl Inventory {
    /// A not-yet-created inventory for `product_id`.
    pub fn empty(product_id: ProductId) -> Self {
        Self {
            product_id,
            record: None,
            version: 0,
        }
    }

    /// Rebuild from a persisted row and its version.
    pub fn restore(record: InventoryRecord, version: u64) -> Self {
        Self {
            product_id: record.product_id,
            record: Some(record),
            version,
        }
    }

    pub fn product_id(&self) -> ProductId {
        self.product_id
    }

    pub fn record(&self) -> Option<&InventoryRecord> {
        self.record.as_ref()
    }

    pub fn into_record(self) -> Option<InventoryRecord> {
        self.record
    }

    pub fn is_created(&self) -> bool {
        self.record.is_some()
    }

    pub fn stock_quantity(&self) -> i64 {
        self.record.as_ref().map(|r| r.stock_quantity).unwrap_or(0)
    }
}

impl AggregateRoot for Inventory {
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.product_id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateInventory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateInventory {
    pub inventory_id: InventoryId,
    pub product_id: ProductId,
    pub initial_stock_quantity: i64,
    pub min_stock_level: i64,
    pub max_stock_level: Option<i64>,
    pub reorder_point: i64,
    pub location_code: Option<String>,
    /// Id for the initial `received` transaction, used only when stock > 0.
    pub transaction_id: StockTransactionId,
    pub user_id: Option<UserId>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RecordTransaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordTransaction {
    pub transaction_id: StockTransactionId,
    pub product_id: ProductId,
    pub transaction_type: TransactionType,
    pub quantity: i64,
    pub notes: Option<String>,
    pub reference: Option<String>,
    pub user_id: Option<UserId>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: UpdateStockQuantity (raw delta, audit row derived from its sign).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStockQuantity {
    pub transaction_id: StockTransactionId,
    pub product_id: ProductId,
    pub delta: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: UpdateSettings (thresholds and location, no stock movement).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSettings {
    pub product_id: ProductId,
    pub min_stock_level: i64,
    pub max_stock_level: Option<i64>,
    pub reorder_point: i64,
    pub location_code: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InventoryCommand {
    CreateInventory(CreateInventory),
    RecordTransaction(RecordTransaction),
    UpdateStockQuantity(UpdateStockQuantity),
    UpdateSettings(UpdateSettings),
}

/// Event: InventoryCreated. Stock starts at zero; initial stock arrives as a
/// separate `received` transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryCreated {
    pub inventory_id: InventoryId,
    pub product_id: ProductId,
    pub min_stock_level: i64,
    pub max_stock_level: Option<i64>,
    pub reorder_point: i64,
    pub location_code: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: StockTransactionRecorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockTransactionRecorded {
    pub transaction: StockTransaction,
    /// Signed change requested by the transaction, before clamping.
    pub delta: i64,
}

/// Event: SettingsUpdated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsUpdated {
    pub product_id: ProductId,
    pub min_stock_level: i64,
    pub max_stock_level: Option<i64>,
    pub reorder_point: i64,
    pub location_code: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InventoryEvent {
    InventoryCreated(InventoryCreated),
    StockTransactionRecorded(StockTransactionRecorded),
    SettingsUpdated(SettingsUpdated),
}

impl InventoryEvent {
    /// The ledger row carried by this event, if any.
    pub fn transaction(&self) -> Option<&StockTransaction> {
        match self {
            InventoryEvent::StockTransactionRecorded(e) => Some(&e.transaction),
            _ => None,
        }
    }
}

impl Event for InventoryEvent {
    fn event_type(&self) -> &'static str {
        match self {
            InventoryEvent::InventoryCreated(_) => "inventory.created",
            InventoryEvent::StockTransactionRecorded(_) => "inventory.stock.recorded",
            InventoryEvent::SettingsUpdated(_) => "inventory.settings.updated",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            InventoryEvent::InventoryCreated(e) => e.occurred_at,
            InventoryEvent::StockTransactionRecorded(e) => e.transaction.transaction_date,
            InventoryEvent::SettingsUpdated(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Inventory {
    type Command = InventoryCommand;
    type Event = InventoryEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            InventoryEvent::InventoryCreated(e) => {
                self.product_id = e.product_id;
                self.record = Some(InventoryRecord {
                    id: e.inventory_id,
                    product_id: e.product_id,
                    stock_quantity: 0,
                    min_stock_level: e.min_stock_level,
                    max_stock_level: e.max_stock_level,
                    reorder_point: e.reorder_point,
                    last_stock_update: e.occurred_at,
                    location_code: e.location_code.clone(),
                });
            }
            InventoryEvent::StockTransactionRecorded(e) => {
                if let Some(record) = self.record.as_mut() {
                    // Over-deductions are absorbed: stock floors at zero.
                    record.stock_quantity = record.stock_quantity.saturating_add(e.delta).max(0);
                    record.last_stock_update = e.transaction.transaction_date;
                }
            }
            InventoryEvent::SettingsUpdated(e) => {
                if let Some(record) = self.record.as_mut() {
                    record.min_stock_level = e.min_stock_level;
                    record.max_stock_level = e.max_stock_level;
                    record.reorder_point = e.reorder_point;
                    record.location_code = e.location_code.clone();
                    record.last_stock_update = e.occurred_at;
                }
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            InventoryCommand::CreateInventory(cmd) => self.handle_create(cmd),
            InventoryCommand::RecordTransaction(cmd) => self.handle_record(cmd),
            InventoryCommand::UpdateStockQuantity(cmd) => self.handle_update_quantity(cmd),
            InventoryCommand::UpdateSettings(cmd) => self.handle_settings(cmd),
        }
    }
}

fn validate_levels(min: i64, max: Option<i64>, reorder_point: i64) -> Result<(), DomainError> {
    if min < 0 {
        return Err(DomainError::validation("minimum stock level cannot be negative"));
    }
    if reorder_point < 0 {
        return Err(DomainError::validation("reorder point cannot be negative"));
    }
    if let Some(max) = max {
        if max < min {
            return Err(DomainError::validation(
                "maximum stock level cannot be below the minimum stock level",
            ));
        }
    }
    Ok(())
}

impl Inventory {
    fn ensure_product_id(&self, product_id: ProductId) -> Result<(), DomainError> {
        if self.product_id != product_id {
            return Err(DomainError::validation("product_id mismatch"));
        }
        Ok(())
    }

    fn ensure_created(&self) -> Result<(), DomainError> {
        if !self.is_created() {
            return Err(DomainError::not_found("inventory"));
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreateInventory) -> Result<Vec<InventoryEvent>, DomainError> {
        if self.is_created() {
            return Err(DomainError::already_exists("inventory"));
        }
        self.ensure_product_id(cmd.product_id)?;
        if cmd.initial_stock_quantity < 0 {
            return Err(DomainError::validation("initial stock quantity cannot be negative"));
        }
        validate_levels(cmd.min_stock_level, cmd.max_stock_level, cmd.reorder_point)?;

        let mut events = vec![InventoryEvent::InventoryCreated(InventoryCreated {
            inventory_id: cmd.inventory_id,
            product_id: cmd.product_id,
            min_stock_level: cmd.min_stock_level,
            max_stock_level: cmd.max_stock_level,
            reorder_point: cmd.reorder_point,
            location_code: cmd.location_code.clone(),
            occurred_at: cmd.occurred_at,
        })];

        if cmd.initial_stock_quantity > 0 {
            events.push(InventoryEvent::StockTransactionRecorded(StockTransactionRecorded {
                transaction: StockTransaction {
                    id: cmd.transaction_id,
                    product_id: cmd.product_id,
                    transaction_type: TransactionType::Received,
                    quantity: cmd.initial_stock_quantity,
                    transaction_date: cmd.occurred_at,
                    notes: Some(INITIAL_SETUP_NOTE.to_string()),
                    reference: None,
                    user_id: cmd.user_id,
                },
                delta: cmd.initial_stock_quantity,
            }));
        }

        Ok(events)
    }

    fn handle_record(&self, cmd: &RecordTransaction) -> Result<Vec<InventoryEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_product_id(cmd.product_id)?;
        let delta = cmd.transaction_type.delta(cmd.quantity)?;

        Ok(vec![InventoryEvent::StockTransactionRecorded(StockTransactionRecorded {
            transaction: StockTransaction {
                id: cmd.transaction_id,
                product_id: cmd.product_id,
                transaction_type: cmd.transaction_type,
                quantity: cmd.quantity,
                transaction_date: cmd.occurred_at,
                notes: cmd.notes.clone(),
                reference: cmd.reference.clone(),
                user_id: cmd.user_id,
            },
            delta,
        })])
    }

    fn handle_update_quantity(
        &self,
        cmd: &UpdateStockQuantity,
    ) -> Result<Vec<InventoryEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_product_id(cmd.product_id)?;

        // Positive deltas read as receipts; everything else, sales included,
        // is logged as an adjustment.
        let transaction_type = if cmd.delta > 0 {
            TransactionType::Received
        } else {
            TransactionType::Adjusted
        };

        Ok(vec![InventoryEvent::StockTransactionRecorded(StockTransactionRecorded {
            transaction: StockTransaction {
                id: cmd.transaction_id,
                product_id: cmd.product_id,
                transaction_type,
                quantity: cmd.delta,
                transaction_date: cmd.occurred_at,
                notes: None,
                reference: None,
                user_id: None,
            },
            delta: cmd.delta,
        })])
    }

    fn handle_settings(&self, cmd: &UpdateSettings) -> Result<Vec<InventoryEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_product_id(cmd.product_id)?;
        validate_levels(cmd.min_stock_level, cmd.max_stock_level, cmd.reorder_point)?;

        Ok(vec![InventoryEvent::SettingsUpdated(SettingsUpdated {
            product_id: cmd.product_id,
            min_stock_level: cmd.min_stock_level,
            max_stock_level: cmd.max_stock_level,
            reorder_point: cmd.reorder_point,
            location_code: cmd.location_code.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }
}

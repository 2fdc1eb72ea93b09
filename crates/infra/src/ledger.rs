//! Inventory ledger service.
//!
//! Every stock change goes through the `Inventory` aggregate:
//!
//! ```text
//! load (record + version) -> handle(command) -> apply(events) -> commit(expected version)
//! ```
//!
//! A commit that loses a race to another writer is retried from a fresh load,
//! so concurrent changes to the same product serialize without lost updates.

use std::sync::Arc;

use mockable::Clock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use freshcart_core::{
    Aggregate, AggregateRoot, DomainError, Event, ExpectedVersion, InventoryId, ProductId,
    StockTransactionId, UserId,
};
use freshcart_inventory::{
    CreateInventory, Inventory, InventoryCommand, InventoryEvent, InventoryRecord,
    RecordTransaction, StockStatus, StockTransaction, TransactionType, UpdateSettings,
    UpdateStockQuantity,
};

use crate::error::{ServiceError, ServiceResult};
use crate::store::{InventoryCommit, InventoryStore, ProductStore, StoreError};

/// Retry budget used when none is configured.
pub const DEFAULT_MAX_CONFLICT_RETRIES: u32 = 32;

/// Input for [`InventoryLedger::create_inventory`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewInventory {
    pub product_id: ProductId,
    pub initial_stock_quantity: i64,
    pub min_stock_level: i64,
    pub max_stock_level: Option<i64>,
    pub reorder_point: i64,
    pub location_code: Option<String>,
}

/// Input for [`InventoryLedger::record_transaction`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewStockTransaction {
    pub product_id: ProductId,
    pub transaction_type: TransactionType,
    pub quantity: i64,
    pub notes: Option<String>,
    pub reference: Option<String>,
    pub user_id: Option<UserId>,
}

/// Threshold settings for [`InventoryLedger::update_settings`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventorySettings {
    pub min_stock_level: i64,
    pub max_stock_level: Option<i64>,
    pub reorder_point: i64,
    pub location_code: Option<String>,
}

/// An inventory row with its derived status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryView {
    #[serde(flatten)]
    pub record: InventoryRecord,
    pub status: StockStatus,
}

impl From<InventoryRecord> for InventoryView {
    fn from(record: InventoryRecord) -> Self {
        let status = record.status();
        Self { record, status }
    }
}

/// Result of a stock change: the row after the change and the ledger entry
/// that explains it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockChange {
    pub inventory: InventoryView,
    pub transaction: StockTransaction,
}

pub struct InventoryLedger<S> {
    store: S,
    clock: Arc<dyn Clock + Send + Sync>,
    max_conflict_retries: u32,
}

impl<S> InventoryLedger<S> {
    pub fn new(store: S, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        Self {
            store,
            clock,
            max_conflict_retries: DEFAULT_MAX_CONFLICT_RETRIES,
        }
    }

    pub fn with_max_conflict_retries(mut self, retries: u32) -> Self {
        self.max_conflict_retries = retries;
        self
    }
}

fn decided(inventory: &mut Inventory, command: &InventoryCommand) -> ServiceResult<Vec<InventoryEvent>> {
    let events = inventory.handle(command)?;
    for event in &events {
        inventory.apply(event);
    }
    Ok(events)
}

fn transactions_of(events: &[InventoryEvent]) -> Vec<StockTransaction> {
    events
        .iter()
        .filter_map(InventoryEvent::transaction)
        .cloned()
        .collect()
}

fn event_types(events: &[InventoryEvent]) -> Vec<&'static str> {
    events.iter().map(Event::event_type).collect()
}

fn trace_events(events: &[InventoryEvent]) {
    for event in events {
        debug!(
            event_type = event.event_type(),
            schema_version = event.version(),
            occurred_at = %event.occurred_at(),
            "inventory event committed"
        );
    }
}

impl<S: InventoryStore + ProductStore> InventoryLedger<S> {
    /// Set up inventory for a product, recording any initial stock as a
    /// `received` transaction in the same write.
    #[instrument(skip(self, input), fields(product_id = %input.product_id), err)]
    pub fn create_inventory(&self, input: NewInventory) -> ServiceResult<InventoryView> {
        if self.store.get_product(input.product_id)?.is_none() {
            return Err(DomainError::not_found("product").into());
        }

        let mut inventory = self
            .store
            .get_inventory(input.product_id)?
            .unwrap_or_else(|| Inventory::empty(input.product_id));

        let command = InventoryCommand::CreateInventory(CreateInventory {
            inventory_id: InventoryId::new(),
            product_id: input.product_id,
            initial_stock_quantity: input.initial_stock_quantity,
            min_stock_level: input.min_stock_level,
            max_stock_level: input.max_stock_level,
            reorder_point: input.reorder_point,
            location_code: input.location_code,
            transaction_id: StockTransactionId::new(),
            user_id: None,
            occurred_at: self.clock.utc(),
        });
        let events = decided(&mut inventory, &command)?;
        let transactions = transactions_of(&events);

        let record = inventory
            .record()
            .ok_or_else(|| ServiceError::Store(StoreError::Backend("inventory not created".into())))?;

        self.store
            .create_inventory(InventoryCommit {
                record,
                version: inventory.version(),
                transactions: &transactions,
            })
            .map_err(|e| match e {
                StoreError::Duplicate(_) => ServiceError::AlreadyExists("inventory"),
                other => other.into(),
            })?;

        trace_events(&events);
        info!(
            stock_quantity = record.stock_quantity,
            reorder_point = record.reorder_point,
            events = ?event_types(&events),
            "inventory created"
        );
        Ok(record.clone().into())
    }

    /// Append a typed stock movement and apply it (clamped at zero).
    #[instrument(
        skip(self, input),
        fields(
            product_id = %input.product_id,
            transaction_type = %input.transaction_type,
            quantity = input.quantity
        ),
        err
    )]
    pub fn record_transaction(&self, input: NewStockTransaction) -> ServiceResult<StockChange> {
        let transaction_id = StockTransactionId::new();
        self.execute(input.product_id, |now| {
            InventoryCommand::RecordTransaction(RecordTransaction {
                transaction_id,
                product_id: input.product_id,
                transaction_type: input.transaction_type,
                quantity: input.quantity,
                notes: input.notes.clone(),
                reference: input.reference.clone(),
                user_id: input.user_id,
                occurred_at: now,
            })
        })
        .and_then(Self::into_stock_change)
    }

    /// Apply a raw delta. The ledger entry is `received` for a positive delta
    /// and `adjusted` otherwise.
    #[instrument(skip(self), fields(product_id = %product_id), err)]
    pub fn update_stock_quantity(
        &self,
        product_id: ProductId,
        delta: i64,
    ) -> ServiceResult<StockChange> {
        let transaction_id = StockTransactionId::new();
        self.execute(product_id, |now| {
            InventoryCommand::UpdateStockQuantity(UpdateStockQuantity {
                transaction_id,
                product_id,
                delta,
                occurred_at: now,
            })
        })
        .and_then(Self::into_stock_change)
    }

    /// Change thresholds and location. Appends no ledger entry.
    #[instrument(skip(self, settings), fields(product_id = %product_id), err)]
    pub fn update_settings(
        &self,
        product_id: ProductId,
        settings: InventorySettings,
    ) -> ServiceResult<InventoryView> {
        let (record, _) = self.execute(product_id, |now| {
            InventoryCommand::UpdateSettings(UpdateSettings {
                product_id,
                min_stock_level: settings.min_stock_level,
                max_stock_level: settings.max_stock_level,
                reorder_point: settings.reorder_point,
                location_code: settings.location_code.clone(),
                occurred_at: now,
            })
        })?;
        Ok(record.into())
    }

    pub fn inventory(&self, product_id: ProductId) -> ServiceResult<InventoryView> {
        self.store
            .get_inventory(product_id)?
            .and_then(Inventory::into_record)
            .map(InventoryView::from)
            .ok_or_else(|| DomainError::not_found("inventory").into())
    }

    /// Ledger history for a product, newest first.
    pub fn transactions(&self, product_id: ProductId) -> ServiceResult<Vec<StockTransaction>> {
        Ok(self.store.list_transactions(product_id)?)
    }

    /// Every inventory that is low or out of stock, emptiest first.
    pub fn low_stock_report(&self) -> ServiceResult<Vec<InventoryView>> {
        let mut report: Vec<InventoryView> = self
            .store
            .list_inventories()?
            .into_iter()
            .map(InventoryView::from)
            .filter(|v| v.status.needs_attention())
            .collect();
        report.sort_by_key(|v| (v.record.stock_quantity, *v.record.product_id.as_uuid()));
        Ok(report)
    }

    /// Load, decide, apply and commit one command, retrying from a fresh load
    /// when another writer commits first.
    fn execute(
        &self,
        product_id: ProductId,
        make_command: impl Fn(chrono::DateTime<chrono::Utc>) -> InventoryCommand,
    ) -> ServiceResult<(InventoryRecord, Vec<InventoryEvent>)> {
        let mut attempt = 0u32;
        loop {
            let mut inventory = self
                .store
                .get_inventory(product_id)?
                .unwrap_or_else(|| Inventory::empty(product_id));
            let expected = ExpectedVersion(inventory.version());

            let command = make_command(self.clock.utc());
            let events = decided(&mut inventory, &command)?;
            let transactions = transactions_of(&events);
            let version = inventory.version();
            let Some(record) = inventory.into_record() else {
                return Err(DomainError::not_found("inventory").into());
            };

            let commit = InventoryCommit {
                record: &record,
                version,
                transactions: &transactions,
            };

            match self.store.commit_stock_change(commit, expected) {
                Ok(()) => {
                    trace_events(&events);
                    info!(
                        stock_quantity = record.stock_quantity,
                        status = %record.status(),
                        events = ?event_types(&events),
                        "inventory updated"
                    );
                    return Ok((record, events));
                }
                Err(StoreError::Concurrency(msg)) if attempt < self.max_conflict_retries => {
                    attempt += 1;
                    warn!(attempt, reason = %msg, "inventory changed concurrently; retrying");
                }
                Err(StoreError::Concurrency(msg)) => {
                    return Err(ServiceError::Conflict(format!(
                        "gave up after {attempt} retries: {msg}"
                    )));
                }
                Err(other) => return Err(other.into()),
            }
        }
    }

    fn into_stock_change(
        (record, events): (InventoryRecord, Vec<InventoryEvent>),
    ) -> ServiceResult<StockChange> {
        let transaction = events
            .iter()
            .find_map(InventoryEvent::transaction)
            .cloned()
            .ok_or_else(|| ServiceError::Store(StoreError::Backend("no ledger entry produced".into())))?;
        Ok(StockChange {
            inventory: record.into(),
            transaction,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    use rstest::{fixture, rstest};
    use rust_decimal_macros::dec;

    use freshcart_inventory::INITIAL_SETUP_NOTE;
    use freshcart_products::Product;

    use crate::store::InMemoryStore;
    use crate::test_support::{clock, seed_product};

    /// Store that reports a concurrency conflict for the first `failures` commits.
    struct ContendedStore {
        inner: InMemoryStore,
        failures: AtomicU32,
    }

    impl ProductStore for ContendedStore {
        fn get_product(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
            self.inner.get_product(id)
        }

        fn insert_product(&self, product: &Product) -> Result<(), StoreError> {
            self.inner.insert_product(product)
        }

        fn list_products(&self) -> Result<Vec<Product>, StoreError> {
            self.inner.list_products()
        }
    }

    impl InventoryStore for ContendedStore {
        fn get_inventory(&self, product_id: ProductId) -> Result<Option<Inventory>, StoreError> {
            self.inner.get_inventory(product_id)
        }

        fn create_inventory(&self, commit: InventoryCommit<'_>) -> Result<(), StoreError> {
            self.inner.create_inventory(commit)
        }

        fn commit_stock_change(
            &self,
            commit: InventoryCommit<'_>,
            expected: ExpectedVersion,
        ) -> Result<(), StoreError> {
            let remaining = self.failures.load(Ordering::SeqCst);
            if remaining > 0 {
                self.failures.store(remaining - 1, Ordering::SeqCst);
                return Err(StoreError::Concurrency("simulated writer".to_string()));
            }
            self.inner.commit_stock_change(commit, expected)
        }

        fn list_transactions(
            &self,
            product_id: ProductId,
        ) -> Result<Vec<StockTransaction>, StoreError> {
            self.inner.list_transactions(product_id)
        }

        fn list_inventories(&self) -> Result<Vec<InventoryRecord>, StoreError> {
            self.inner.list_inventories()
        }
    }

    #[fixture]
    fn store() -> Arc<InMemoryStore> {
        Arc::new(InMemoryStore::new())
    }

    fn new_inventory(product_id: ProductId, initial: i64, reorder_point: i64) -> NewInventory {
        NewInventory {
            product_id,
            initial_stock_quantity: initial,
            min_stock_level: 0,
            max_stock_level: None,
            reorder_point,
            location_code: Some("B2".to_string()),
        }
    }

    fn movement(product_id: ProductId, t: TransactionType, quantity: i64) -> NewStockTransaction {
        NewStockTransaction {
            product_id,
            transaction_type: t,
            quantity,
            notes: None,
            reference: None,
            user_id: None,
        }
    }

    #[test]
    fn committed_events_are_named_for_logging() {
        let product = ProductId::new();
        let mut inventory = Inventory::empty(product);
        let command = InventoryCommand::CreateInventory(CreateInventory {
            inventory_id: InventoryId::new(),
            product_id: product,
            initial_stock_quantity: 4,
            min_stock_level: 0,
            max_stock_level: None,
            reorder_point: 1,
            location_code: None,
            transaction_id: StockTransactionId::new(),
            user_id: None,
            occurred_at: crate::test_support::fixed_now(),
        });

        let events = decided(&mut inventory, &command).unwrap();
        assert_eq!(
            event_types(&events),
            vec!["inventory.created", "inventory.stock.recorded"]
        );
        assert!(events.iter().all(|e| e.occurred_at() == crate::test_support::fixed_now()));
    }

    #[rstest]
    fn create_records_initial_stock_as_received(store: Arc<InMemoryStore>) {
        let product = seed_product(&store, "Honey", dec!(6.00), None);
        let ledger = InventoryLedger::new(store.clone(), clock());

        let view = ledger.create_inventory(new_inventory(product, 12, 3)).unwrap();
        assert_eq!(view.record.stock_quantity, 12);
        assert_eq!(view.status, StockStatus::InStock);

        let history = ledger.transactions(product).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].transaction_type, TransactionType::Received);
        assert_eq!(history[0].quantity, 12);
        assert_eq!(history[0].notes.as_deref(), Some(INITIAL_SETUP_NOTE));
        assert!(store.get_product(product).unwrap().unwrap().in_stock());
    }

    #[rstest]
    fn create_with_zero_stock_logs_nothing(store: Arc<InMemoryStore>) {
        let product = seed_product(&store, "Saffron", dec!(15.00), None);
        let ledger = InventoryLedger::new(store.clone(), clock());

        let view = ledger.create_inventory(new_inventory(product, 0, 1)).unwrap();
        assert_eq!(view.status, StockStatus::OutOfStock);
        assert!(ledger.transactions(product).unwrap().is_empty());
        assert!(!store.get_product(product).unwrap().unwrap().in_stock());
    }

    #[rstest]
    fn create_for_unknown_product_is_not_found(store: Arc<InMemoryStore>) {
        let ledger = InventoryLedger::new(store, clock());
        let err = ledger
            .create_inventory(new_inventory(ProductId::new(), 1, 1))
            .unwrap_err();
        assert_eq!(err, ServiceError::NotFound("product"));
    }

    #[rstest]
    fn invalid_levels_are_rejected_before_any_write(store: Arc<InMemoryStore>) {
        let product = seed_product(&store, "Salt", dec!(0.99), None);
        let ledger = InventoryLedger::new(store.clone(), clock());

        let mut input = new_inventory(product, 5, 1);
        input.min_stock_level = 10;
        input.max_stock_level = Some(2);
        assert!(matches!(
            ledger.create_inventory(input),
            Err(ServiceError::InvalidInput(_))
        ));
        assert_eq!(ledger.inventory(product).unwrap_err(), ServiceError::NotFound("inventory"));
    }

    #[rstest]
    fn negative_sale_is_invalid_and_changes_nothing(store: Arc<InMemoryStore>) {
        let product = seed_product(&store, "Tea", dec!(3.00), None);
        let ledger = InventoryLedger::new(store, clock());
        ledger.create_inventory(new_inventory(product, 5, 1)).unwrap();

        let err = ledger
            .record_transaction(movement(product, TransactionType::Sold, -2))
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
        assert_eq!(ledger.inventory(product).unwrap().record.stock_quantity, 5);
        assert_eq!(ledger.transactions(product).unwrap().len(), 1);
    }

    #[rstest]
    fn movement_without_inventory_is_not_found(store: Arc<InMemoryStore>) {
        let product = seed_product(&store, "Jam", dec!(3.00), None);
        let ledger = InventoryLedger::new(store, clock());
        let err = ledger.update_stock_quantity(product, 4).unwrap_err();
        assert_eq!(err, ServiceError::NotFound("inventory"));
    }

    #[rstest]
    fn settings_change_status_without_logging(store: Arc<InMemoryStore>) {
        let product = seed_product(&store, "Pasta", dec!(1.80), None);
        let ledger = InventoryLedger::new(store, clock());
        ledger.create_inventory(new_inventory(product, 8, 2)).unwrap();

        let view = ledger
            .update_settings(
                product,
                InventorySettings {
                    min_stock_level: 4,
                    max_stock_level: Some(40),
                    reorder_point: 10,
                    location_code: Some("C7".to_string()),
                },
            )
            .unwrap();

        assert_eq!(view.status, StockStatus::LowStock);
        assert_eq!(view.record.location_code.as_deref(), Some("C7"));
        assert_eq!(ledger.transactions(product).unwrap().len(), 1);
    }

    #[rstest]
    fn low_stock_report_lists_emptiest_first(store: Arc<InMemoryStore>) {
        let ledger = InventoryLedger::new(store.clone(), clock());
        let plenty = seed_product(&store, "Potatoes", dec!(2.00), None);
        let low = seed_product(&store, "Leeks", dec!(1.50), None);
        let out = seed_product(&store, "Figs", dec!(4.00), None);
        ledger.create_inventory(new_inventory(plenty, 50, 10)).unwrap();
        ledger.create_inventory(new_inventory(low, 4, 10)).unwrap();
        ledger.create_inventory(new_inventory(out, 0, 10)).unwrap();

        let report = ledger.low_stock_report().unwrap();
        let ids: Vec<ProductId> = report.iter().map(|v| v.record.product_id).collect();
        assert_eq!(ids, vec![out, low]);
        assert_eq!(report[0].status, StockStatus::OutOfStock);
        assert_eq!(report[1].status, StockStatus::LowStock);
    }

    #[rstest]
    fn inventory_view_serializes_flat_with_status_label(store: Arc<InMemoryStore>) {
        let product = seed_product(&store, "Kale", dec!(2.40), None);
        let ledger = InventoryLedger::new(store, clock());
        let view = ledger.create_inventory(new_inventory(product, 3, 5)).unwrap();

        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["stockQuantity"], 3);
        assert_eq!(json["reorderPoint"], 5);
        assert_eq!(json["locationCode"], "B2");
        assert_eq!(json["status"], "Low Stock");
    }

    #[test]
    fn conflicts_are_retried_until_commit_succeeds() {
        let store = Arc::new(ContendedStore {
            inner: InMemoryStore::new(),
            failures: AtomicU32::new(0),
        });
        let product = seed_product(&store.inner, "Butter", dec!(2.50), None);
        let ledger = InventoryLedger::new(store.clone(), clock()).with_max_conflict_retries(3);
        ledger.create_inventory(new_inventory(product, 10, 2)).unwrap();

        store.failures.store(3, Ordering::SeqCst);
        let change = ledger.update_stock_quantity(product, -4).unwrap();
        assert_eq!(change.inventory.record.stock_quantity, 6);
        assert_eq!(ledger.transactions(product).unwrap().len(), 2);
    }

    #[test]
    fn exhausted_retry_budget_is_a_conflict() {
        let store = Arc::new(ContendedStore {
            inner: InMemoryStore::new(),
            failures: AtomicU32::new(0),
        });
        let product = seed_product(&store.inner, "Cheese", dec!(7.00), None);
        let ledger = InventoryLedger::new(store.clone(), clock()).with_max_conflict_retries(2);
        ledger.create_inventory(new_inventory(product, 10, 2)).unwrap();

        store.failures.store(3, Ordering::SeqCst);
        let err = ledger.update_stock_quantity(product, 1).unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
        assert_eq!(ledger.inventory(product).unwrap().record.stock_quantity, 10);
    }
}

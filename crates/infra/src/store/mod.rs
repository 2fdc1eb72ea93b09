//! Storage boundary for the pricing and inventory services.
//!
//! The traits are synchronous and object-safe so services can hold any backend
//! behind a generic parameter. Reads return `Option` for missing rows; the
//! services decide what a missing row means.
//!
//! Backends:
//! - [`InMemoryStore`]: one `RwLock` around all tables, for tests and dev.
//! - [`PostgresStore`]: sqlx/Postgres, see `migrations/0001_init.sql`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;

use freshcart_core::{
    AssignmentId, CustomerPricingId, ExpectedVersion, PricingTierId, ProductId, UserId,
};
use freshcart_inventory::{Inventory, InventoryRecord, StockTransaction};
use freshcart_pricing::{CustomerPricing, PricingTier, TierPricing, UserPricingTierAssignment};
use freshcart_products::Product;

pub mod in_memory;
pub mod postgres;

pub use in_memory::InMemoryStore;
pub use postgres::PostgresStore;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write.
    #[error("duplicate: {0}")]
    Duplicate(String),

    /// The row changed since it was read (optimistic concurrency).
    #[error("concurrency conflict: {0}")]
    Concurrency(String),

    /// Anything else the backend reported.
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Everything needed to price one product for one user, read at one instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricingSnapshot {
    pub product: Product,
    /// One entry per assignment of the user that is effective at the read time.
    pub tiers: Vec<TierPricing>,
}

/// A ledger write: the new inventory row, its new version, and the rows
/// appended to the transaction log. Stores apply it atomically together with
/// the product's in-stock flag.
#[derive(Debug, Clone, Copy)]
pub struct InventoryCommit<'a> {
    pub record: &'a InventoryRecord,
    pub version: u64,
    pub transactions: &'a [StockTransaction],
}

pub trait ProductStore: Send + Sync {
    fn get_product(&self, id: ProductId) -> Result<Option<Product>, StoreError>;

    /// Fails with `Duplicate` if the id is taken.
    fn insert_product(&self, product: &Product) -> Result<(), StoreError>;

    fn list_products(&self) -> Result<Vec<Product>, StoreError>;
}

pub trait PricingStore: Send + Sync {
    /// Fails with `Duplicate` if a tier with the same name exists.
    fn insert_tier(&self, tier: &PricingTier) -> Result<(), StoreError>;
    fn update_tier(&self, tier: &PricingTier) -> Result<(), StoreError>;
    fn get_tier(&self, id: PricingTierId) -> Result<Option<PricingTier>, StoreError>;
    fn list_tiers(&self) -> Result<Vec<PricingTier>, StoreError>;

    fn insert_assignment(&self, assignment: &UserPricingTierAssignment) -> Result<(), StoreError>;
    fn update_assignment(&self, assignment: &UserPricingTierAssignment) -> Result<(), StoreError>;
    fn get_assignment(
        &self,
        id: AssignmentId,
    ) -> Result<Option<UserPricingTierAssignment>, StoreError>;
    /// Every assignment of the user, active or not, oldest start date first.
    fn assignments_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<UserPricingTierAssignment>, StoreError>;

    /// Fails with `Duplicate` if the (product, tier) pair already has an override.
    fn insert_customer_pricing(&self, pricing: &CustomerPricing) -> Result<(), StoreError>;
    fn update_customer_pricing(&self, pricing: &CustomerPricing) -> Result<(), StoreError>;
    fn get_customer_pricing(
        &self,
        id: CustomerPricingId,
    ) -> Result<Option<CustomerPricing>, StoreError>;
    fn customer_pricing_for(
        &self,
        product_id: ProductId,
        tier_id: PricingTierId,
    ) -> Result<Option<CustomerPricing>, StoreError>;

    /// Read the product and the user's effective tiers (with their override
    /// for the product) from one consistent view of storage.
    ///
    /// Returns `None` when the product does not exist.
    fn pricing_snapshot(
        &self,
        user_id: UserId,
        product_id: ProductId,
        now: DateTime<Utc>,
    ) -> Result<Option<PricingSnapshot>, StoreError>;
}

pub trait InventoryStore: Send + Sync {
    /// Load the inventory aggregate for a product at its stored version.
    fn get_inventory(&self, product_id: ProductId) -> Result<Option<Inventory>, StoreError>;

    /// Insert a new inventory row. Fails with `Duplicate` if the product
    /// already has one.
    fn create_inventory(&self, commit: InventoryCommit<'_>) -> Result<(), StoreError>;

    /// Persist a change decided against `expected`. Fails with `Concurrency`
    /// if the stored version moved on in between.
    fn commit_stock_change(
        &self,
        commit: InventoryCommit<'_>,
        expected: ExpectedVersion,
    ) -> Result<(), StoreError>;

    /// Transaction history for a product, newest first.
    fn list_transactions(
        &self,
        product_id: ProductId,
    ) -> Result<Vec<StockTransaction>, StoreError>;

    fn list_inventories(&self) -> Result<Vec<InventoryRecord>, StoreError>;
}

impl<S: ProductStore + ?Sized> ProductStore for Arc<S> {
    fn get_product(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        (**self).get_product(id)
    }

    fn insert_product(&self, product: &Product) -> Result<(), StoreError> {
        (**self).insert_product(product)
    }

    fn list_products(&self) -> Result<Vec<Product>, StoreError> {
        (**self).list_products()
    }
}

impl<S: PricingStore + ?Sized> PricingStore for Arc<S> {
    fn insert_tier(&self, tier: &PricingTier) -> Result<(), StoreError> {
        (**self).insert_tier(tier)
    }

    fn update_tier(&self, tier: &PricingTier) -> Result<(), StoreError> {
        (**self).update_tier(tier)
    }

    fn get_tier(&self, id: PricingTierId) -> Result<Option<PricingTier>, StoreError> {
        (**self).get_tier(id)
    }

    fn list_tiers(&self) -> Result<Vec<PricingTier>, StoreError> {
        (**self).list_tiers()
    }

    fn insert_assignment(&self, assignment: &UserPricingTierAssignment) -> Result<(), StoreError> {
        (**self).insert_assignment(assignment)
    }

    fn update_assignment(&self, assignment: &UserPricingTierAssignment) -> Result<(), StoreError> {
        (**self).update_assignment(assignment)
    }

    fn get_assignment(
        &self,
        id: AssignmentId,
    ) -> Result<Option<UserPricingTierAssignment>, StoreError> {
        (**self).get_assignment(id)
    }

    fn assignments_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<UserPricingTierAssignment>, StoreError> {
        (**self).assignments_for_user(user_id)
    }

    fn insert_customer_pricing(&self, pricing: &CustomerPricing) -> Result<(), StoreError> {
        (**self).insert_customer_pricing(pricing)
    }

    fn update_customer_pricing(&self, pricing: &CustomerPricing) -> Result<(), StoreError> {
        (**self).update_customer_pricing(pricing)
    }

    fn get_customer_pricing(
        &self,
        id: CustomerPricingId,
    ) -> Result<Option<CustomerPricing>, StoreError> {
        (**self).get_customer_pricing(id)
    }

    fn customer_pricing_for(
        &self,
        product_id: ProductId,
        tier_id: PricingTierId,
    ) -> Result<Option<CustomerPricing>, StoreError> {
        (**self).customer_pricing_for(product_id, tier_id)
    }

    fn pricing_snapshot(
        &self,
        user_id: UserId,
        product_id: ProductId,
        now: DateTime<Utc>,
    ) -> Result<Option<PricingSnapshot>, StoreError> {
        (**self).pricing_snapshot(user_id, product_id, now)
    }
}

impl<S: InventoryStore + ?Sized> InventoryStore for Arc<S> {
    fn get_inventory(&self, product_id: ProductId) -> Result<Option<Inventory>, StoreError> {
        (**self).get_inventory(product_id)
    }

    fn create_inventory(&self, commit: InventoryCommit<'_>) -> Result<(), StoreError> {
        (**self).create_inventory(commit)
    }

    fn commit_stock_change(
        &self,
        commit: InventoryCommit<'_>,
        expected: ExpectedVersion,
    ) -> Result<(), StoreError> {
        (**self).commit_stock_change(commit, expected)
    }

    fn list_transactions(
        &self,
        product_id: ProductId,
    ) -> Result<Vec<StockTransaction>, StoreError> {
        (**self).list_transactions(product_id)
    }

    fn list_inventories(&self) -> Result<Vec<InventoryRecord>, StoreError> {
        (**self).list_inventories()
    }
}

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};

use freshcart_core::{
    AssignmentId, CustomerPricingId, ExpectedVersion, PricingTierId, ProductId, UserId,
};
use freshcart_inventory::{Inventory, InventoryRecord, StockTransaction};
use freshcart_pricing::{CustomerPricing, PricingTier, TierPricing, UserPricingTierAssignment};
use freshcart_products::Product;

use super::{
    InventoryCommit, InventoryStore, PricingSnapshot, PricingStore, ProductStore, StoreError,
};

#[derive(Debug, Default)]
struct Tables {
    products: HashMap<ProductId, Product>,
    tiers: HashMap<PricingTierId, PricingTier>,
    assignments: HashMap<AssignmentId, UserPricingTierAssignment>,
    customer_pricing: HashMap<CustomerPricingId, CustomerPricing>,
    inventories: HashMap<ProductId, (InventoryRecord, u64)>,
    /// Per product, in append order.
    transactions: HashMap<ProductId, Vec<StockTransaction>>,
}

impl Tables {
    fn override_for(&self, product_id: ProductId, tier_id: PricingTierId) -> Option<&CustomerPricing> {
        self.customer_pricing
            .values()
            .find(|cp| cp.product_id == product_id && cp.pricing_tier_id == tier_id)
    }

    fn user_assignments(&self, user_id: UserId) -> Vec<UserPricingTierAssignment> {
        let mut out: Vec<_> = self
            .assignments
            .values()
            .filter(|a| a.user_id == user_id)
            .cloned()
            .collect();
        out.sort_by_key(|a| (a.start_date, *a.id.as_uuid()));
        out
    }

    fn apply_commit(&mut self, commit: InventoryCommit<'_>) {
        let product_id = commit.record.product_id;
        self.inventories
            .insert(product_id, (commit.record.clone(), commit.version));
        self.transactions
            .entry(product_id)
            .or_default()
            .extend(commit.transactions.iter().cloned());
        if let Some(product) = self.products.get_mut(&product_id) {
            product.set_in_stock(commit.record.in_stock());
        }
    }
}

/// In-memory store for every table the services use.
///
/// Intended for tests/dev. A single lock guards all tables, so a read sees one
/// consistent state and a ledger commit updates inventory, transactions and
/// the product flag together.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>, StoreError> {
        self.tables
            .read()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>, StoreError> {
        self.tables
            .write()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))
    }
}

impl ProductStore for InMemoryStore {
    fn get_product(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        Ok(self.read()?.products.get(&id).cloned())
    }

    fn insert_product(&self, product: &Product) -> Result<(), StoreError> {
        let mut tables = self.write()?;
        if tables.products.contains_key(&product.id()) {
            return Err(StoreError::Duplicate(format!("product {}", product.id())));
        }
        tables.products.insert(product.id(), product.clone());
        Ok(())
    }

    fn list_products(&self) -> Result<Vec<Product>, StoreError> {
        let mut out: Vec<_> = self.read()?.products.values().cloned().collect();
        out.sort_by(|a, b| a.name().cmp(b.name()));
        Ok(out)
    }
}

impl PricingStore for InMemoryStore {
    fn insert_tier(&self, tier: &PricingTier) -> Result<(), StoreError> {
        let mut tables = self.write()?;
        if tables.tiers.values().any(|t| t.name == tier.name) {
            return Err(StoreError::Duplicate(format!("pricing tier name '{}'", tier.name)));
        }
        tables.tiers.insert(tier.id, tier.clone());
        Ok(())
    }

    fn update_tier(&self, tier: &PricingTier) -> Result<(), StoreError> {
        let mut tables = self.write()?;
        match tables.tiers.get_mut(&tier.id) {
            Some(existing) => {
                *existing = tier.clone();
                Ok(())
            }
            None => Err(StoreError::Backend(format!("pricing tier {} vanished", tier.id))),
        }
    }

    fn get_tier(&self, id: PricingTierId) -> Result<Option<PricingTier>, StoreError> {
        Ok(self.read()?.tiers.get(&id).cloned())
    }

    fn list_tiers(&self) -> Result<Vec<PricingTier>, StoreError> {
        let mut out: Vec<_> = self.read()?.tiers.values().cloned().collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(out)
    }

    fn insert_assignment(&self, assignment: &UserPricingTierAssignment) -> Result<(), StoreError> {
        let mut tables = self.write()?;
        if tables.assignments.contains_key(&assignment.id) {
            return Err(StoreError::Duplicate(format!("assignment {}", assignment.id)));
        }
        tables.assignments.insert(assignment.id, assignment.clone());
        Ok(())
    }

    fn update_assignment(&self, assignment: &UserPricingTierAssignment) -> Result<(), StoreError> {
        let mut tables = self.write()?;
        match tables.assignments.get_mut(&assignment.id) {
            Some(existing) => {
                *existing = assignment.clone();
                Ok(())
            }
            None => Err(StoreError::Backend(format!("assignment {} vanished", assignment.id))),
        }
    }

    fn get_assignment(
        &self,
        id: AssignmentId,
    ) -> Result<Option<UserPricingTierAssignment>, StoreError> {
        Ok(self.read()?.assignments.get(&id).cloned())
    }

    fn assignments_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<UserPricingTierAssignment>, StoreError> {
        Ok(self.read()?.user_assignments(user_id))
    }

    fn insert_customer_pricing(&self, pricing: &CustomerPricing) -> Result<(), StoreError> {
        let mut tables = self.write()?;
        if tables
            .override_for(pricing.product_id, pricing.pricing_tier_id)
            .is_some()
        {
            return Err(StoreError::Duplicate(format!(
                "override for product {} in tier {}",
                pricing.product_id, pricing.pricing_tier_id
            )));
        }
        tables.customer_pricing.insert(pricing.id, pricing.clone());
        Ok(())
    }

    fn update_customer_pricing(&self, pricing: &CustomerPricing) -> Result<(), StoreError> {
        let mut tables = self.write()?;
        match tables.customer_pricing.get_mut(&pricing.id) {
            Some(existing) => {
                *existing = pricing.clone();
                Ok(())
            }
            None => Err(StoreError::Backend(format!("override {} vanished", pricing.id))),
        }
    }

    fn get_customer_pricing(
        &self,
        id: CustomerPricingId,
    ) -> Result<Option<CustomerPricing>, StoreError> {
        Ok(self.read()?.customer_pricing.get(&id).cloned())
    }

    fn customer_pricing_for(
        &self,
        product_id: ProductId,
        tier_id: PricingTierId,
    ) -> Result<Option<CustomerPricing>, StoreError> {
        Ok(self.read()?.override_for(product_id, tier_id).cloned())
    }

    fn pricing_snapshot(
        &self,
        user_id: UserId,
        product_id: ProductId,
        now: DateTime<Utc>,
    ) -> Result<Option<PricingSnapshot>, StoreError> {
        let tables = self.read()?;

        let Some(product) = tables.products.get(&product_id).cloned() else {
            return Ok(None);
        };

        let tiers = tables
            .user_assignments(user_id)
            .into_iter()
            .filter(|a| a.is_effective(now))
            .filter_map(|assignment| {
                let tier = tables.tiers.get(&assignment.pricing_tier_id)?.clone();
                let customer_price = tables.override_for(product_id, tier.id).cloned();
                Some(TierPricing {
                    assignment,
                    tier,
                    customer_price,
                })
            })
            .collect();

        Ok(Some(PricingSnapshot { product, tiers }))
    }
}

impl InventoryStore for InMemoryStore {
    fn get_inventory(&self, product_id: ProductId) -> Result<Option<Inventory>, StoreError> {
        Ok(self
            .read()?
            .inventories
            .get(&product_id)
            .map(|(record, version)| Inventory::restore(record.clone(), *version)))
    }

    fn create_inventory(&self, commit: InventoryCommit<'_>) -> Result<(), StoreError> {
        let mut tables = self.write()?;
        if tables.inventories.contains_key(&commit.record.product_id) {
            return Err(StoreError::Duplicate(format!(
                "inventory for product {}",
                commit.record.product_id
            )));
        }
        tables.apply_commit(commit);
        Ok(())
    }

    fn commit_stock_change(
        &self,
        commit: InventoryCommit<'_>,
        expected: ExpectedVersion,
    ) -> Result<(), StoreError> {
        let mut tables = self.write()?;
        let current = tables
            .inventories
            .get(&commit.record.product_id)
            .map(|(_, version)| *version)
            .ok_or_else(|| {
                StoreError::Concurrency(format!(
                    "inventory for product {} disappeared",
                    commit.record.product_id
                ))
            })?;

        expected
            .check(current)
            .map_err(|e| StoreError::Concurrency(e.to_string()))?;

        tables.apply_commit(commit);
        Ok(())
    }

    fn list_transactions(
        &self,
        product_id: ProductId,
    ) -> Result<Vec<StockTransaction>, StoreError> {
        let tables = self.read()?;
        Ok(tables
            .transactions
            .get(&product_id)
            .map(|txs| txs.iter().rev().cloned().collect())
            .unwrap_or_default())
    }

    fn list_inventories(&self) -> Result<Vec<InventoryRecord>, StoreError> {
        Ok(self
            .read()?
            .inventories
            .values()
            .map(|(record, _)| record.clone())
            .collect())
    }
}

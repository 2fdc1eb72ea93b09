//! Pricing services: the read-only resolver and the admin-side writes it reads.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use mockable::Clock;
use rust_decimal::Decimal;
use tracing::{debug, info, instrument};

use freshcart_core::{AssignmentId, CustomerPricingId, DomainError, PricingTierId, ProductId, UserId};
use freshcart_pricing::{
    CustomerPricing, NewAssignment, NewCustomerPricing, NewPricingTier, PriceQuote, PricingTier,
    UserPricingTierAssignment, quote,
};

use crate::error::{ServiceError, ServiceResult};
use crate::store::{PricingStore, ProductStore, StoreError};

/// Resolves the price a user pays for a product.
///
/// Stateless apart from its collaborators: every call reads current storage.
pub struct PricingResolver<S> {
    store: S,
    clock: Arc<dyn Clock + Send + Sync>,
}

impl<S> PricingResolver<S> {
    pub fn new(store: S, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        Self { store, clock }
    }
}

impl<S: PricingStore> PricingResolver<S> {
    /// Best price for `product_id` with the source that produced it.
    #[instrument(skip(self), fields(user_id = %user_id, product_id = %product_id), err)]
    pub fn quote_price(&self, user_id: UserId, product_id: ProductId) -> ServiceResult<PriceQuote> {
        let now = self.clock.utc();
        let snapshot = self
            .store
            .pricing_snapshot(user_id, product_id, now)?
            .ok_or(DomainError::not_found("product"))?;

        let q = quote(snapshot.product.baseline_price(), &snapshot.tiers, now);
        debug!(
            baseline = %q.baseline,
            price = %q.price,
            candidates = snapshot.tiers.len(),
            "resolved price"
        );
        Ok(q)
    }

    pub fn resolve_price(&self, user_id: UserId, product_id: ProductId) -> ServiceResult<Decimal> {
        Ok(self.quote_price(user_id, product_id)?.price)
    }

    /// Resolve several products for one user (a cart or a listing page).
    ///
    /// Fails on the first unknown product.
    pub fn resolve_prices(
        &self,
        user_id: UserId,
        product_ids: &[ProductId],
    ) -> ServiceResult<Vec<(ProductId, Decimal)>> {
        product_ids
            .iter()
            .map(|&id| Ok((id, self.resolve_price(user_id, id)?)))
            .collect()
    }
}

/// Back-office management of tiers, assignments and overrides.
pub struct PricingAdmin<S> {
    store: S,
    clock: Arc<dyn Clock + Send + Sync>,
}

impl<S> PricingAdmin<S> {
    pub fn new(store: S, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        Self { store, clock }
    }
}

fn duplicate_as(what: &'static str) -> impl FnOnce(StoreError) -> ServiceError {
    move |e| match e {
        StoreError::Duplicate(_) => ServiceError::AlreadyExists(what),
        other => other.into(),
    }
}

impl<S: PricingStore + ProductStore> PricingAdmin<S> {
    fn load_tier(&self, id: PricingTierId) -> ServiceResult<PricingTier> {
        Ok(self
            .store
            .get_tier(id)?
            .ok_or(DomainError::not_found("pricing tier"))?)
    }

    fn load_override(&self, id: CustomerPricingId) -> ServiceResult<CustomerPricing> {
        Ok(self
            .store
            .get_customer_pricing(id)?
            .ok_or(DomainError::not_found("customer pricing"))?)
    }

    #[instrument(skip(self, description), err)]
    pub fn create_tier(
        &self,
        name: &str,
        description: Option<String>,
        discount_percentage: Option<Decimal>,
    ) -> ServiceResult<PricingTier> {
        let tier = PricingTier::create(
            NewPricingTier {
                tier_id: PricingTierId::new(),
                name: name.to_string(),
                description,
                discount_percentage,
            },
            self.clock.utc(),
        )?;
        self.store
            .insert_tier(&tier)
            .map_err(duplicate_as("pricing tier"))?;

        info!(tier_id = %tier.id, name = %tier.name, "pricing tier created");
        Ok(tier)
    }

    #[instrument(skip(self), fields(tier_id = %tier_id), err)]
    pub fn update_tier_discount(
        &self,
        tier_id: PricingTierId,
        discount_percentage: Option<Decimal>,
    ) -> ServiceResult<PricingTier> {
        let mut tier = self.load_tier(tier_id)?;
        tier.set_discount_percentage(discount_percentage)?;
        self.store.update_tier(&tier)?;
        Ok(tier)
    }

    #[instrument(skip(self), fields(tier_id = %tier_id), err)]
    pub fn deactivate_tier(&self, tier_id: PricingTierId) -> ServiceResult<PricingTier> {
        let mut tier = self.load_tier(tier_id)?;
        tier.deactivate();
        self.store.update_tier(&tier)?;
        info!(tier_id = %tier.id, "pricing tier deactivated");
        Ok(tier)
    }

    pub fn list_tiers(&self) -> ServiceResult<Vec<PricingTier>> {
        Ok(self.store.list_tiers()?)
    }

    #[instrument(skip(self), fields(user_id = %user_id, tier_id = %tier_id), err)]
    pub fn assign_tier(
        &self,
        user_id: UserId,
        tier_id: PricingTierId,
        start_date: DateTime<Utc>,
        end_date: Option<DateTime<Utc>>,
    ) -> ServiceResult<UserPricingTierAssignment> {
        let tier = self.load_tier(tier_id)?;
        if !tier.is_active {
            return Err(DomainError::validation(format!(
                "pricing tier '{}' is not active",
                tier.name
            ))
            .into());
        }

        let assignment = UserPricingTierAssignment::create(NewAssignment {
            assignment_id: AssignmentId::new(),
            user_id,
            pricing_tier_id: tier_id,
            start_date,
            end_date,
        })?;
        self.store
            .insert_assignment(&assignment)
            .map_err(duplicate_as("assignment"))?;

        info!(assignment_id = %assignment.id, "user assigned to pricing tier");
        Ok(assignment)
    }

    #[instrument(skip(self), fields(assignment_id = %assignment_id), err)]
    pub fn end_assignment(
        &self,
        assignment_id: AssignmentId,
    ) -> ServiceResult<UserPricingTierAssignment> {
        let mut assignment = self
            .store
            .get_assignment(assignment_id)?
            .ok_or(DomainError::not_found("assignment"))?;
        assignment.end();
        self.store.update_assignment(&assignment)?;
        Ok(assignment)
    }

    pub fn assignments_for_user(
        &self,
        user_id: UserId,
    ) -> ServiceResult<Vec<UserPricingTierAssignment>> {
        Ok(self.store.assignments_for_user(user_id)?)
    }

    #[instrument(skip(self), fields(product_id = %product_id, tier_id = %tier_id), err)]
    pub fn create_override(
        &self,
        product_id: ProductId,
        tier_id: PricingTierId,
        price: Decimal,
    ) -> ServiceResult<CustomerPricing> {
        if self.store.get_product(product_id)?.is_none() {
            return Err(DomainError::not_found("product").into());
        }
        self.load_tier(tier_id)?;

        let cp = CustomerPricing::create(NewCustomerPricing {
            customer_pricing_id: CustomerPricingId::new(),
            product_id,
            pricing_tier_id: tier_id,
            price,
        })?;
        self.store
            .insert_customer_pricing(&cp)
            .map_err(duplicate_as("customer pricing"))?;

        info!(customer_pricing_id = %cp.id, price = %cp.price, "tier override created");
        Ok(cp)
    }

    #[instrument(skip(self), fields(customer_pricing_id = %id), err)]
    pub fn update_override_price(
        &self,
        id: CustomerPricingId,
        price: Decimal,
    ) -> ServiceResult<CustomerPricing> {
        let mut cp = self.load_override(id)?;
        cp.set_price(price)?;
        self.store.update_customer_pricing(&cp)?;
        Ok(cp)
    }

    #[instrument(skip(self), fields(customer_pricing_id = %id), err)]
    pub fn deactivate_override(&self, id: CustomerPricingId) -> ServiceResult<CustomerPricing> {
        let mut cp = self.load_override(id)?;
        cp.deactivate();
        self.store.update_customer_pricing(&cp)?;
        Ok(cp)
    }
}

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use freshcart_core::{CustomerPricingId, DomainError, DomainResult, PricingTierId, ProductId};

/// Input for creating a per-product tier override.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCustomerPricing {
    pub customer_pricing_id: CustomerPricingId,
    pub product_id: ProductId,
    pub pricing_tier_id: PricingTierId,
    pub price: Decimal,
}

/// Absolute price for one product within one tier.
///
/// At most one exists per `(product_id, pricing_tier_id)`; stores enforce it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerPricing {
    pub id: CustomerPricingId,
    pub product_id: ProductId,
    pub pricing_tier_id: PricingTierId,
    pub price: Decimal,
    pub is_active: bool,
}

fn validate_price(price: Decimal) -> DomainResult<()> {
    if price.is_sign_negative() {
        return Err(DomainError::validation("override price cannot be negative"));
    }
    Ok(())
}

impl CustomerPricing {
    pub fn create(input: NewCustomerPricing) -> DomainResult<Self> {
        validate_price(input.price)?;
        Ok(Self {
            id: input.customer_pricing_id,
            product_id: input.product_id,
            pricing_tier_id: input.pricing_tier_id,
            price: input.price,
            is_active: true,
        })
    }

    pub fn set_price(&mut self, price: Decimal) -> DomainResult<()> {
        validate_price(price)?;
        self.price = price;
        Ok(())
    }

    pub fn deactivate(&mut self) {
        self.is_active = false;
    }
}

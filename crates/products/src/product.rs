use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use freshcart_core::{DomainError, DomainResult, ProductId};

/// Input for registering a catalog product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProduct {
    pub product_id: ProductId,
    pub name: String,
    pub price: Decimal,
    pub discount_price: Option<Decimal>,
}

/// Catalog product, reduced to the fields pricing and inventory depend on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    id: ProductId,
    name: String,
    price: Decimal,
    discount_price: Option<Decimal>,
    in_stock: bool,
    created_at: DateTime<Utc>,
}

impl Product {
    /// Validate and build a new product. Products start out of stock until the
    /// inventory ledger records stock for them.
    pub fn create(input: NewProduct, created_at: DateTime<Utc>) -> DomainResult<Self> {
        let name = input.name.trim();
        if name.is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        if input.price.is_sign_negative() {
            return Err(DomainError::validation("price cannot be negative"));
        }
        if input.discount_price.is_some_and(|d| d.is_sign_negative()) {
            return Err(DomainError::validation("discount price cannot be negative"));
        }

        Ok(Self {
            id: input.product_id,
            name: name.to_string(),
            price: input.price,
            discount_price: input.discount_price,
            in_stock: false,
            created_at,
        })
    }

    /// Rebuild a product from persisted fields (no validation).
    pub fn restore(
        id: ProductId,
        name: String,
        price: Decimal,
        discount_price: Option<Decimal>,
        in_stock: bool,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            name,
            price,
            discount_price,
            in_stock,
            created_at,
        }
    }

    pub fn id(&self) -> ProductId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn price(&self) -> Decimal {
        self.price
    }

    pub fn discount_price(&self) -> Option<Decimal> {
        self.discount_price
    }

    pub fn in_stock(&self) -> bool {
        self.in_stock
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Price that tier math starts from: the promotional price when one is
    /// set, the regular price otherwise. Customer prices never exceed it.
    pub fn baseline_price(&self) -> Decimal {
        self.discount_price.unwrap_or(self.price)
    }

    /// Set the denormalized in-stock flag. Returns `true` if the value changed.
    pub fn set_in_stock(&mut self, in_stock: bool) -> bool {
        let changed = self.in_stock != in_stock;
        self.in_stock = in_stock;
        changed
    }
}

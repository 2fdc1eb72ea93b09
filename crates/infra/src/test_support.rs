//! Shared fixtures for service tests.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Local, TimeZone, Utc};
use mockable::Clock;
use rust_decimal::Decimal;

use freshcart_core::ProductId;
use freshcart_products::{NewProduct, Product};

use crate::store::{InMemoryStore, ProductStore};

/// Clock that only moves when told to.
pub struct ManualClock(Mutex<DateTime<Utc>>);

impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self(Mutex::new(now))
    }

    pub fn advance(&self, delta: Duration) {
        let mut now = self.0.lock().unwrap_or_else(|p| p.into_inner());
        *now += delta;
    }
}

impl Clock for ManualClock {
    fn local(&self) -> DateTime<Local> {
        self.utc().with_timezone(&Local)
    }

    fn utc(&self) -> DateTime<Utc> {
        *self.0.lock().unwrap_or_else(|p| p.into_inner())
    }
}

pub fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
}

pub fn clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(fixed_now()))
}

pub fn seed_product(
    store: &InMemoryStore,
    name: &str,
    price: Decimal,
    discount_price: Option<Decimal>,
) -> ProductId {
    let product = Product::create(
        NewProduct {
            product_id: ProductId::new(),
            name: name.to_string(),
            price,
            discount_price,
        },
        fixed_now(),
    )
    .unwrap();
    store.insert_product(&product).unwrap();
    product.id()
}

//! `freshcart-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns)
//! shared by the catalog, pricing and inventory crates.

pub mod aggregate;
pub mod error;
pub mod event;
pub mod id;

pub use aggregate::{Aggregate, AggregateRoot, ExpectedVersion};
pub use error::{DomainError, DomainResult};
pub use event::Event;
pub use id::{
    AssignmentId, CustomerPricingId, InventoryId, PricingTierId, ProductId, StockTransactionId,
    UserId,
};

//! Products domain module.
//!
//! This crate holds the catalog entity the pricing and inventory crates read
//! from, implemented purely as deterministic domain logic (no IO, no storage).

pub mod product;

pub use product::{NewProduct, Product};

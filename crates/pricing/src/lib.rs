//! Pricing domain module.
//!
//! Pricing tiers, user tier assignments, per-product tier overrides, and the
//! best-price rule that turns them into the price a customer pays. Pure domain
//! logic: loading the inputs is the storage layer's job.

pub mod assignment;
pub mod customer_pricing;
pub mod resolve;
pub mod tier;

pub use assignment::{NewAssignment, UserPricingTierAssignment};
pub use customer_pricing::{CustomerPricing, NewCustomerPricing};
pub use resolve::{PriceQuote, PriceSource, TierPricing, quote};
pub use tier::{NewPricingTier, PricingTier};

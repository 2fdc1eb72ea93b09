//! Best-price resolution.
//!
//! Every effective tier a user holds proposes at most one candidate price:
//! its active override for the product if there is one, otherwise its blanket
//! discount applied to the baseline. The customer pays the cheapest of the
//! baseline and all candidates. Candidates are never combined.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use freshcart_core::PricingTierId;

use crate::assignment::UserPricingTierAssignment;
use crate::customer_pricing::CustomerPricing;
use crate::tier::PricingTier;

/// One of a user's assignments together with its tier and, if present, the
/// tier's override for the product being priced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierPricing {
    pub assignment: UserPricingTierAssignment,
    pub tier: PricingTier,
    pub customer_price: Option<CustomerPricing>,
}

impl TierPricing {
    /// Candidate price this entry proposes at `now`, with its source.
    fn candidate(&self, baseline: Decimal, now: DateTime<Utc>) -> Option<(Decimal, PriceSource)> {
        if !self.assignment.is_effective(now) || !self.tier.is_active {
            return None;
        }

        if let Some(cp) = self.customer_price.as_ref().filter(|cp| cp.is_active) {
            return Some((cp.price, PriceSource::Override { tier: self.tier.id }));
        }

        let pct = self.tier.discount_percentage?;
        let price = self.tier.discounted(baseline)?;
        Some((
            price,
            PriceSource::TierDiscount {
                tier: self.tier.id,
                percentage: pct,
            },
        ))
    }
}

/// Where a resolved price came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum PriceSource {
    Baseline,
    Override {
        tier: PricingTierId,
    },
    TierDiscount {
        tier: PricingTierId,
        percentage: Decimal,
    },
}

/// A resolved customer price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceQuote {
    pub baseline: Decimal,
    pub price: Decimal,
    pub source: PriceSource,
}

/// Resolve the price a user pays given the product baseline and every tier
/// entry loaded for that user.
///
/// The result never exceeds `baseline`. On ties the first source wins, with
/// the baseline considered before any tier.
pub fn quote(baseline: Decimal, tiers: &[TierPricing], now: DateTime<Utc>) -> PriceQuote {
    let mut best = PriceQuote {
        baseline,
        price: baseline,
        source: PriceSource::Baseline,
    };

    for (price, source) in tiers.iter().filter_map(|t| t.candidate(baseline, now)) {
        if price < best.price {
            best.price = price;
            best.source = source;
        }
    }

    best
}
